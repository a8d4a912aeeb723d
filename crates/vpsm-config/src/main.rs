//! Offline linter for reverse-proxy configuration files.
//!
//! Usage:
//!   vpsm-lint <directory_or_file> [OPTIONS]

use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use vpsm_config::{generate_id, lint_file, Issue, Severity, ValidateOptions, ValidationReport};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Reverse-proxy configuration linter
#[derive(Parser, Debug)]
#[command(name = "vpsm-lint")]
#[command(
    author,
    version,
    about = "Validate reverse-proxy configuration files before uploading them"
)]
struct Args {
    /// Configuration file, or directory of configuration files
    #[arg(required = true)]
    path: PathBuf,

    /// Fill empty ids from the server name and trim location fields
    #[arg(short, long)]
    fix: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Only show errors (hide warnings)
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Treat warnings as errors for the exit code
    #[arg(short, long)]
    strict: bool,

    /// Report a certificate without its key (or the reverse) as a warning
    #[arg(long)]
    defer_ssl_pairing: bool,
}

fn main() {
    let args = Args::parse();
    let text = args.output == OutputFormat::Text;

    if text {
        println!("{BOLD}{CYAN}vpsm configuration linter{RESET}");
        println!("{DIM}{RULE}{RESET}");
    }

    let files = collect_config_files(&args.path);
    if files.is_empty() {
        if text {
            println!("{YELLOW}Warning:{RESET} No JSON files found in {}", args.path.display());
        }
        std::process::exit(0);
    }

    if text {
        println!("{DIM}Scanning:{RESET} {CYAN}{}{RESET}", args.path.display());
        println!("{DIM}Found:{RESET}    {BOLD}{}{RESET} file(s)\n", files.len());
    }

    let options = ValidateOptions {
        defer_ssl_pairing: args.defer_ssl_pairing,
    };

    let mut report = ValidationReport::new();
    for file in &files {
        report.merge(lint_file(file, &options));
    }

    let loaded: Vec<(PathBuf, Value)> = files
        .iter()
        .filter_map(|f| load_json(f).ok().map(|v| (f.clone(), v)))
        .collect();
    check_cross_file(&loaded, &mut report);

    match args.output {
        OutputFormat::Json => print_results_json(&report),
        OutputFormat::Text => print_results(&report, &args),
    }

    if args.fix {
        if text {
            println!("\n{BOLD}Applying fixes...{RESET}");
        }
        apply_fixes(&loaded, text);
    }

    let failed = report.has_errors() || (args.strict && report.has_warnings());
    std::process::exit(if failed { 1 } else { 0 });
}

fn collect_config_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.to_path_buf());
    } else if path.is_dir() {
        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                let entry_path = entry.path();
                if entry_path.is_file() && entry_path.extension().is_some_and(|ext| ext == "json")
                {
                    files.push(entry_path);
                }
            }
        }
    }

    files.sort();
    files
}

fn load_json(path: &Path) -> Result<Value, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

fn records(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Ids must be unique across the whole set; a server name and port pair
/// served twice is most likely a copy that was never renamed.
fn check_cross_file(loaded: &[(PathBuf, Value)], report: &mut ValidationReport) {
    let mut by_id: BTreeMap<String, Vec<&PathBuf>> = BTreeMap::new();
    let mut by_host: BTreeMap<(String, u64), Vec<&PathBuf>> = BTreeMap::new();

    for (file, value) in loaded {
        for record in records(value) {
            if let Some(id) = record.get("id").and_then(Value::as_str) {
                if !id.trim().is_empty() {
                    by_id.entry(id.to_string()).or_default().push(file);
                }
            }
            let server_name = record.get("server_name").and_then(Value::as_str).unwrap_or("");
            let port = record.get("listen_port").and_then(Value::as_u64).unwrap_or(80);
            if !server_name.trim().is_empty() {
                by_host
                    .entry((server_name.to_lowercase(), port))
                    .or_default()
                    .push(file);
            }
        }
    }

    for (id, files) in by_id.iter().filter(|(_, files)| files.len() > 1) {
        report.add_issue(
            Issue::error(
                "E111",
                format!("Id '{id}' is used {} times: {}", files.len(), file_names(files)),
            )
            .with_source(files[0])
            .with_location("id")
            .with_suggestion("Give each configuration a unique id"),
        );
    }

    for ((name, port), files) in by_host.iter().filter(|(_, files)| files.len() > 1) {
        report.add_issue(
            Issue::warning(
                "W110",
                format!("{name}:{port} is served {} times: {}", files.len(), file_names(files)),
            )
            .with_source(files[0])
            .with_location("server_name"),
        );
    }
}

fn file_names(files: &[&PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.file_name().unwrap_or_default().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_results_json(report: &ValidationReport) {
    match serde_json::to_string_pretty(report) {
        Ok(output) => println!("{output}"),
        Err(e) => eprintln!("{RED}Failed to serialize report: {e}{RESET}"),
    }
}

fn print_results(report: &ValidationReport, args: &Args) {
    println!();

    if report.issues.is_empty() {
        println!("{GREEN}{BOLD}No issues found!{RESET}");
    } else {
        let mut issues_by_file: BTreeMap<Option<&PathBuf>, Vec<&Issue>> = BTreeMap::new();
        for issue in &report.issues {
            if args.errors_only && issue.severity != Severity::Error {
                continue;
            }
            issues_by_file
                .entry(issue.source.as_ref())
                .or_default()
                .push(issue);
        }

        for (file, issues) in issues_by_file {
            let file_errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
            let file_warnings = issues.len() - file_errors;

            let file_name = file
                .map(|f| f.file_name().unwrap_or_default().to_string_lossy().to_string())
                .unwrap_or_else(|| "<input>".to_string());

            let status = if file_errors > 0 {
                format!("{RED}FAIL{RESET}")
            } else {
                format!("{YELLOW}WARN{RESET}")
            };

            let mut counts = Vec::new();
            if file_errors > 0 {
                counts.push(format!("{RED}{file_errors} error(s){RESET}"));
            }
            if file_warnings > 0 {
                counts.push(format!("{YELLOW}{file_warnings} warning(s){RESET}"));
            }

            println!(
                "{status} {BOLD}{CYAN}{file_name}{RESET} {DIM}({RESET}{}{DIM}){RESET}",
                counts.join(&format!("{DIM}, {RESET}"))
            );

            for issue in issues {
                let color = severity_color(&issue.severity);
                let marker = format!("{color}|{RESET}");
                let location = issue
                    .location
                    .as_ref()
                    .map(|l| format!("{DIM}[{RESET}{CYAN}{l}{RESET}{DIM}]{RESET} "))
                    .unwrap_or_default();

                println!(
                    "  {marker} {location}{BOLD}{color}{}{RESET}: {} {DIM}({color}{}{DIM}){RESET}",
                    issue.severity.label(),
                    issue.message,
                    issue.code
                );

                if let Some(suggestion) = &issue.suggestion {
                    println!("  {marker}   {GREEN}-> {suggestion}{RESET}");
                }
            }
            println!();
        }
    }

    println!("{DIM}{RULE}{RESET}");
    println!("{BOLD}{CYAN}Summary{RESET}");
    println!("{DIM}{RULE}{RESET}");
    println!("  {DIM}Configs checked:{RESET} {BOLD}{}{RESET}", report.configs_checked);

    if report.errors > 0 {
        println!("  {RED}Errors:{RESET}    {BOLD}{RED}{}{RESET}", report.errors);
    } else {
        println!("  {GREEN}Errors:{RESET}    {BOLD}{GREEN}0{RESET}");
    }

    if report.warnings > 0 {
        println!("  {YELLOW}Warnings:{RESET}  {BOLD}{YELLOW}{}{RESET}", report.warnings);
    } else {
        println!("  {DIM}Warnings:{RESET}  {BOLD}0{RESET}");
    }

    println!();

    if report.is_valid() && !report.has_warnings() {
        println!("{GREEN}{BOLD}All checks passed!{RESET}");
    } else if report.is_valid() {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{RED}{BOLD}Linting failed with errors{RESET}");
    }
}

fn severity_color(severity: &Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
    }
}

fn apply_fixes(loaded: &[(PathBuf, Value)], text: bool) {
    let mut fixes_applied = 0;

    for (file, value) in loaded {
        let mut modified = value.clone();
        let fixed_here = match &mut modified {
            Value::Array(items) => items.iter_mut().map(fix_record).sum::<usize>(),
            other => fix_record(other),
        };

        if fixed_here == 0 {
            continue;
        }
        fixes_applied += fixed_here;

        let written = serde_json::to_string_pretty(&modified)
            .map_err(|e| e.to_string())
            .and_then(|content| std::fs::write(file, content).map_err(|e| e.to_string()));
        match written {
            Ok(()) if text => println!("{GREEN}Fixed: {}{RESET}", file.display()),
            Ok(()) => {}
            Err(e) => eprintln!("{RED}Error writing {}: {e}{RESET}", file.display()),
        }
    }

    if text {
        println!("\n{GREEN}Applied {fixes_applied} fixes{RESET}");
    }
}

/// Returns the number of fields changed.
fn fix_record(record: &mut Value) -> usize {
    let Some(obj) = record.as_object_mut() else {
        return 0;
    };
    let mut fixes = 0;

    let id_empty = obj
        .get("id")
        .and_then(Value::as_str)
        .map(|id| id.trim().is_empty())
        .unwrap_or(true);
    let server_name = obj
        .get("server_name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    if id_empty && !server_name.trim().is_empty() {
        obj.insert("id".to_string(), Value::String(generate_id(&server_name)));
        fixes += 1;
    }

    if let Some(locations) = obj.get_mut("locations").and_then(Value::as_array_mut) {
        for location in locations.iter_mut().filter_map(Value::as_object_mut) {
            for field in ["path", "backend"] {
                let trimmed = match location.get(field).and_then(Value::as_str) {
                    Some(raw) if raw.trim() != raw => raw.trim().to_string(),
                    _ => continue,
                };
                location.insert(field.to_string(), Value::String(trimmed));
                fixes += 1;
            }
        }
    }

    fixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fix_record() {
        let mut record = json!({
            "id": "",
            "server_name": "Example.com",
            "locations": [{"path": " /api ", "backend": "127.0.0.1:8080"}]
        });
        assert_eq!(fix_record(&mut record), 2);
        assert_eq!(record["id"], json!("example-com"));
        assert_eq!(record["locations"][0]["path"], json!("/api"));
        assert_eq!(fix_record(&mut record), 0);
    }

    #[test]
    fn test_cross_file_duplicates() {
        let a = PathBuf::from("a.json");
        let b = PathBuf::from("b.json");
        let loaded = vec![
            (a.clone(), json!({"id": "example-com", "server_name": "example.com"})),
            (b.clone(), json!([{"id": "example-com", "server_name": "EXAMPLE.com", "listen_port": 80}])),
        ];
        let mut report = ValidationReport::new();
        check_cross_file(&loaded, &mut report);
        assert_eq!(report.codes(), vec!["E111", "W110"]);
        assert_eq!(report.issues[0].source.as_ref(), Some(&a));
    }
}
