//! `vpsm` command-line front end.

use anyhow::{bail, Context};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use vpsm_config::{
    templates, ConfigMode, ProxyLocation, ReverseProxyConfig, Severity, SslSlot, ValidationReport,
};

use crate::api::{ActionResponse, ApiClient, LogType, SystemStatus};
use crate::app::{App, StatusLevel};
use crate::error::{ApiError, ConsoleError};
use crate::form::{ConfigForm, SslInput};
use crate::monitor::{Monitor, MonitorEvent};
use crate::session::{Session, TokenStore};
use crate::settings::Settings;
use crate::store::ConfigStore;

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Admin console for the VPS manager reverse-proxy control plane
#[derive(Parser, Debug)]
#[command(name = "vpsm")]
#[command(author, version, about = "Manage nginx reverse-proxy configurations on a VPS")]
pub struct Cli {
    /// Settings file (default: <config dir>/vpsm/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Control-plane API URL
    #[arg(long, global = true, env = "VPSM_API_URL")]
    pub api_url: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and remember the session token
    Login {
        username: String,
        /// Password; prompted on stdin when omitted
        #[arg(long, env = "VPSM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the session token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Reverse-proxy configurations
    #[command(subcommand)]
    Configs(ConfigsCommand),
    /// Built-in configuration templates
    #[command(subcommand)]
    Templates(TemplatesCommand),
    /// Nginx and host status
    #[command(subcommand)]
    System(SystemCommand),
    /// Configuration backups
    #[command(subcommand)]
    Backups(BackupsCommand),
    /// Follow system status, and live metrics with --live
    Monitor {
        #[arg(long)]
        live: bool,
    },
    /// Print shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand, Debug)]
pub enum ConfigsCommand {
    List,
    Show {
        id: String,
    },
    Create {
        /// Start from a built-in template
        #[arg(short, long)]
        template: Option<String>,
        #[command(flatten)]
        form: FormArgs,
    },
    Edit {
        id: String,
        #[command(flatten)]
        form: FormArgs,
    },
    Delete {
        id: String,
    },
    /// Activate or deactivate
    Toggle {
        id: String,
    },
    /// Ask the server to test the generated nginx configuration
    Test {
        id: String,
    },
    /// Create an inactive copy
    Duplicate {
        id: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct FormArgs {
    /// Domain name(s), space separated
    #[arg(short = 'n', long)]
    pub server_name: Option<String>,

    /// Explicit id (default: derived from the server name)
    #[arg(long = "id", value_name = "ID")]
    pub new_id: Option<String>,

    #[arg(short, long)]
    pub port: Option<u16>,

    /// Location as PATH=BACKEND[,ws][,noverify]; repeat for more. Replaces
    /// the existing locations.
    #[arg(short, long = "location", value_parser = parse_location)]
    pub locations: Vec<ProxyLocation>,

    /// Remove the location at this index; repeat for more
    #[arg(long = "remove-location")]
    pub remove_locations: Vec<usize>,

    /// Certificate path on the server
    #[arg(long, conflicts_with = "ssl_cert_file")]
    pub ssl_cert: Option<String>,

    /// Key path on the server
    #[arg(long, conflicts_with = "ssl_key_file")]
    pub ssl_key: Option<String>,

    /// Upload a local certificate PEM file
    #[arg(long)]
    pub ssl_cert_file: Option<PathBuf>,

    /// Upload a local key PEM file
    #[arg(long)]
    pub ssl_key_file: Option<PathBuf>,

    /// Drop the server name and SSL material
    #[arg(long, conflicts_with = "server_name")]
    pub port_forward: bool,

    #[arg(long, conflicts_with = "inactive")]
    pub active: bool,

    #[arg(long)]
    pub inactive: bool,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    List,
}

#[derive(Subcommand, Debug)]
pub enum SystemCommand {
    Status,
    /// Reload nginx
    Reload,
    /// Restart nginx
    Restart,
    /// Run `nginx -t` on the server
    Test,
    Logs {
        #[arg(short = 't', long = "type", value_enum, default_value_t = LogType::Error)]
        log_type: LogType,
    },
}

#[derive(Subcommand, Debug)]
pub enum BackupsCommand {
    List,
    Create,
    Restore {
        filename: String,
    },
    Delete {
        filename: String,
    },
    Download {
        filename: String,
        /// Destination (default: the backup's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// `PATH=BACKEND[,ws][,noverify]`
pub fn parse_location(raw: &str) -> Result<ProxyLocation, String> {
    let mut parts = raw.split(',');
    let mapping = parts.next().unwrap_or_default();
    let Some((path, backend)) = mapping.split_once('=') else {
        return Err(format!("expected PATH=BACKEND, got '{mapping}'"));
    };
    let mut location = ProxyLocation::new(path.trim(), backend.trim());
    for flag in parts {
        match flag.trim() {
            "ws" | "websocket" => location.websocket = true,
            "noverify" => location.ssl_verify = false,
            other => return Err(format!("unknown location flag '{other}'")),
        }
    }
    Ok(location)
}

/// Run one command to completion.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "vpsm", &mut std::io::stdout());
        return Ok(());
    }
    if let Command::Templates(TemplatesCommand::List) = cli.command {
        print_templates();
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load settings")?
        .with_api_url(cli.api_url)?;
    debug!(api_url = %settings.api_url, "using control plane");

    let api = Arc::new(ApiClient::new(&settings.api_url, settings.timeout())?);
    let mut session = Session::new(api.clone(), settings.token_path().map(TokenStore::new));

    match cli.command {
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ").await?,
            };
            let user = session.login(&username, &password).await?;
            println!("{GREEN}✓{RESET} Logged in as {BOLD}{}{RESET} ({})", user.username, user.role);
            return Ok(());
        }
        Command::Logout => {
            session.initialize().await.ok();
            session.logout().await;
            println!("{GREEN}✓{RESET} Logged out");
            return Ok(());
        }
        _ => {}
    }

    session.initialize().await?;
    let result = dispatch(cli.command, &session, &settings).await;
    if let Err(err) = &result {
        if is_auth_error(err) {
            session.invalidate().await;
        }
    }
    result
}

async fn dispatch(command: Command, session: &Session, settings: &Settings) -> anyhow::Result<()> {
    let api = session.api().clone();
    match command {
        Command::Whoami => match session.user() {
            Some(user) => {
                println!("{BOLD}{}{RESET} <{}>", user.username, user.email);
                println!("{DIM}role:{RESET} {}", user.role);
            }
            None => println!("Not logged in"),
        },
        Command::Configs(cmd) => configs(cmd, App::new(api)).await?,
        Command::System(cmd) => system(cmd, &api).await?,
        Command::Backups(cmd) => backups(cmd, &api).await?,
        Command::Monitor { live } => {
            let live = live.then(|| settings.reconnect_delay());
            monitor(api, settings, live).await?;
        }
        Command::Login { .. }
        | Command::Logout
        | Command::Templates(_)
        | Command::Completions { .. } => {}
    }
    Ok(())
}

async fn configs(cmd: ConfigsCommand, mut app: App<Arc<ApiClient>>) -> anyhow::Result<()> {
    let result = match cmd {
        ConfigsCommand::List => {
            app.refresh().await?;
            print_config_table(&app.configs);
            return Ok(());
        }
        ConfigsCommand::Show { id } => {
            let config = app.store().get_config(&id).await?;
            print_config(&config);
            return Ok(());
        }
        ConfigsCommand::Create { template, form } => {
            let mut draft = match template {
                Some(key) => app.open_template(&key)?,
                None => app.open_create(),
            };
            apply_form_args(&mut draft, &form).await?;
            print_warnings(&draft.validate());
            app.submit(&draft).await
        }
        ConfigsCommand::Edit { id, form } => {
            let mut draft = app.open_edit(&id).await?;
            apply_form_args(&mut draft, &form).await?;
            if !draft.is_dirty() {
                println!("{DIM}Nothing to change{RESET}");
                return Ok(());
            }
            print_warnings(&draft.validate());
            app.submit(&draft).await
        }
        ConfigsCommand::Delete { id } => app.delete(&id).await,
        ConfigsCommand::Toggle { id } => app.toggle(&id).await,
        ConfigsCommand::Test { id } => app.test(&id).await.map(|_| ()),
        ConfigsCommand::Duplicate { id } => app.duplicate(&id).await.map(|_| ()),
    };

    print_status(&app);
    Ok(result?)
}

/// Apply command-line edits to a form in the same order a user would.
pub async fn apply_form_args(form: &mut ConfigForm, args: &FormArgs) -> Result<(), ConsoleError> {
    if args.port_forward {
        form.convert_to_port_forward();
    }
    if let Some(name) = &args.server_name {
        form.convert_to_domain(name)?;
    }
    if let Some(id) = &args.new_id {
        form.set_id(id.clone());
    }
    if let Some(port) = args.port {
        form.set_listen_port(port);
    }
    if args.active {
        form.set_active(true);
    } else if args.inactive {
        form.set_active(false);
    }

    if !args.locations.is_empty() {
        let existing = form.locations().len();
        for location in &args.locations {
            form.push_location(location.clone());
        }
        for _ in 0..existing {
            form.remove_location(0);
        }
    }
    let mut removals = args.remove_locations.clone();
    removals.sort_unstable_by(|a, b| b.cmp(a));
    removals.dedup();
    for index in removals {
        if !form.remove_location(index) {
            debug!(index, "location not removed");
        }
    }

    if let Some(path) = &args.ssl_cert {
        form.ssl_mut(SslInput::Certificate).set_path(path.clone());
    }
    if let Some(path) = &args.ssl_key {
        form.ssl_mut(SslInput::Key).set_path(path.clone());
    }
    if let Some(file) = &args.ssl_cert_file {
        form.upload(SslInput::Certificate, file).await?;
    }
    if let Some(file) = &args.ssl_key_file {
        form.upload(SslInput::Key, file).await?;
    }
    Ok(())
}

async fn system(cmd: SystemCommand, api: &ApiClient) -> anyhow::Result<()> {
    match cmd {
        SystemCommand::Status => print_system_status(&api.system_status().await?),
        SystemCommand::Reload => print_action(api.reload_nginx().await?, "Nginx reloaded"),
        SystemCommand::Restart => print_action(api.restart_nginx().await?, "Nginx restarted"),
        SystemCommand::Test => print_action(api.test_nginx().await?, "Nginx configuration test passed"),
        SystemCommand::Logs { log_type } => {
            let logs = api.nginx_logs(log_type).await?;
            if logs.lines.is_empty() {
                println!("{DIM}No {} log entries{RESET}", logs.log_type.as_str());
            }
            for line in logs.lines {
                println!("{line}");
            }
        }
    }
    Ok(())
}

async fn backups(cmd: BackupsCommand, api: &ApiClient) -> anyhow::Result<()> {
    match cmd {
        BackupsCommand::List => {
            let backups = api.list_backups().await?;
            if backups.is_empty() {
                println!("{DIM}No backups{RESET}");
            }
            for backup in backups {
                let created = backup
                    .created()
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or(backup.created_at);
                println!(
                    "{BOLD}{:<40}{RESET} {:>10}  {:<16}  {} config(s)",
                    backup.filename,
                    format_size(backup.size),
                    created,
                    backup.config_count
                );
            }
        }
        BackupsCommand::Create => print_action(api.create_backup().await?, "Backup created"),
        BackupsCommand::Restore { filename } => {
            print_action(api.restore_backup(&filename).await?, "Backup restored")
        }
        BackupsCommand::Delete { filename } => {
            print_action(api.delete_backup(&filename).await?, "Backup deleted")
        }
        BackupsCommand::Download { filename, output } => {
            let bytes = api.download_backup(&filename).await?;
            let output = output.unwrap_or_else(|| download_name(&filename));
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "{GREEN}✓{RESET} Saved {} to {}",
                format_size(bytes.len() as u64),
                output.display()
            );
        }
    }
    Ok(())
}

async fn monitor(
    api: Arc<ApiClient>,
    settings: &Settings,
    live: Option<std::time::Duration>,
) -> anyhow::Result<()> {
    let (monitor, mut events) = Monitor::start(api, settings.poll_interval(), live)?;
    println!("{DIM}Monitoring; press Ctrl-C to stop{RESET}");

    let mut failure = None;
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => event,
        };
        match event {
            Some(MonitorEvent::Status(status)) => print_system_status(&status),
            Some(MonitorEvent::Metrics { system, alerts }) => {
                println!(
                    "{CYAN}metrics{RESET} cpu {:.1}%  mem {:.1}%  disk {:.1}%  conns {}  req/s {:.1}",
                    system.cpu_usage,
                    system.memory_usage,
                    system.disk_usage,
                    system.nginx_connections,
                    system.nginx_requests_per_second
                );
                for alert in alerts {
                    println!("  {YELLOW}alert{RESET} {} ({})", alert.message, alert.status);
                }
            }
            Some(MonitorEvent::Connected) => println!("{GREEN}live metrics connected{RESET}"),
            Some(MonitorEvent::Disconnected) => {
                println!("{YELLOW}live metrics disconnected; reconnecting{RESET}")
            }
            Some(MonitorEvent::Error(message)) => println!("{RED}error:{RESET} {message}"),
            // A rejected token stops every monitor task.
            None => {
                failure = Some(ApiError::Unauthorized);
                break;
            }
        }
    }

    monitor.shutdown().await;
    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

async fn prompt(label: &str) -> anyhow::Result<String> {
    eprint!("{label}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        bail!("No password given");
    }
    Ok(value)
}

fn is_auth_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConsoleError>().is_some_and(ConsoleError::is_auth)
        || err.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth)
}

/// Print an error the way the CLI reports failures.
pub fn report_error(err: &anyhow::Error) {
    if let Some(ConsoleError::Validation(report)) = err.downcast_ref::<ConsoleError>() {
        eprintln!("{RED}{BOLD}Validation failed:{RESET} {}", report.summary());
        for issue in &report.issues {
            let color = match issue.severity {
                Severity::Error => RED,
                Severity::Warning => YELLOW,
            };
            eprintln!("  {color}{issue}{RESET}");
            if let Some(suggestion) = &issue.suggestion {
                eprintln!("    {DIM}hint: {suggestion}{RESET}");
            }
        }
        return;
    }
    eprintln!("{RED}{BOLD}Error:{RESET} {err:#}");
    if is_auth_error(err) {
        eprintln!("{DIM}Run `vpsm login <username>` to start a new session{RESET}");
    }
}

fn print_warnings(report: &ValidationReport) {
    if report.has_errors() {
        return;
    }
    for issue in &report.issues {
        println!("{YELLOW}{issue}{RESET}");
    }
}

fn print_status<S: ConfigStore>(app: &App<S>) {
    if let Some((message, level)) = app.status() {
        let (color, mark) = match level {
            StatusLevel::Success => (GREEN, "✓"),
            StatusLevel::Info => (CYAN, "•"),
            StatusLevel::Warning => (YELLOW, "!"),
            StatusLevel::Error => (RED, "✗"),
        };
        println!("{color}{mark}{RESET} {message}");
    }
}

fn print_action(response: ActionResponse, fallback: &str) {
    if response.failed() {
        println!("{RED}✗{RESET} {}", response.summary("Action failed"));
    } else {
        println!("{GREEN}✓{RESET} {}", response.summary(fallback));
    }
}

fn print_templates() {
    for template in templates::builtin() {
        println!(
            "{BOLD}{:<12}{RESET} {:<24} {DIM}{}{RESET}",
            template.key, template.name, template.description
        );
        for location in &template.locations {
            let ws = if location.websocket { " (websocket)" } else { "" };
            println!("    {:<12} → {}{ws}", location.path, location.backend);
        }
    }
}

fn print_config_table(configs: &[ReverseProxyConfig]) {
    if configs.is_empty() {
        println!("{DIM}No configurations{RESET}");
        return;
    }
    println!(
        "{BOLD}{:<32} {:<32} {:>5}  {:<12} {:<8} {}{RESET}",
        "ID", "SERVER NAME", "PORT", "MODE", "STATE", "LOCATIONS"
    );
    for config in configs {
        let state = if config.is_active {
            format!("{GREEN}active{RESET}  ")
        } else {
            format!("{DIM}inactive{RESET}")
        };
        let server_name = match config.mode() {
            ConfigMode::Domain => config.server_name.as_str(),
            ConfigMode::PortForward => "-",
        };
        println!(
            "{:<32} {:<32} {:>5}  {:<12} {} {}",
            config.id,
            server_name,
            config.listen_port,
            config.mode().label(),
            state,
            config.locations.len()
        );
    }
}

fn print_config(config: &ReverseProxyConfig) {
    println!("{BOLD}{CYAN}{}{RESET}", config.id);
    println!("{DIM}mode:{RESET}        {}", config.mode().label());
    if config.mode() == ConfigMode::Domain {
        println!("{DIM}server name:{RESET} {}", config.server_name);
    }
    println!("{DIM}port:{RESET}        {}", config.listen_port);
    println!(
        "{DIM}active:{RESET}      {}",
        if config.is_active { "yes" } else { "no" }
    );
    if config.has_ssl() {
        let describe = |path: &Option<String>, content: &Option<String>| {
            SslSlot::from_parts(path, content).describe()
        };
        println!(
            "{DIM}ssl cert:{RESET}    {}",
            describe(&config.ssl_cert, &config.ssl_cert_content)
        );
        println!(
            "{DIM}ssl key:{RESET}     {}",
            describe(&config.ssl_key, &config.ssl_key_content)
        );
    }
    if let Some(updated) = &config.updated_at {
        println!("{DIM}updated:{RESET}     {updated}");
    }
    println!("{DIM}locations:{RESET}");
    for location in &config.locations {
        let mut flags = Vec::new();
        if location.websocket {
            flags.push("websocket".to_string());
        }
        if !location.ssl_verify {
            flags.push("no ssl verify".to_string());
        }
        for (name, value) in &location.custom_headers {
            flags.push(format!("{name}: {value}"));
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" {DIM}[{}]{RESET}", flags.join(", "))
        };
        println!("  {:<16} → {}{flags}", location.path, location.backend);
    }
}

fn print_system_status(status: &SystemStatus) {
    let nginx = if status.nginx_active() {
        format!("{GREEN}active{RESET}")
    } else {
        format!(
            "{RED}{}{RESET}",
            status.nginx_status.as_deref().unwrap_or("unknown")
        )
    };
    println!(
        "{BOLD}nginx{RESET} {nginx} {DIM}{}{RESET}",
        status.nginx_version.as_deref().unwrap_or("")
    );
    println!(
        "cpu {}  mem {}  disk {}",
        percent(status.cpu_usage),
        percent(status.memory_usage),
        percent(status.disk_usage)
    );
    if let Some(uptime) = &status.uptime {
        println!("{DIM}uptime:{RESET} {}", display_value(uptime));
    }
    if let Some(load) = &status.load_average {
        println!("{DIM}load:{RESET}   {}", display_value(load));
    }
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}%"))
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Local file name for a downloaded backup; never escapes the current directory.
fn download_name(filename: &str) -> PathBuf {
    Path::new(filename)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("backup.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_location() {
        let loc = parse_location("/api=127.0.0.1:8080").unwrap();
        assert_eq!(loc.path, "/api");
        assert_eq!(loc.backend, "127.0.0.1:8080");
        assert!(!loc.websocket);
        assert!(loc.ssl_verify);

        let loc = parse_location("/ws = http://chat:3001 ,ws,noverify").unwrap();
        assert_eq!(loc.backend, "http://chat:3001");
        assert!(loc.websocket);
        assert!(!loc.ssl_verify);

        assert!(parse_location("/api").is_err());
        assert!(parse_location("/api=x,bogus").is_err());
    }

    #[test]
    fn test_parse_create_command() {
        let cli = Cli::try_parse_from([
            "vpsm",
            "configs",
            "create",
            "-n",
            "example.com",
            "-l",
            "/=127.0.0.1:3000",
            "-l",
            "/api=127.0.0.1:8080",
        ])
        .unwrap();
        match cli.command {
            Command::Configs(ConfigsCommand::Create { template, form }) => {
                assert!(template.is_none());
                assert_eq!(form.server_name.as_deref(), Some("example.com"));
                assert_eq!(form.locations.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(Cli::try_parse_from([
            "vpsm",
            "configs",
            "create",
            "--ssl-cert",
            "/a.pem",
            "--ssl-cert-file",
            "a.pem"
        ])
        .is_err());
    }

    #[tokio::test]
    async fn test_apply_form_args_builds_draft() {
        let mut pem = NamedTempFile::new().unwrap();
        writeln!(pem, "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----").unwrap();

        let mut form = ConfigForm::new();
        let args = FormArgs {
            server_name: Some("example.com".into()),
            locations: vec![
                ProxyLocation::new("/", "127.0.0.1:3000"),
                ProxyLocation::new("/api", "127.0.0.1:8080"),
            ],
            ssl_cert_file: Some(pem.path().to_path_buf()),
            ssl_key: Some("/etc/ssl/private/example.key".into()),
            port: Some(443),
            ..Default::default()
        };
        apply_form_args(&mut form, &args).await.unwrap();

        assert_eq!(form.id(), "example-com");
        assert_eq!(form.locations().len(), 2);
        assert_eq!(form.locations().get(1).unwrap().path, "/api");
        assert!(form.ssl(SslInput::Certificate).content().is_some());
        assert_eq!(
            form.ssl(SslInput::Key).path(),
            Some("/etc/ssl/private/example.key")
        );
        assert!(!form.validate().has_errors());
    }

    #[tokio::test]
    async fn test_apply_form_args_removes_and_converts() {
        let config = ReverseProxyConfig {
            id: "shop".into(),
            server_name: "shop.example.com".into(),
            locations: vec![
                ProxyLocation::new("/", "127.0.0.1:3000"),
                ProxyLocation::new("/a", "127.0.0.1:3001"),
                ProxyLocation::new("/b", "127.0.0.1:3002"),
            ],
            ssl_cert: Some("/c.pem".into()),
            ssl_key: Some("/k.pem".into()),
            ..Default::default()
        };
        let mut form = ConfigForm::edit(&config);
        let args = FormArgs {
            remove_locations: vec![1, 2, 2],
            port_forward: true,
            inactive: true,
            ..Default::default()
        };
        apply_form_args(&mut form, &args).await.unwrap();

        assert_eq!(form.locations().len(), 1);
        assert_eq!(form.locations().get(0).unwrap().path, "/");
        assert!(form.server_name().is_empty());
        assert!(form.ssl(SslInput::Certificate).is_empty());
        assert!(!form.is_active());
        assert_eq!(form.id(), "shop");
        assert!(form.is_dirty());
    }

    #[test]
    fn test_format_size_and_download_name() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(download_name("../../etc/passwd"), PathBuf::from("passwd"));
        assert_eq!(
            download_name("backup_20240101.json"),
            PathBuf::from("backup_20240101.json")
        );
    }

    #[test]
    fn test_auth_errors_detected_through_anyhow() {
        let err: anyhow::Error = ConsoleError::Api(ApiError::Unauthorized).into();
        assert!(is_auth_error(&err));
        let err: anyhow::Error = ApiError::NotAuthenticated.into();
        assert!(is_auth_error(&err));
        let err: anyhow::Error = ApiError::Parse("x".into()).into();
        assert!(!is_auth_error(&err));
    }
}
