//! Config id generation from a server name.

/// Derive a configuration id from a server name.
///
/// The name is lowercased, every run of characters outside `[a-z0-9]` becomes a
/// single `-`, and leading/trailing hyphens are dropped. `example.com` becomes
/// `example-com`. Applying the function to its own output returns it unchanged.
pub fn generate_id(server_name: &str) -> String {
    let mut id = String::with_capacity(server_name.len());
    let mut pending_hyphen = false;

    for ch in server_name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !id.is_empty() {
                id.push('-');
            }
            pending_hyphen = false;
            id.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_domains() {
        assert_eq!(generate_id("example.com"), "example-com");
        assert_eq!(generate_id("API.Example.COM"), "api-example-com");
        assert_eq!(generate_id("app.ptsi.co.id"), "app-ptsi-co-id");
    }

    #[test]
    fn test_generate_id_collapses_and_trims() {
        assert_eq!(generate_id("--my__app..io--"), "my-app-io");
        assert_eq!(generate_id("  spaced   name "), "spaced-name");
        assert_eq!(generate_id("a/b\\c"), "a-b-c");
    }

    #[test]
    fn test_generate_id_non_ascii() {
        assert_eq!(generate_id("café.fr"), "caf-fr");
        assert_eq!(generate_id("ÉCOLE"), "cole");
    }

    #[test]
    fn test_generate_id_empty() {
        assert_eq!(generate_id(""), "");
        assert_eq!(generate_id("..."), "");
    }
}
