//! Chat command parsing.
//!
//! The chat collaborator hands over raw message lines; only lines starting
//! with the configured trigger prefix and naming the `faucet` command produce
//! a dispense request. Everything else is silently ignored.

/// Parse a raw chat line. Returns the command arguments when the line is a
/// faucet command, `None` otherwise.
pub fn parse_faucet_command(content: &str, prefix: &str) -> Option<Vec<String>> {
    let stripped = content.strip_prefix(prefix)?;
    let mut words = stripped.split_whitespace();
    let command = words.next()?;
    if !command.eq_ignore_ascii_case("faucet") {
        return None;
    }
    Some(words.map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faucet_command_with_address() {
        let args = parse_faucet_command("!faucet terra1abc", "!").unwrap();
        assert_eq!(args, vec!["terra1abc".to_string()]);
    }

    #[test]
    fn test_faucet_command_without_address() {
        let args = parse_faucet_command("!faucet", "!").unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_extra_whitespace_is_tolerated() {
        let args = parse_faucet_command("!  faucet   terra1abc  ", "!").unwrap();
        assert_eq!(args, vec!["terra1abc".to_string()]);
    }

    #[test]
    fn test_command_is_case_insensitive() {
        assert!(parse_faucet_command("!FAUCET terra1abc", "!").is_some());
    }

    #[test]
    fn test_missing_prefix_is_ignored() {
        assert!(parse_faucet_command("faucet terra1abc", "!").is_none());
        assert!(parse_faucet_command("/faucet terra1abc", "!").is_none());
    }

    #[test]
    fn test_other_commands_are_ignored() {
        assert!(parse_faucet_command("!help", "!").is_none());
        assert!(parse_faucet_command("!faucetx terra1abc", "!").is_none());
    }

    #[test]
    fn test_alternate_prefix() {
        assert!(parse_faucet_command(">faucet terra1abc", ">").is_some());
    }

    #[test]
    fn test_empty_line_is_ignored() {
        assert!(parse_faucet_command("", "!").is_none());
        assert!(parse_faucet_command("!", "!").is_none());
    }
}
