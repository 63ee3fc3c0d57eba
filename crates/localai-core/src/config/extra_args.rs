//! Parsing and screening of `--extra-args`.

use super::ConfigError;

/// Fragments that are never forwarded to the server.
pub const DANGEROUS_ARG_FRAGMENTS: &[&str] = &[
    "--rm", "--delete", "--exec", "--eval", "--shell", "|", ">", "<", "&&", "||", ";", "`", "$",
];

/// Split `raw` with POSIX-shell-like quoting and reject dangerous arguments.
pub fn parse_extra_args(raw: &str) -> Result<Vec<String>, ConfigError> {
    let args = split_words(raw)?;
    validate_extra_args(&args)?;
    Ok(args)
}

/// Reject any argument containing a dangerous fragment (case-insensitive).
pub fn validate_extra_args(args: &[String]) -> Result<(), ConfigError> {
    for arg in args {
        let lower = arg.to_lowercase();
        if DANGEROUS_ARG_FRAGMENTS.iter().any(|d| lower.contains(d)) {
            return Err(ConfigError::DangerousArgument(arg.clone()));
        }
    }
    Ok(())
}

fn split_words(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(ConfigError::ExtraArgsSyntax(
                                "unterminated single quote".into(),
                            ));
                        }
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => {
                                return Err(ConfigError::ExtraArgsSyntax(
                                    "unterminated double quote".into(),
                                ));
                            }
                        },
                        Some(ch) => current.push(ch),
                        None => {
                            return Err(ConfigError::ExtraArgsSyntax(
                                "unterminated double quote".into(),
                            ));
                        }
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(ch) => current.push(ch),
                    None => {
                        return Err(ConfigError::ExtraArgsSyntax(
                            "trailing backslash".into(),
                        ));
                    }
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
