use std::fmt;

use crate::validation::ValidationError;

/// A decoded pending-operations-queue entry.
///
/// Commands travel the wire and the pending queue as plain strings
/// (`message` on a frame, or a queue entry); `Command::parse` tokenizes one
/// on whitespace, and the applier matches on the resulting enum instead of
/// re-tokenizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        context_id: u64,
    },
    Query {
        context_id: u64,
        text: String,
    },
    Choose {
        context_id: u64,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command verb '{0}'")]
    UnknownVerb(String),
    #[error("malformed '{verb}' command: {source}")]
    Malformed {
        verb: String,
        #[source]
        source: ValidationError,
    },
}

impl Command {
    pub fn parse(raw: &str) -> Result<Command, CommandError> {
        let mut tokens = raw.split_whitespace();
        let verb = tokens.next().ok_or(CommandError::Empty)?;

        match verb {
            "create" => {
                let id_token = tokens.next();
                let context_id = parse_context_id(id_token).map_err(|source| {
                    CommandError::Malformed {
                        verb: verb.to_string(),
                        source,
                    }
                })?;
                Ok(Command::Create { context_id })
            }
            "query" => {
                let id_token = tokens.next();
                let context_id = parse_context_id(id_token).map_err(|source| {
                    CommandError::Malformed {
                        verb: verb.to_string(),
                        source,
                    }
                })?;
                let text = join_rest(tokens).ok_or_else(|| CommandError::Malformed {
                    verb: verb.to_string(),
                    source: ValidationError::missing("text"),
                })?;
                Ok(Command::Query { context_id, text })
            }
            "choose" => {
                let id_token = tokens.next();
                let context_id = parse_context_id(id_token).map_err(|source| {
                    CommandError::Malformed {
                        verb: verb.to_string(),
                        source,
                    }
                })?;
                let text = join_rest(tokens).ok_or_else(|| CommandError::Malformed {
                    verb: verb.to_string(),
                    source: ValidationError::missing("text"),
                })?;
                Ok(Command::Choose { context_id, text })
            }
            other => Err(CommandError::UnknownVerb(other.to_string())),
        }
    }

    pub fn context_id(&self) -> u64 {
        match self {
            Command::Create { context_id }
            | Command::Query { context_id, .. }
            | Command::Choose { context_id, .. } => *context_id,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Create { context_id } => write!(f, "create {}", context_id),
            Command::Query { context_id, text } => write!(f, "query {} {}", context_id, text),
            Command::Choose { context_id, text } => write!(f, "choose {} {}", context_id, text),
        }
    }
}

fn parse_context_id(token: Option<&str>) -> Result<u64, ValidationError> {
    let token = token.ok_or_else(|| ValidationError::missing("context_id"))?;
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::not_digits("context_id"));
    }
    token
        .parse::<u64>()
        .map_err(|_| ValidationError::not_digits("context_id"))
}

fn join_rest<'a>(tokens: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = tokens.collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create() {
        let cmd = Command::parse("create 7").unwrap();
        assert_eq!(cmd, Command::Create { context_id: 7 });
    }

    #[test]
    fn parses_query_with_multi_word_text() {
        let cmd = Command::parse("query 7 hello there world").unwrap();
        assert_eq!(
            cmd,
            Command::Query {
                context_id: 7,
                text: "hello there world".to_string()
            }
        );
    }

    #[test]
    fn parses_choose() {
        let cmd = Command::parse("choose 7 the answer is 42").unwrap();
        assert_eq!(
            cmd,
            Command::Choose {
                context_id: 7,
                text: "the answer is 42".to_string()
            }
        );
    }

    #[test]
    fn rejects_non_digit_context_id() {
        assert!(matches!(
            Command::parse("create abc"),
            Err(CommandError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(matches!(
            Command::parse("frobnicate 1"),
            Err(CommandError::UnknownVerb(v)) if v == "frobnicate"
        ));
    }

    #[test]
    fn rejects_empty_command() {
        assert!(matches!(Command::parse(""), Err(CommandError::Empty)));
        assert!(matches!(Command::parse("   "), Err(CommandError::Empty)));
    }

    #[test]
    fn query_without_text_is_malformed() {
        assert!(matches!(
            Command::parse("query 7"),
            Err(CommandError::Malformed { .. })
        ));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let cmd = Command::parse("query 3 what is consensus").unwrap();
        let rendered = cmd.to_string();
        let reparsed = Command::parse(&rendered).unwrap();
        assert_eq!(cmd, reparsed);
    }
}
