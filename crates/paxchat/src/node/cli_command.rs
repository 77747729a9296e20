use std::fmt;

/// The node CLI grammar. Distinct from `paxchat_core::Command`:
/// `view`/`viewall`/`exit` are local-only and never travel the wire, and
/// `choose` here still carries a `server_id` reference into the
/// collected-responses buffer rather than literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    Create { context_id: u64 },
    Query { context_id: u64, text: String },
    Choose { context_id: u64, server_id: i64 },
    View { context_id: u64 },
    ViewAll,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeCommandError {
    #[error("empty command")]
    Empty,
    #[error("unrecognised node command: {0}")]
    Unrecognised(String),
}

impl NodeCommand {
    pub fn parse(line: &str) -> Result<NodeCommand, NodeCommandError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(NodeCommandError::Empty)?;

        let malformed = || NodeCommandError::Unrecognised(line.to_string());
        match verb {
            "create" => {
                let context_id = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
                Ok(NodeCommand::Create { context_id })
            }
            "query" => {
                let context_id = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
                let text: Vec<&str> = tokens.collect();
                if text.is_empty() {
                    return Err(malformed());
                }
                Ok(NodeCommand::Query {
                    context_id,
                    text: text.join(" "),
                })
            }
            "choose" => {
                let context_id = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
                let server_id = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
                Ok(NodeCommand::Choose { context_id, server_id })
            }
            "view" => {
                let context_id = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(malformed)?;
                Ok(NodeCommand::View { context_id })
            }
            "viewall" => Ok(NodeCommand::ViewAll),
            "exit" => Ok(NodeCommand::Exit),
            _ => Err(NodeCommandError::Unrecognised(verb.to_string())),
        }
    }
}

impl fmt::Display for NodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeCommand::Create { context_id } => write!(f, "create {context_id}"),
            NodeCommand::Query { context_id, text } => write!(f, "query {context_id} {text}"),
            NodeCommand::Choose { context_id, server_id } => write!(f, "choose {context_id} {server_id}"),
            NodeCommand::View { context_id } => write!(f, "view {context_id}"),
            NodeCommand::ViewAll => write!(f, "viewall"),
            NodeCommand::Exit => write!(f, "exit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create() {
        assert_eq!(NodeCommand::parse("create 7").unwrap(), NodeCommand::Create { context_id: 7 });
    }

    #[test]
    fn parses_query() {
        assert_eq!(
            NodeCommand::parse("query 7 hello world").unwrap(),
            NodeCommand::Query {
                context_id: 7,
                text: "hello world".to_string()
            }
        );
    }

    #[test]
    fn parses_choose_with_server_id() {
        assert_eq!(
            NodeCommand::parse("choose 7 0").unwrap(),
            NodeCommand::Choose {
                context_id: 7,
                server_id: 0
            }
        );
    }

    #[test]
    fn parses_view_and_viewall_and_exit() {
        assert_eq!(NodeCommand::parse("view 7").unwrap(), NodeCommand::View { context_id: 7 });
        assert_eq!(NodeCommand::parse("viewall").unwrap(), NodeCommand::ViewAll);
        assert_eq!(NodeCommand::parse("exit").unwrap(), NodeCommand::Exit);
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(NodeCommand::parse("frobnicate").is_err());
    }

    #[test]
    fn rejects_empty_line() {
        assert!(matches!(NodeCommand::parse(""), Err(NodeCommandError::Empty)));
    }
}
