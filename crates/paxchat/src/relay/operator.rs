use std::fmt;

/// A parsed relay operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    FailLink(i64, i64),
    FixLink(i64, i64),
    FailNode(i64),
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct OperatorCommandError(String);

impl fmt::Display for OperatorCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised relay command: {}", self.0)
    }
}

impl OperatorCommand {
    /// Unknown or ill-formed lines are logged and ignored by the caller;
    /// this just reports the parse failure so the caller can decide how to
    /// log it.
    pub fn parse(line: &str) -> Result<OperatorCommand, OperatorCommandError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or_else(|| OperatorCommandError(line.to_string()))?;

        let err = || OperatorCommandError(line.to_string());
        match verb {
            "failLink" => {
                let s = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(err)?;
                let d = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(err)?;
                Ok(OperatorCommand::FailLink(s, d))
            }
            "fixLink" => {
                let s = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(err)?;
                let d = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(err)?;
                Ok(OperatorCommand::FixLink(s, d))
            }
            "failNode" => {
                let n = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(err)?;
                Ok(OperatorCommand::FailNode(n))
            }
            "exit" => Ok(OperatorCommand::Exit),
            _ => Err(err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fail_link() {
        assert_eq!(
            OperatorCommand::parse("failLink 0 1").unwrap(),
            OperatorCommand::FailLink(0, 1)
        );
    }

    #[test]
    fn parses_fix_link() {
        assert_eq!(
            OperatorCommand::parse("fixLink 0 1").unwrap(),
            OperatorCommand::FixLink(0, 1)
        );
    }

    #[test]
    fn parses_fail_node() {
        assert_eq!(
            OperatorCommand::parse("failNode 2").unwrap(),
            OperatorCommand::FailNode(2)
        );
    }

    #[test]
    fn parses_exit() {
        assert_eq!(OperatorCommand::parse("exit").unwrap(), OperatorCommand::Exit);
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(OperatorCommand::parse("reticulateSplines").is_err());
    }

    #[test]
    fn rejects_missing_arguments() {
        assert!(OperatorCommand::parse("failLink 0").is_err());
    }
}
