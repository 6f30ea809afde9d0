use std::fmt;
use std::str::FromStr;

/// Fixed reply payload for a verb the server does not recognize.
pub const UNDEFINED_OPERATION: &str = "Undefined operation";

/// A parsed request payload.
///
/// The request payload grammar is `"<op> <args>"`. The only operation the
/// system currently carries is `increment <integer>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Increment(i64),
}

/// Why a payload failed to parse as a [`Command`].
///
/// Both variants become reply payload text on the server side, never a
/// connection fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("{UNDEFINED_OPERATION}")]
    UndefinedOperation,
    #[error("invalid argument for {verb}: {reason}")]
    InvalidArgument { verb: &'static str, reason: String },
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(payload: &str) -> Result<Self, CommandError> {
        let mut parts = payload.split_whitespace();
        match parts.next() {
            Some("increment") => {
                let arg = parts.next().unwrap_or("");
                let n = arg.parse::<i64>().map_err(|e| CommandError::InvalidArgument {
                    verb: "increment",
                    reason: format!("{:?}: {}", arg, e),
                })?;
                Ok(Command::Increment(n))
            }
            _ => Err(CommandError::UndefinedOperation),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Increment(n) => write!(f, "increment {}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_increment() {
        assert_eq!("increment 42".parse(), Ok(Command::Increment(42)));
        assert_eq!("increment -5".parse(), Ok(Command::Increment(-5)));
    }

    #[test]
    fn tolerates_extra_whitespace() {
        assert_eq!("  increment   7 ".parse(), Ok(Command::Increment(7)));
    }

    #[test]
    fn unknown_verb_is_undefined_operation() {
        let err = "decrement 42".parse::<Command>().unwrap_err();
        assert_eq!(err, CommandError::UndefinedOperation);
        assert_eq!(err.to_string(), UNDEFINED_OPERATION);
    }

    #[test]
    fn empty_payload_is_undefined_operation() {
        assert_eq!("".parse::<Command>(), Err(CommandError::UndefinedOperation));
    }

    #[test]
    fn malformed_integer_is_invalid_argument() {
        let err = "increment forty-two".parse::<Command>().unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument { verb: "increment", .. }));
    }

    #[test]
    fn missing_argument_is_invalid_argument() {
        assert!(matches!(
            "increment".parse::<Command>().unwrap_err(),
            CommandError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn round_trips_through_display() {
        let cmd = Command::Increment(99);
        assert_eq!(cmd.to_string().parse::<Command>().unwrap(), cmd);
    }
}
