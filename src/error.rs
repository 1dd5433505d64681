use std::fmt;

use crate::sink::SinkError;

/// Errors that can occur while routing events into the audit log.
///
/// Exclusion decisions never produce errors: ambiguous identities fail open
/// and excluded requests are dropped silently. Only collaborator failures
/// and registry misuse surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The log sink rejected a forwarded entry
    Sink(SinkError),
    /// A connector with the same name is already registered
    DuplicateConnector(String),
    /// A settings key does not name a known exclusion dimension
    UnknownDimension(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Sink(e) => write!(f, "Log sink failure: {}", e),
            Error::DuplicateConnector(name) => {
                write!(f, "Connector '{}' is already registered", name)
            }
            Error::UnknownDimension(key) => write!(f, "Unknown exclusion dimension '{}'", key),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Sink(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SinkError> for Error {
    fn from(e: SinkError) -> Self {
        Error::Sink(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkErrorKind;
    use std::error::Error as _;

    #[test]
    fn sink_errors_convert_and_keep_their_source() {
        let err: Error = SinkError::new(SinkErrorKind::Io).because("disk full").into();

        assert!(matches!(err, Error::Sink(_)));
        assert!(err.to_string().contains("disk full"));
        assert!(err.source().is_some());
    }

    #[test]
    fn registry_errors_display_the_offending_name() {
        let err = Error::DuplicateConnector("comments".to_string());
        assert_eq!(err.to_string(), "Connector 'comments' is already registered");

        let err = Error::UnknownDimension("widgets".to_string());
        assert!(err.to_string().contains("widgets"));
        assert!(err.source().is_none());
    }
}
