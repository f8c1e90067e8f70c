use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Timeout,
    Protocol(String),
    Uninitialized,
    InvalidMode(String),
    InvalidTemperature(f64),
    InvalidConfig(String),
    Io(std::io::Error),
}

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeout or transport failure reaching the device.
    Connectivity,
    /// Device answered with something we could not interpret.
    Protocol,
    /// A command was issued before any successful refresh.
    Uninitialized,
    /// Bad configuration or rejected command arguments.
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Timeout => ErrorKind::Connectivity,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Uninitialized => ErrorKind::Uninitialized,
            Error::InvalidMode(_)
            | Error::InvalidTemperature(_)
            | Error::InvalidConfig(_)
            | Error::Io(_) => ErrorKind::Config,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Uninitialized => write!(f, "no device state yet (refresh has not succeeded)"),
            Error::InvalidMode(mode) => write!(f, "invalid mode: {mode:?}"),
            Error::InvalidTemperature(t) => write!(f, "invalid temperature: {t}"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(format!("malformed JSON: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(Error::Timeout.kind(), ErrorKind::Connectivity);
        assert_eq!(Error::Protocol("x".into()).kind(), ErrorKind::Protocol);
        assert_eq!(Error::Uninitialized.kind(), ErrorKind::Uninitialized);
        assert_eq!(Error::InvalidConfig("x".into()).kind(), ErrorKind::Config);
        assert_eq!(Error::InvalidTemperature(f64::NAN).kind(), ErrorKind::Config);
    }

    #[test]
    fn json_errors_are_protocol_errors() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
