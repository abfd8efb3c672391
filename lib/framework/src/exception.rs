use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

pub mod error_code;

pub type CoreRsResult<T> = Result<T, Exception>;

pub struct Exception {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub location: Option<String>,
    pub source: Option<Box<Exception>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "ERROR")]
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

impl Exception {
    // first code found walking down the source chain
    pub fn error_code(&self) -> Option<&str> {
        let mut current = Some(self);
        while let Some(exception) = current {
            if let Some(ref code) = exception.code {
                return Some(code);
            }
            current = exception.source.as_deref();
        }
        None
    }

    pub fn root_cause(&self) -> &Exception {
        let mut current = self;
        while let Some(ref source) = current.source {
            current = source;
        }
        current
    }
}

impl Debug for Exception {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Exception {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut current = Some(self);
        let mut first = true;
        while let Some(exception) = current {
            if !first {
                write!(f, "\ncaused by: ")?;
            }
            write!(f, "{} ", exception.severity)?;
            if let Some(ref code) = exception.code {
                write!(f, "[{code}] ")?;
            }
            write!(f, "{}", exception.message)?;
            if let Some(ref location) = exception.location {
                write!(f, " at {location}")?;
            }
            first = false;
            current = exception.source.as_deref();
        }
        Ok(())
    }
}

#[macro_export]
macro_rules! exception {
    ($(severity = $severity:expr,)? $(code = $code:expr,)? message = $message:expr $(,source = $source:expr)?) => {{
        #[allow(unused_variables)]
        let severity = $crate::exception::Severity::Error;
        $(
            let severity = $severity;
        )?
        #[allow(unused_variables)]
        let code: Option<String> = None;
        $(
            let code = Some($code.to_string());
        )?
        #[allow(unused_variables)]
        let source: Option<Box<$crate::exception::Exception>> = None;
        $(
            let source = Some(Box::new($source.into()));
        )?
        $crate::exception::Exception {
            severity,
            code,
            message: $message.to_string(),
            location: Some(format!("{}:{}", file!(), line!())),
            source,
        }
    }};
}

#[macro_export]
macro_rules! config_error {
    (message = $message:expr) => {{
        $crate::exception!(code = $crate::exception::error_code::INVALID_CONFIG, message = $message)
    }};
}

fn source_chain(source: Option<&(dyn Error + 'static)>) -> Option<Box<Exception>> {
    let source = source?;
    Some(Box::new(Exception {
        severity: Severity::Error,
        code: None,
        message: source.to_string(),
        location: None,
        source: source_chain(source.source()),
    }))
}

impl<T> From<T> for Exception
where
    T: Error + 'static,
{
    fn from(error: T) -> Self {
        Exception {
            severity: Severity::Error,
            code: None,
            message: error.to_string(),
            location: None,
            source: source_chain(error.source()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::Exception;
    use super::Severity;
    use super::error_code;

    #[test]
    fn error_code_from_source() {
        let exception = exception!(
            message = "failed to append event",
            source = exception!(code = error_code::IO_ERROR, message = "disk full")
        );
        assert_eq!(exception.error_code(), Some(error_code::IO_ERROR));
        assert_eq!(exception.root_cause().message, "disk full");
    }

    #[test]
    fn from_io_error() {
        let exception: Exception = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert_eq!(exception.severity, Severity::Error);
        assert_eq!(exception.message, "missing");
        assert!(exception.code.is_none());
    }

    #[test]
    fn display() {
        let exception = exception!(
            severity = Severity::Warn,
            code = "TEST",
            message = "outer",
            source = exception!(message = "inner")
        );
        let text = exception.to_string();
        assert!(text.starts_with("WARN [TEST] outer at "));
        assert!(text.contains("\ncaused by: ERROR inner at "));
    }
}
