use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The API key is not configured, chatting is impossible.
    ConfigurationMissing,
    /// The remote completion service failed or broke off.
    ServiceUnavailable,
    /// A reply is still being generated for this session.
    Busy,
    /// The submitted text is blank.
    EmptyInput,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ConfigurationMissing => write!(f, "Configuration missing"),
            ErrorKind::ServiceUnavailable => write!(f, "Service unavailable"),
            ErrorKind::Busy => write!(f, "Session is busy"),
            ErrorKind::EmptyInput => write!(f, "Empty input"),
        }
    }
}

/// Describes a chat error.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates a new error with the `ConfigurationMissing` kind.
    #[inline]
    pub fn configuration_missing() -> Self {
        Self::from(ErrorKind::ConfigurationMissing)
    }

    /// Creates a new error with the `ServiceUnavailable` kind.
    #[inline]
    pub fn service_unavailable() -> Self {
        Self::from(ErrorKind::ServiceUnavailable)
    }

    /// Creates a new error with the `Busy` kind.
    #[inline]
    pub fn busy() -> Self {
        Self::from(ErrorKind::Busy)
    }

    /// Creates a new error with the `EmptyInput` kind.
    #[inline]
    pub fn empty_input() -> Self {
        Self::from(ErrorKind::EmptyInput)
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}
