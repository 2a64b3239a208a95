use std::convert::Infallible;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Machine readable code attached to every error returned to GraphQL clients under
/// `extensions.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unauthenticated,
    PermissionDenied,
    NotFound,
    InvalidArgument,
    Internal,
}

/// Trait to be implemented by errors returned by the different operations of services.
pub trait OperationError: Error {
    /// Code corresponding to this error.
    fn code(&self) -> ErrorCode;
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Internal => "INTERNAL",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OperationError for Infallible {
    fn code(&self) -> ErrorCode {
        match *self {}
    }
}
