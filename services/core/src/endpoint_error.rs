use std::error::Error;
use std::fmt::Display;

use async_graphql::ErrorExtensions;

use crate::operation_error::{ErrorCode, OperationError};

#[derive(Debug)]
pub enum EndpointError<E: OperationError> {
    Validation(String),
    Internal,
    Operation(E),
}

impl<E: OperationError> EndpointError<E> {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal() -> Self {
        Self::Internal
    }

    pub fn operation(err: E) -> Self {
        Self::Operation(err)
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::Internal => "Internal",
            Self::Operation(_) => "Operation",
        }
    }
}

impl<E: OperationError> OperationError for EndpointError<E> {
    fn code(&self) -> ErrorCode {
        match self {
            EndpointError::Validation(_) => ErrorCode::InvalidArgument,
            EndpointError::Internal => ErrorCode::Internal,
            EndpointError::Operation(e) => e.code(),
        }
    }
}

impl<E: OperationError> Error for EndpointError<E> {}

impl<E: OperationError> Display for EndpointError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            EndpointError::Validation(msg) => msg.clone(),
            EndpointError::Internal => String::from("Internal server error."),
            EndpointError::Operation(err) => err.to_string(),
        };

        write!(f, "{}: {}", self.kind(), msg)
    }
}

/// Use `.extend()` rather than `?` to turn an endpoint error into a GraphQL error: the latter goes
/// through async-graphql's `Display` conversion and loses the code.
impl<E: OperationError> ErrorExtensions for EndpointError<E> {
    fn extend(&self) -> async_graphql::Error {
        // Operation errors reach the client with their own message only, so that client-side
        // classification keeps seeing the original wording.
        let message = match self {
            EndpointError::Operation(e) => e.to_string(),
            _ => self.to_string(),
        };
        let code = self.code();
        async_graphql::Error::new(message).extend_with(|_, ext| ext.set("code", code.as_str()))
    }
}
