use thiserror::Error;

/// What went wrong, as far as session handling cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server rejected our credentials; the user has to log in again.
    Unauthorized,
    /// The server could not be reached or did not answer.
    Network,
    Other,
}

/// Fragments that mark a server message as an authorization failure. Servers only hand us
/// free-form text for GraphQL errors, so this is the best available signal there.
const UNAUTHORIZED_MARKERS: [&str; 3] = ["Unauthorized", "permission denied", "status code 401"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorKind {
    pub fn classify(message: &str) -> Self {
        if UNAUTHORIZED_MARKERS.iter().any(|marker| message.contains(marker)) {
            ErrorKind::Unauthorized
        } else {
            ErrorKind::Other
        }
    }
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ClientError {
            kind,
            message: message.into(),
        }
    }

    /// An error known only by its message, e.g. one reported in a GraphQL response.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        ClientError {
            kind: ErrorKind::classify(&message),
            message,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// A non-success HTTP status.
    pub fn status(code: u16) -> Self {
        let kind = match code {
            401 => ErrorKind::Unauthorized,
            _ => ErrorKind::Other,
        };
        Self::new(kind, format!("Response not successful: Received status code {}", code))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}
