use core::fmt;
use std::env;

use thiserror::Error;

pub(crate) enum ContextKey {
    BindAddress,
    DatabaseUrl,
    JwtSecret,
}

pub(crate) struct Context {
    pub bind_address: String,
    pub database_url: String,
    pub jwt_secret: String,
}

#[derive(Debug, Error)]
pub(crate) enum ContextError {
    #[error("Environment variable {0} is not set.")]
    Missing(String),
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BindAddress => write!(f, "BIND_ADDRESS"),
            Self::DatabaseUrl => write!(f, "DATABASE_URL"),
            Self::JwtSecret => write!(f, "JWT_SECRET"),
        }
    }
}

impl Context {
    pub fn from_env() -> Result<Self, ContextError> {
        let bind_address = Context::key(&ContextKey::BindAddress).unwrap_or_else(|| String::from("0.0.0.0:4000"));
        log::info!("Binding to {}.", bind_address);

        Ok(Context {
            bind_address,
            database_url: Context::required(&ContextKey::DatabaseUrl)?,
            jwt_secret: Context::required(&ContextKey::JwtSecret)?,
        })
    }

    pub fn key(key: &ContextKey) -> Option<String> {
        env::var(key.to_string()).ok()
    }

    fn required(key: &ContextKey) -> Result<String, ContextError> {
        Context::key(key).ok_or_else(|| ContextError::Missing(key.to_string()))
    }
}
