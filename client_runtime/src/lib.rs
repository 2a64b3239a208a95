//! Client-side session handling for the demo: reading the page query, starting the OAuth
//! redirect, building the GraphQL client and keeping it in step with login and logout.
//!
//! Browser facilities (storage, navigation, routing) are traits so any host can provide them.

pub mod config;
pub mod dev_proxy;
pub mod error;
pub mod navigation;
pub mod oauth;
pub mod provider;
pub mod query;
pub mod session;
pub mod storage;
pub mod transport;

pub use error::{ClientError, ErrorKind};
pub use provider::{create_provider, ClientProvider, ProviderOverrides};
pub use session::{on_login, on_logout, ResetOutcome};
pub use storage::{KeyValueStore, MemoryStore};
