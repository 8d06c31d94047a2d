//! Panel session core: credential storage, session state and route guarding

pub mod config;
pub mod error;
pub mod route;
pub mod state;
pub mod storage;

pub use crate::config::ClientConfig;
pub use error::{CoreError, CoreResult, StorageError, StorageResult};
pub use route::{GuardDecision, LogNavigator, Navigator, Route};
pub use state::{SessionContext, SessionState, UserProfile};
pub use storage::{CredentialStore, Durability, FileStore, MemoryStore, SessionStores};
