//! Utility modules for lyrics-resolver

pub mod call_retry;
pub mod request_scope;

pub use call_retry::retry_transient;
pub use request_scope::RequestScope;
