//! Resolution services
//!
//! - **result_cache** - bounded TTL memo store
//! - **call_governor** - deadline, per-call timeout/retry, outbound permit pool
//! - **resolver** - the resolution engine

pub mod call_governor;
pub mod resolver;
pub mod result_cache;

pub use call_governor::{CallGovernor, CallKind, GovernorPolicy};
pub use resolver::{CacheSettings, LyricsResolver, ProbeStrategy, ResolverSettings};
pub use result_cache::{Cacheable, ResultCache};
