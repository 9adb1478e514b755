//! dcintel dispatch: rate-limited query dispatcher
//!
//! Issues read-only tool calls against the market-intelligence backend. This is
//! the only stateful stage of the pipeline: the rate windows and the run-scoped
//! dedup cache live here, behind locks, and nowhere else.
//!
//! - validation against the tool catalog before any network activity
//! - per-tier daily and per-minute ceilings (every attempt counts)
//! - bounded retries with exponential backoff, jitter and `Retry-After`
//! - identical calls within a run share one network request
//!
//! The network sits behind the [`Transport`] trait; [`HttpTransport`] is the
//! reqwest implementation (feature `http`, on by default).

pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod limiter;
pub mod transport;

pub use backoff::Backoff;
pub use config::{Credential, DispatchConfig, RateLimits, RetryPolicy, Tier, MAX_ATTEMPTS};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{Ceiling, ConfigError, DispatchError, TransportError};
pub use limiter::{Admission, RateLimiter};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{parse_retry_after, HttpReply, HttpRequest, Transport};
