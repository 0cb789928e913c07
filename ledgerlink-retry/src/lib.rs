//! # Ledgerlink Retry
//!
//! Resilient calls to the upstream aggregation provider.
//!
//! ## Features
//!
//! - **Failure Classification**: Network codes, HTTP status and provider error
//!   types decide whether a failure is transient
//! - **Exponential Backoff**: `base * 2^attempt`, jittered and capped
//! - **Retry-After**: A server hint larger than the computed delay wins
//! - **Observability**: Every retry is logged and can be observed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledgerlink_retry::{CallError, RetryPolicy, execute};
//!
//! # async fn fetch() -> Result<String, CallError> { Ok(String::new()) }
//! #[tokio::main]
//! async fn main() -> Result<(), CallError> {
//!     let policy = RetryPolicy::new("accounts_get").with_max_retries(2);
//!     let body = execute(&policy, || fetch()).await?;
//!     println!("{body}");
//!     Ok(())
//! }
//! ```

pub mod backoff;
mod classify;
mod error;
mod executor;
mod policy;

pub use classify::{Classification, Transient, classify};
pub use error::{CallError, CallResult, NetworkCode, ProviderErrorType};
pub use executor::execute;
pub use policy::{RetryEvent, RetryObserver, RetryPolicy};
