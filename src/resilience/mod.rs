//! 弹性模式模块：提供重试退避与超时控制等可靠性保障机制。
//!
//! # Resilience Primitives Module
//!
//! Building blocks the orchestrator composes around every call into the client
//! SDK.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry`] | Exponential backoff over a fresh future per attempt |
//! | [`timeout`] | Ceiling with a distinct, labelled timeout error |
//!
//! ## Retry + timeout
//!
//! The usual composition puts the timeout *inside* the retry factory, so every
//! attempt gets its own ceiling:
//!
//! ```rust
//! use ai_lib_orchestrator::resilience::{with_timeout, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn demo() -> ai_lib_orchestrator::Result<()> {
//! let policy = RetryPolicy::new(2, Duration::from_secs(1));
//! let answer = policy
//!     .run("Prompt 1", || {
//!         let answer = async { Ok::<_, ai_lib_orchestrator::Error>(42) };
//!         with_timeout(answer, Duration::from_secs(30), "Prompt 1")
//!     })
//!     .await?;
//! assert_eq!(answer, 42);
//! # Ok(())
//! # }
//! ```

pub mod retry;
pub mod timeout;

pub use retry::{retry_async, RetryPolicy, RetryStats};
pub use timeout::with_timeout;
