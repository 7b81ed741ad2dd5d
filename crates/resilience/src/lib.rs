//! Resilience primitives for calls to remote collaborators.
//!
//! A [`Guard`] combines a [`CircuitBreaker`], a [`RetryPolicy`] and a
//! per-attempt timeout. Only errors that report themselves as transient
//! through [`IsTransient`] count against the breaker and are retried;
//! anything else is handed back to the caller untouched.

pub mod breaker;
pub mod guard;
pub mod retry;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Permit};
pub use guard::{Guard, GuardConfig, GuardError};
pub use retry::{IsTransient, RetryPolicy};
