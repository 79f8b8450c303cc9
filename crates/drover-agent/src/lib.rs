//! Agent invocation: the transport seam, failure classification, and the
//! retry/fallback runner.
//!
//! The orchestrator never talks to a model directly. It hands each stage
//! run to an [`AgentRunner`], which drives an [`AgentInvoker`]
//! implementation through bounded in-place retries and same-run fallback
//! substitution, and reports the effort the run consumed.
//!
//! # Main types
//!
//! - [`AgentInvoker`] — One bounded invocation of agent x item x model.
//! - [`InvokeError`] — Failure taxonomy driving the recovery strategy.
//! - [`RetryPolicy`] — Exponential backoff bounds.
//! - [`AgentRunner`] — Retry and fallback logic around an invoker.
//! - [`SimulatedInvoker`] — Deterministic invoker for dry runs.

/// Invoker trait, failure taxonomy, and the dry-run simulator.
pub mod invoker;
/// Retry policy and the stage runner.
pub mod runner;

pub use invoker::{AgentInvoker, InvokeError, InvokeOutput, SimulatedInvoker};
pub use runner::{AgentReport, AgentRunner, RetryPolicy, StageFailure};
