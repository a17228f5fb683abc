//! Ordered fallback strategies for capability-gated operations.
//!
//! A cross-platform operation is a chain of steps (native bridge, SDK helper, DOM fallback,
//! sentinel). Each step either completes, declines because its primitive is missing, or fails.
//! Failures are logged and fall through; the first completed step wins.

use std::future::Future;

use crate::{bridge::BridgeFuture, error::AdapterError};

/// Result of one strategy step.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// The step ran and produced a value.
    Completed(T),
    /// The primitive behind the step is missing on this host.
    Unsupported,
    /// The primitive exists but the call failed.
    Failed(AdapterError),
}

impl<T> Attempt<T> {
    /// Maps a bridge result into an attempt.
    pub fn from_result(result: Result<T, AdapterError>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Per-call dispatch state.
///
/// A call moves `Unchecked -> Checking -> Supported -> Invoking` on the native path and
/// `Unsupported -> FallbackInvoking` on the portable path; a chain reports one of the terminal
/// states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing has been evaluated yet.
    Unchecked,
    /// Capability probe in flight.
    Checking,
    /// Native primitive present.
    Supported,
    /// Native call in flight.
    Invoking,
    /// Native primitive missing.
    Unsupported,
    /// Portable fallback in flight.
    FallbackInvoking,
    /// A step completed.
    Succeeded,
    /// A native step failed and the chain moved to the next step.
    FailedFallback,
    /// Every available step failed.
    FailedTerminal,
}

impl DispatchState {
    /// Returns whether the state ends a dispatch.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FailedTerminal | Self::Unsupported
        )
    }
}

/// Outcome of [`StrategyChain::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome<T> {
    /// Value produced by the winning step.
    pub value: Option<T>,
    /// Terminal state: `Succeeded`, `Unsupported` (no step applied) or `FailedTerminal`.
    pub state: DispatchState,
    /// Name of the winning step.
    pub step: Option<&'static str>,
    /// Steps that failed on the way, in order.
    pub failures: Vec<(&'static str, AdapterError)>,
}

impl<T> DispatchOutcome<T> {
    /// Returns the produced value, if any.
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Returns the produced value or `fallback`.
    pub fn value_or(self, fallback: T) -> T {
        self.value.unwrap_or(fallback)
    }

    /// Returns whether a step other than the first one produced the value.
    pub fn recovered(&self) -> bool {
        self.state == DispatchState::Succeeded && !self.failures.is_empty()
    }
}

type Step<'a, T> = Box<dyn FnOnce() -> BridgeFuture<'a, Attempt<T>> + 'a>;

/// Ordered list of named strategy steps for one operation.
pub struct StrategyChain<'a, T> {
    operation: &'static str,
    steps: Vec<(&'static str, Step<'a, T>)>,
}

impl<'a, T: 'a> StrategyChain<'a, T> {
    /// Empty chain for `operation` (used in log messages).
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            steps: Vec::new(),
        }
    }

    /// Appends an asynchronous step.
    #[must_use]
    pub fn step<F, Fut>(mut self, name: &'static str, step: F) -> Self
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = Attempt<T>> + 'a,
    {
        self.steps
            .push((name, Box::new(move || Box::pin(step()) as BridgeFuture<'a, Attempt<T>>)));
        self
    }

    /// Appends a synchronous step.
    #[must_use]
    pub fn sync_step<F>(self, name: &'static str, step: F) -> Self
    where
        F: FnOnce() -> Attempt<T> + 'a,
    {
        self.step(name, move || std::future::ready(step()))
    }

    /// Runs the steps in order until one completes.
    pub async fn run(self) -> DispatchOutcome<T> {
        let operation = self.operation;
        let mut failures = Vec::new();

        for (name, step) in self.steps {
            match step().await {
                Attempt::Completed(value) => {
                    return DispatchOutcome {
                        value: Some(value),
                        state: DispatchState::Succeeded,
                        step: Some(name),
                        failures,
                    };
                }
                Attempt::Unsupported => {
                    tracing::debug!("[miniapp-host] {operation}: {name} unsupported");
                }
                Attempt::Failed(err) => {
                    tracing::warn!("[miniapp-host] {operation} via {name} failed: {err}");
                    failures.push((name, err));
                }
            }
        }

        DispatchOutcome {
            value: None,
            state: if failures.is_empty() {
                DispatchState::Unsupported
            } else {
                DispatchState::FailedTerminal
            },
            step: None,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn native_failure_falls_through_to_fallback() {
        let outcome = block_on(
            StrategyChain::new("copy_text")
                .step("native", || async {
                    Attempt::<bool>::Failed(AdapterError::bridge("VKWebAppCopyText", "denied"))
                })
                .sync_step("clipboard", || Attempt::Completed(true))
                .run(),
        );

        assert_eq!(outcome.value, Some(true));
        assert_eq!(outcome.state, DispatchState::Succeeded);
        assert_eq!(outcome.step, Some("clipboard"));
        assert!(outcome.recovered());
    }

    #[test]
    fn unsupported_everywhere_reports_unsupported() {
        let outcome = block_on(
            StrategyChain::<()>::new("share_story")
                .sync_step("native", || Attempt::Unsupported)
                .sync_step("dom", || Attempt::Unsupported)
                .run(),
        );

        assert_eq!(outcome.state, DispatchState::Unsupported);
        assert!(outcome.failures.is_empty());
        assert!(outcome.state.is_terminal());
    }

    #[test]
    fn all_failures_are_terminal_and_listed() {
        let outcome = block_on(
            StrategyChain::<String>::new("request_phone")
                .sync_step("native", || {
                    Attempt::Failed(AdapterError::bridge("requestPhone", "closed"))
                })
                .sync_step("event", || Attempt::Failed(AdapterError::Cancelled))
                .run(),
        );

        assert_eq!(outcome.state, DispatchState::FailedTerminal);
        assert_eq!(
            outcome.failures.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
            vec!["native", "event"]
        );
        assert_eq!(outcome.value_or("none".to_string()), "none");
    }

    #[test]
    fn later_steps_do_not_run_after_success() {
        let ran_second = std::cell::Cell::new(false);
        let outcome = block_on(
            StrategyChain::new("vibrate")
                .sync_step("native", || Attempt::Completed(1))
                .sync_step("dom", || {
                    ran_second.set(true);
                    Attempt::Completed(2)
                })
                .run(),
        );

        assert_eq!(outcome.into_value(), Some(1));
        assert!(!ran_second.get());
    }
}
