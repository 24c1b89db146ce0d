//! The uniform envelope returned by every agent invocation

use super::payload::AgentPayload;
use super::AgentKind;
use crate::budget::{AgentCost, BudgetDenial, BudgetOverrun};
use crate::types::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failure taxonomy used for retry and terminal-status decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Network, rate limit or upstream 5xx; retried once
    Transient,
    /// Malformed agent output; never retried
    Validation,
    Timeout,
    /// The agent (or the run) cannot make progress
    Fatal,
    /// The agent panicked
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Upstream(#[from] AppError),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("no usable company context: {0}")]
    Unusable(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("agent panicked: {0}")]
    Panicked(String),
}

impl AgentError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AgentError::Upstream(e) if e.is_transient() => ErrorClass::Transient,
            AgentError::Upstream(AppError::InvalidInput(_)) => ErrorClass::Validation,
            AgentError::Upstream(_) => ErrorClass::Fatal,
            AgentError::InvalidOutput(_) => ErrorClass::Validation,
            AgentError::Timeout(_) => ErrorClass::Timeout,
            AgentError::Unusable(_) | AgentError::Cancelled => ErrorClass::Fatal,
            AgentError::Panicked(_) => ErrorClass::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// One diagnostic entry on a run; never removed once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// `None` for run-level failures raised by the orchestrator
    pub agent: Option<AgentKind>,
    pub message: String,
    pub class: ErrorClass,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(agent: Option<AgentKind>, class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            agent,
            message: message.into(),
            class,
            timestamp: Utc::now(),
        }
    }

    pub fn from_error(agent: AgentKind, error: &AgentError) -> Self {
        Self::new(Some(agent), error.class(), error.to_string())
    }

    pub fn fatal(agent: Option<AgentKind>, message: impl Into<String>) -> Self {
        Self::new(agent, ErrorClass::Fatal, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentOutcome {
    Succeeded,
    /// Budget was denied and the agent's cheaper fallback produced the payload
    Degraded,
    /// Budget was denied and the agent did not run
    Skipped,
    Failed,
}

/// Result of one agent invocation; never mutated after the adapter returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: AgentKind,
    pub outcome: AgentOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<AgentPayload>,
    pub cost: AgentCost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<BudgetDenial>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overruns: Vec<BudgetOverrun>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl AgentResult {
    pub fn succeeded(agent: AgentKind, payload: AgentPayload, cost: AgentCost) -> Self {
        Self {
            agent,
            outcome: AgentOutcome::Succeeded,
            payload: Some(payload),
            cost,
            error: None,
            denial: None,
            overruns: Vec::new(),
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn failed(agent: AgentKind, error: ErrorRecord, cost: AgentCost) -> Self {
        Self {
            agent,
            outcome: AgentOutcome::Failed,
            payload: None,
            cost,
            error: Some(error),
            denial: None,
            overruns: Vec::new(),
            attempts: 1,
            duration_ms: 0,
        }
    }

    pub fn skipped(agent: AgentKind, denial: BudgetDenial) -> Self {
        Self {
            agent,
            outcome: AgentOutcome::Skipped,
            payload: None,
            cost: AgentCost::default(),
            error: None,
            denial: Some(denial),
            overruns: Vec::new(),
            attempts: 0,
            duration_ms: 0,
        }
    }

    pub fn degraded(agent: AgentKind, payload: AgentPayload, denial: BudgetDenial) -> Self {
        Self {
            outcome: AgentOutcome::Degraded,
            payload: Some(payload),
            ..Self::skipped(agent, denial)
        }
    }

    /// Placeholder for an agent whose task never reported back
    pub fn missing(agent: AgentKind, reason: impl Into<String>) -> Self {
        Self::failed(
            agent,
            ErrorRecord::new(Some(agent), ErrorClass::Internal, reason),
            AgentCost::default(),
        )
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AgentOutcome::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            AgentError::Upstream(AppError::Search("503".into())).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            AgentError::Upstream(AppError::Configuration("no key".into())).class(),
            ErrorClass::Fatal
        );
        assert_eq!(
            AgentError::InvalidOutput("bad json".into()).class(),
            ErrorClass::Validation
        );
        assert_eq!(
            AgentError::Timeout(Duration::from_secs(1)).class(),
            ErrorClass::Timeout
        );
        assert_eq!(AgentError::Panicked("boom".into()).class(), ErrorClass::Internal);
    }

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(AgentError::Upstream(AppError::LLM("429".into())).is_retryable());
        assert!(!AgentError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!AgentError::InvalidOutput("x".into()).is_retryable());
    }

    #[test]
    fn test_timeout_message() {
        let err = AgentError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timed out after 1.5s");
    }
}
