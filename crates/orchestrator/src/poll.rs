//! Rollout polling as a pure state machine.
//!
//! The driver feeds one [`Observation`] per poll into [`transition`]; all
//! timing decisions are made here from the elapsed time it passes in, so the
//! machine can be exercised without a clock.

use std::time::Duration;

use common::platform::{CONDITION_FAILED, CONDITION_SUCCEEDED, Service};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait after submission before the first status read.
    pub settle_delay: Duration,
    pub interval: Duration,
    /// Overall budget, measured from submission.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_DEPLOY_TIMEOUT,
        }
    }
}

/// The latest reconciliation condition as last seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSnapshot {
    pub state: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Status {
        condition: Option<ConditionSnapshot>,
        uri: Option<String>,
    },
    /// The status read failed with a transient error.
    ReadFailed,
}

impl Observation {
    pub fn from_service(service: &Service) -> Self {
        let condition = service.latest_condition().map(|condition| ConditionSnapshot {
            state: condition
                .state
                .clone()
                .unwrap_or_else(|| "CONDITION_STATE_UNSPECIFIED".to_string()),
            message: condition.message.clone(),
        });
        Observation::Status {
            condition,
            uri: service.uri.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Submitted,
    Polling { last: Option<ConditionSnapshot> },
    Succeeded { uri: String },
    Failed { reason: String },
    TimedOut { last: Option<ConditionSnapshot> },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded { .. } | PollState::Failed { .. } | PollState::TimedOut { .. }
        )
    }

    pub fn last_condition(&self) -> Option<&ConditionSnapshot> {
        match self {
            PollState::Polling { last } | PollState::TimedOut { last } => last.as_ref(),
            _ => None,
        }
    }
}

/// Advance the machine by one observation taken `elapsed` after submission.
///
/// A terminal condition wins over the timeout; a transient read failure keeps
/// the last known condition.
pub fn transition(
    state: PollState,
    elapsed: Duration,
    observation: Observation,
    policy: &PollPolicy,
) -> PollState {
    if state.is_terminal() {
        return state;
    }
    let previous = state.last_condition().cloned();

    let last = match observation {
        Observation::Status {
            condition: Some(condition),
            uri,
        } => {
            if condition.state == CONDITION_SUCCEEDED {
                return PollState::Succeeded {
                    uri: uri.unwrap_or_default(),
                };
            }
            if condition.state == CONDITION_FAILED {
                let reason = condition
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "rollout reported CONDITION_FAILED".to_string());
                return PollState::Failed { reason };
            }
            Some(condition)
        }
        Observation::Status {
            condition: None, ..
        }
        | Observation::ReadFailed => previous,
    };

    if elapsed >= policy.timeout {
        PollState::TimedOut { last }
    } else {
        PollState::Polling { last }
    }
}
