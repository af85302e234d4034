//! Problem lifecycle state machine.
//!
//! A closed machine with five states and five events. Every (state, event)
//! pair either maps to a different state or is rejected; there are no
//! self-loops and no terminal states (`resolved` and `wont_fix` both reopen
//! to `triaged`).
//!
//! ```text
//! identified --TRIAGE--> triaged --START--> in_progress --RESOLVE--> resolved
//!                           |                    |                      |
//!                           +------WONT_FIX------+--> wont_fix          |
//!                           ^                           |               |
//!                           +-----------REOPEN----------+---------------+
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle state of a problem, persisted as snake_case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemState {
    Identified,
    Triaged,
    InProgress,
    Resolved,
    WontFix,
}

/// Event a caller may send to a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemEvent {
    Triage,
    Start,
    Resolve,
    WontFix,
    Reopen,
}

/// Every legal transition. Anything absent is rejected.
const TRANSITIONS: &[(ProblemState, ProblemEvent, ProblemState)] = &[
    (ProblemState::Identified, ProblemEvent::Triage, ProblemState::Triaged),
    (ProblemState::Triaged, ProblemEvent::Start, ProblemState::InProgress),
    (ProblemState::Triaged, ProblemEvent::WontFix, ProblemState::WontFix),
    (ProblemState::InProgress, ProblemEvent::Resolve, ProblemState::Resolved),
    (ProblemState::InProgress, ProblemEvent::WontFix, ProblemState::WontFix),
    (ProblemState::Resolved, ProblemEvent::Reopen, ProblemState::Triaged),
    (ProblemState::WontFix, ProblemEvent::Reopen, ProblemState::Triaged),
];

impl ProblemState {
    pub const ALL: [ProblemState; 5] = [
        ProblemState::Identified,
        ProblemState::Triaged,
        ProblemState::InProgress,
        ProblemState::Resolved,
        ProblemState::WontFix,
    ];

    /// State assigned to newly created problems.
    pub const INITIAL: ProblemState = ProblemState::Identified;

    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemState::Identified => "identified",
            ProblemState::Triaged => "triaged",
            ProblemState::InProgress => "in_progress",
            ProblemState::Resolved => "resolved",
            ProblemState::WontFix => "wont_fix",
        }
    }

    /// Look up the state reached by `event`, if the event is legal here.
    pub fn next(self, event: ProblemEvent) -> Option<ProblemState> {
        TRANSITIONS
            .iter()
            .find(|(from, on, _)| *from == self && *on == event)
            .map(|(_, _, to)| *to)
    }

    /// Events accepted from this state, in table order.
    pub fn allowed_events(self) -> Vec<ProblemEvent> {
        TRANSITIONS
            .iter()
            .filter(|(from, _, _)| *from == self)
            .map(|(_, event, _)| *event)
            .collect()
    }
}

impl ProblemEvent {
    pub const ALL: [ProblemEvent; 5] = [
        ProblemEvent::Triage,
        ProblemEvent::Start,
        ProblemEvent::Resolve,
        ProblemEvent::WontFix,
        ProblemEvent::Reopen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemEvent::Triage => "TRIAGE",
            ProblemEvent::Start => "START",
            ProblemEvent::Resolve => "RESOLVE",
            ProblemEvent::WontFix => "WONT_FIX",
            ProblemEvent::Reopen => "REOPEN",
        }
    }
}

impl fmt::Display for ProblemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ProblemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known state names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown problem state '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for ProblemState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProblemState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

/// Returned when a string is not one of the known event names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown problem event '{0}'")]
pub struct UnknownEvent(pub String);

impl FromStr for ProblemEvent {
    type Err = UnknownEvent;

    /// Event names are matched exactly (`TRIAGE`, not `triage`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProblemEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// Rejection of an event from a given state.
///
/// Unknown event names and known events that are not legal from `state`
/// produce the same rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition: cannot send {event} from state \"{state}\"")]
pub struct InvalidTransition {
    pub event: String,
    pub state: ProblemState,
}

/// Apply `event` to `state`.
pub fn transition(state: ProblemState, event: &str) -> Result<ProblemState, InvalidTransition> {
    event
        .parse::<ProblemEvent>()
        .ok()
        .and_then(|event| state.next(event))
        .ok_or_else(|| InvalidTransition {
            event: event.to_string(),
            state,
        })
}
