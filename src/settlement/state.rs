//! Per-request settlement state machine

use std::fmt;

/// Lifecycle of one paid request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementState {
    Pending,
    Verified,
    Executing,
    Settling,
    Settled,
    Failed,
}

impl SettlementState {
    /// Whether `next` may follow `self`
    pub fn can_transition_to(self, next: SettlementState) -> bool {
        use SettlementState::*;
        matches!(
            (self, next),
            (Pending, Verified)
                | (Pending, Failed)
                | (Verified, Executing)
                | (Verified, Failed)
                | (Executing, Settling)
                | (Executing, Failed)
                | (Settling, Settled)
                | (Settling, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SettlementState::Settled | SettlementState::Failed)
    }
}

impl fmt::Display for SettlementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettlementState::Pending => "pending",
            SettlementState::Verified => "verified",
            SettlementState::Executing => "executing",
            SettlementState::Settling => "settling",
            SettlementState::Settled => "settled",
            SettlementState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Rejected state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid settlement transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SettlementState,
    pub to: SettlementState,
}

/// Every state a request passed through, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementTrace {
    states: Vec<SettlementState>,
}

impl SettlementTrace {
    /// A trace sitting in `Pending`
    pub fn new() -> Self {
        Self {
            states: vec![SettlementState::Pending],
        }
    }

    pub fn current(&self) -> SettlementState {
        // Never empty: construction pushes Pending
        self.states
            .last()
            .copied()
            .unwrap_or(SettlementState::Pending)
    }

    /// Move to `next`, refusing transitions outside the lifecycle graph
    pub fn advance(&mut self, next: SettlementState) -> Result<(), InvalidTransition> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(InvalidTransition { from, to: next });
        }
        self.states.push(next);
        Ok(())
    }

    pub fn states(&self) -> &[SettlementState] {
        &self.states
    }

    /// Whether `state` was visited
    pub fn visited(&self, state: SettlementState) -> bool {
        self.states.contains(&state)
    }
}

impl Default for SettlementTrace {
    fn default() -> Self {
        Self::new()
    }
}
