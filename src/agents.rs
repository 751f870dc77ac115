//! The simulated deal team.
//!
//! Agents are fixed roles, not processes: each pipeline step runs under one
//! agent identity whose visible status the step runner drives. The roster is
//! a persisted state slice so a restarted session shows the same team.

use serde::{Deserialize, Serialize};

/// Fixed identity of one deal-team member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    Strategist,
    Scout,
    Diligence,
    CompsAnalyst,
    Structurer,
    FieldVerifier,
    Creative,
    Partner,
}

impl AgentId {
    /// Every roster member, in display order.
    pub const ALL: [AgentId; 8] = [
        Self::Strategist,
        Self::Scout,
        Self::Diligence,
        Self::CompsAnalyst,
        Self::Structurer,
        Self::FieldVerifier,
        Self::Creative,
        Self::Partner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strategist => "strategist",
            Self::Scout => "scout",
            Self::Diligence => "diligence",
            Self::CompsAnalyst => "comps_analyst",
            Self::Structurer => "structurer",
            Self::FieldVerifier => "field_verifier",
            Self::Creative => "creative",
            Self::Partner => "partner",
        }
    }

    /// Role title shown in the roster view.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Strategist => "Strategy Partner",
            Self::Scout => "Sourcing Analyst",
            Self::Diligence => "Diligence VP",
            Self::CompsAnalyst => "Comps Analyst",
            Self::Structurer => "Deal Structurer",
            Self::FieldVerifier => "Field Verifier",
            Self::Creative => "Creative Studio",
            Self::Partner => "Managing Partner",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visible status of an agent between and during runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Error,
}

/// One roster entry: identity plus its visible status and current task line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub id: AgentId,
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

impl AgentState {
    pub fn idle(id: AgentId) -> Self {
        Self {
            id,
            status: AgentStatus::Idle,
            task: None,
        }
    }
}

/// Fresh roster with everyone idle.
pub fn default_roster() -> Vec<AgentState> {
    AgentId::ALL.iter().copied().map(AgentState::idle).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_covers_every_agent_once() {
        let roster = default_roster();
        assert_eq!(roster.len(), AgentId::ALL.len());
        for (state, id) in roster.iter().zip(AgentId::ALL) {
            assert_eq!(state.id, id);
            assert_eq!(state.status, AgentStatus::Idle);
            assert!(state.task.is_none());
        }
    }

    #[test]
    fn agent_ids_serialize_snake_case() {
        let json = serde_json::to_string(&AgentId::CompsAnalyst).unwrap();
        assert_eq!(json, "\"comps_analyst\"");
        assert_eq!(AgentId::CompsAnalyst.as_str(), "comps_analyst");
    }
}
