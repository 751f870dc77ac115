//! Pipeline step execution and the step log.
//!
//! Every external-model call runs inside [`run_step`], which gives it a
//! uniform status/log/error contract: the owning agent's visible status is
//! driven to a terminal state, exactly one [`StepRecord`] lands in the log,
//! and failures are observed but never swallowed.

pub mod documents;
pub mod prompts;
pub mod sourcing;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agents::{AgentId, AgentStatus};
use crate::error::{Result, StepErrorDetail};
use crate::model::ModelClient;
use crate::state::StateStore;

/// Model identifiers and the reasoning budget the flows run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoster {
    /// Text/reasoning model used by every analytical step.
    pub analyst: String,
    /// Primary image model (accepts `size_hint`).
    pub image: String,
    /// Fallback image model (rejects `size_hint`; invoked with reduced config).
    pub image_fallback: String,
    pub reasoning_budget: u32,
}

impl Default for ModelRoster {
    fn default() -> Self {
        Self {
            analyst: "analyst-xl".to_string(),
            image: "concept-image-hd".to_string(),
            image_fallback: "concept-image-base".to_string(),
            reasoning_budget: 8192,
        }
    }
}

/// The orchestration entry point: owns the state container, the model seam,
/// and the model roster, and exposes one method per user intent.
pub struct DealPipeline {
    pub(crate) state: Arc<StateStore>,
    pub(crate) model: Arc<dyn ModelClient>,
    pub(crate) roster: ModelRoster,
}

impl DealPipeline {
    pub fn new(state: Arc<StateStore>, model: Arc<dyn ModelClient>, roster: ModelRoster) -> Self {
        Self {
            state,
            model,
            roster,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }
}

/// Outcome of one pipeline step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Working,
    Completed,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// One entry of the ordered step log.
///
/// Built when a step starts (status `working` lives only in the agent's
/// visible status), finalized and appended when the step ends. Immutable
/// afterwards. All entries of one user-triggered run share a trace id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    pub id: Uuid,
    pub trace_id: Uuid,
    pub agent: AgentId,
    pub description: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepErrorDetail>,
}

/// Execute one asynchronous unit of work under an agent identity.
///
/// Invokes `work` exactly once; retries are the caller's business. On success
/// the result is returned unchanged; on failure the original error is
/// re-raised after being logged. Either way the agent's visible status ends
/// terminal (idle or error) and exactly one record is appended.
pub async fn run_step<T, F>(
    state: &StateStore,
    trace_id: Uuid,
    agent: AgentId,
    description: impl Into<String>,
    work: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let description = description.into();
    let started_at = Utc::now();
    let clock = Instant::now();

    state
        .set_agent(agent, AgentStatus::Working, Some(description.clone()))
        .await;
    tracing::info!(%trace_id, agent = %agent, step = %description, "step started");

    match work.await {
        Ok(value) => {
            let latency_ms = clock.elapsed().as_millis() as u64;
            state
                .append_step(StepRecord {
                    id: Uuid::new_v4(),
                    trace_id,
                    agent,
                    description: description.clone(),
                    status: StepStatus::Completed,
                    started_at,
                    latency_ms,
                    error: None,
                })
                .await;
            state.set_agent(agent, AgentStatus::Idle, None).await;
            tracing::info!(%trace_id, agent = %agent, latency_ms, "step completed");
            Ok(value)
        }
        Err(err) => {
            let latency_ms = clock.elapsed().as_millis() as u64;
            state
                .append_step(StepRecord {
                    id: Uuid::new_v4(),
                    trace_id,
                    agent,
                    description: description.clone(),
                    status: StepStatus::Error,
                    started_at,
                    latency_ms,
                    error: Some(StepErrorDetail::from_error(&err, Some(description))),
                })
                .await;
            state.set_agent(agent, AgentStatus::Error, None).await;
            tracing::error!(%trace_id, agent = %agent, latency_ms, error = %err, "step failed");
            Err(err)
        }
    }
}
