//! Process-wide state slices and their persistence lifecycle.
//!
//! Slices (agent roster, deal book, message log, step log, portfolio, firm
//! profile, view selector) hydrate once at startup from the blob store and
//! write back after every mutation. Hydration never prevents startup: a
//! missing or corrupt blob falls back to the slice default. Write-back is
//! best-effort; the in-memory state stays authoritative for the session, so
//! store failures are logged and swallowed. `reset` is the one operation that
//! clears durable keys and rebuilds defaults.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agents::{default_roster, AgentId, AgentState, AgentStatus};
use crate::deal::DealRecord;
use crate::error::StoreError;
use crate::pipeline::StepRecord;
use crate::store::BlobStore;

const KEY_AGENTS: &str = "dealdesk.agents";
const KEY_DEALS: &str = "dealdesk.deals";
const KEY_MESSAGES: &str = "dealdesk.messages";
const KEY_STEPS: &str = "dealdesk.steps";
const KEY_PORTFOLIO: &str = "dealdesk.portfolio";
const KEY_PROFILE: &str = "dealdesk.profile";
const KEY_VIEW: &str = "dealdesk.view";

/// Pre-multi-deal sessions stored a single deal record under this key.
const LEGACY_KEY_ACTIVE_DEAL: &str = "dealdesk.active_deal";

/// The deal collection plus which deal the session is focused on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DealBook {
    #[serde(default)]
    pub deals: Vec<DealRecord>,
    #[serde(default)]
    pub active: Option<Uuid>,
}

impl DealBook {
    pub fn active_deal(&self) -> Option<&DealRecord> {
        let id = self.active?;
        self.deals.iter().find(|deal| deal.id == id)
    }
}

/// Author of a conversation entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
    Agent,
}

/// One conversation entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChatMessage {
    fn new(role: MessageRole, agent: Option<AgentId>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            agent,
            content: content.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, None, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, None, content)
    }

    pub fn agent(agent: AgentId, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Agent, Some(agent), content)
    }
}

/// One current holding, fed into structuring prompts as portfolio context.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioCompany {
    pub name: String,
    pub sector: String,
    #[serde(default)]
    pub ebitda: f64,
    #[serde(default)]
    pub thesis: String,
}

/// The firm identity rendered in the workspace and woven into prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirmProfile {
    pub firm_name: String,
    pub strategy: String,
    pub check_size: String,
    pub sectors: Vec<String>,
}

impl Default for FirmProfile {
    fn default() -> Self {
        Self {
            firm_name: "Dealdesk Capital".to_string(),
            strategy: "Control buyouts of founder-led industrial and services businesses"
                .to_string(),
            check_size: "$25-100M equity".to_string(),
            sectors: vec![
                "Industrials".to_string(),
                "Business Services".to_string(),
                "Specialty Chemicals".to_string(),
            ],
        }
    }
}

/// Which workspace panel the session is focused on.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceView {
    #[default]
    Chat,
    Deals,
    Memo,
    Log,
    Portfolio,
}

#[derive(Debug, Clone)]
struct AppState {
    agents: Vec<AgentState>,
    deals: DealBook,
    messages: Vec<ChatMessage>,
    steps: Vec<StepRecord>,
    portfolio: Vec<PortfolioCompany>,
    profile: FirmProfile,
    view: WorkspaceView,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            agents: default_roster(),
            deals: DealBook::default(),
            messages: Vec::new(),
            steps: Vec::new(),
            portfolio: Vec::new(),
            profile: FirmProfile::default(),
            view: WorkspaceView::default(),
        }
    }
}

/// Container for all state slices, injected wherever state is needed.
pub struct StateStore {
    blobs: Arc<dyn BlobStore>,
    inner: RwLock<AppState>,
}

impl StateStore {
    /// Hydrate every slice from the blob store, defaulting what is missing or
    /// corrupt, and performing the one-time legacy single-deal migration.
    pub async fn hydrate(blobs: Arc<dyn BlobStore>) -> Self {
        let mut state = AppState::default();

        if let Some(mut agents) = load_slice::<Vec<AgentState>>(blobs.as_ref(), KEY_AGENTS).await {
            // A persisted `working` status can only be a crash artifact; a
            // run never spans process restarts.
            for agent in &mut agents {
                if agent.status == AgentStatus::Working {
                    agent.status = AgentStatus::Idle;
                    agent.task = None;
                }
            }
            state.agents = agents;
        }

        match load_slice::<DealBook>(blobs.as_ref(), KEY_DEALS).await {
            Some(book) => state.deals = book,
            None => {
                if let Some(deal) =
                    load_slice::<DealRecord>(blobs.as_ref(), LEGACY_KEY_ACTIVE_DEAL).await
                {
                    tracing::info!(deal = %deal.company_name, "migrating legacy single-deal blob");
                    let book = DealBook {
                        active: Some(deal.id),
                        deals: vec![deal],
                    };
                    write_slice(blobs.as_ref(), KEY_DEALS, &book).await;
                    state.deals = book;
                }
            }
        }

        if let Some(messages) = load_slice(blobs.as_ref(), KEY_MESSAGES).await {
            state.messages = messages;
        }
        if let Some(steps) = load_slice(blobs.as_ref(), KEY_STEPS).await {
            state.steps = steps;
        }
        if let Some(portfolio) = load_slice(blobs.as_ref(), KEY_PORTFOLIO).await {
            state.portfolio = portfolio;
        }
        if let Some(profile) = load_slice(blobs.as_ref(), KEY_PROFILE).await {
            state.profile = profile;
        }
        if let Some(view) = load_slice(blobs.as_ref(), KEY_VIEW).await {
            state.view = view;
        }

        Self {
            blobs,
            inner: RwLock::new(state),
        }
    }

    // ---- agents ----

    pub async fn agents(&self) -> Vec<AgentState> {
        self.inner.read().await.agents.clone()
    }

    pub async fn agent(&self, id: AgentId) -> Option<AgentState> {
        self.inner
            .read()
            .await
            .agents
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub async fn set_agent(&self, id: AgentId, status: AgentStatus, task: Option<String>) {
        let snapshot = {
            let mut state = self.inner.write().await;
            if let Some(agent) = state.agents.iter_mut().find(|a| a.id == id) {
                agent.status = status;
                agent.task = task;
            }
            state.agents.clone()
        };
        write_slice(self.blobs.as_ref(), KEY_AGENTS, &snapshot).await;
    }

    /// Force every agent to the error status (pipeline abort path).
    pub async fn mark_all_agents_error(&self) {
        let snapshot = {
            let mut state = self.inner.write().await;
            for agent in &mut state.agents {
                agent.status = AgentStatus::Error;
                agent.task = None;
            }
            state.agents.clone()
        };
        write_slice(self.blobs.as_ref(), KEY_AGENTS, &snapshot).await;
    }

    /// Return every agent to idle (start of a new run).
    pub async fn reset_agents(&self) {
        let snapshot = {
            let mut state = self.inner.write().await;
            for agent in &mut state.agents {
                agent.status = AgentStatus::Idle;
                agent.task = None;
            }
            state.agents.clone()
        };
        write_slice(self.blobs.as_ref(), KEY_AGENTS, &snapshot).await;
    }

    // ---- conversation ----

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.inner.read().await.messages.clone()
    }

    pub async fn push_message(&self, message: ChatMessage) {
        let snapshot = {
            let mut state = self.inner.write().await;
            state.messages.push(message);
            state.messages.clone()
        };
        write_slice(self.blobs.as_ref(), KEY_MESSAGES, &snapshot).await;
    }

    // ---- step log ----

    pub async fn steps(&self) -> Vec<StepRecord> {
        self.inner.read().await.steps.clone()
    }

    pub async fn steps_for_trace(&self, trace_id: Uuid) -> Vec<StepRecord> {
        self.inner
            .read()
            .await
            .steps
            .iter()
            .filter(|s| s.trace_id == trace_id)
            .cloned()
            .collect()
    }

    pub async fn append_step(&self, record: StepRecord) {
        let snapshot = {
            let mut state = self.inner.write().await;
            state.steps.push(record);
            state.steps.clone()
        };
        write_slice(self.blobs.as_ref(), KEY_STEPS, &snapshot).await;
    }

    // ---- deals ----

    pub async fn deal_book(&self) -> DealBook {
        self.inner.read().await.deals.clone()
    }

    pub async fn active_deal(&self) -> Option<DealRecord> {
        self.inner.read().await.deals.active_deal().cloned()
    }

    /// Insert or replace a deal and make it the active one.
    pub async fn commit_deal(&self, deal: DealRecord) {
        let snapshot = {
            let mut state = self.inner.write().await;
            state.deals.active = Some(deal.id);
            match state.deals.deals.iter_mut().find(|d| d.id == deal.id) {
                Some(existing) => *existing = deal,
                None => state.deals.deals.push(deal),
            }
            state.deals.clone()
        };
        write_slice(self.blobs.as_ref(), KEY_DEALS, &snapshot).await;
    }

    /// Mutate the active deal in place. Returns false when no deal is active.
    pub async fn modify_active_deal(&self, apply: impl FnOnce(&mut DealRecord)) -> bool {
        let snapshot = {
            let mut state = self.inner.write().await;
            let Some(id) = state.deals.active else {
                return false;
            };
            let Some(deal) = state.deals.deals.iter_mut().find(|d| d.id == id) else {
                return false;
            };
            apply(deal);
            state.deals.clone()
        };
        write_slice(self.blobs.as_ref(), KEY_DEALS, &snapshot).await;
        true
    }

    // ---- portfolio / profile / view ----

    pub async fn portfolio(&self) -> Vec<PortfolioCompany> {
        self.inner.read().await.portfolio.clone()
    }

    pub async fn set_portfolio(&self, portfolio: Vec<PortfolioCompany>) {
        {
            let mut state = self.inner.write().await;
            state.portfolio = portfolio.clone();
        }
        write_slice(self.blobs.as_ref(), KEY_PORTFOLIO, &portfolio).await;
    }

    pub async fn profile(&self) -> FirmProfile {
        self.inner.read().await.profile.clone()
    }

    pub async fn set_profile(&self, profile: FirmProfile) {
        {
            let mut state = self.inner.write().await;
            state.profile = profile.clone();
        }
        write_slice(self.blobs.as_ref(), KEY_PROFILE, &profile).await;
    }

    pub async fn view(&self) -> WorkspaceView {
        self.inner.read().await.view
    }

    pub async fn set_view(&self, view: WorkspaceView) {
        {
            let mut state = self.inner.write().await;
            state.view = view;
        }
        write_slice(self.blobs.as_ref(), KEY_VIEW, &view).await;
    }

    // ---- lifecycle ----

    /// Clear all durable keys and rebuild every slice from defaults.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.blobs.clear().await?;
        *self.inner.write().await = AppState::default();
        tracing::info!("state reset to defaults");
        Ok(())
    }
}

async fn load_slice<T: DeserializeOwned>(blobs: &dyn BlobStore, key: &str) -> Option<T> {
    match blobs.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding corrupt state slice");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read state slice");
            None
        }
    }
}

/// Serialize and store one slice, swallowing failures.
async fn write_slice<T: Serialize>(blobs: &dyn BlobStore, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to serialize state slice");
            return;
        }
    };
    if let Err(e) = blobs.set(key, &raw).await {
        tracing::warn!(key, error = %e, "failed to persist state slice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use async_trait::async_trait;

    #[tokio::test]
    async fn hydrates_defaults_from_empty_store() {
        let state = StateStore::hydrate(Arc::new(MemoryBlobStore::new())).await;
        assert_eq!(state.agents().await.len(), AgentId::ALL.len());
        assert!(state.messages().await.is_empty());
        assert!(state.active_deal().await.is_none());
        assert_eq!(state.view().await, WorkspaceView::Chat);
        assert_eq!(state.profile().await.firm_name, "Dealdesk Capital");
    }

    #[tokio::test]
    async fn corrupt_slice_falls_back_to_default() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.seed(KEY_MESSAGES, "{not json").await;
        blobs.seed(KEY_VIEW, "\"deals\"").await;

        let state = StateStore::hydrate(blobs).await;
        assert!(state.messages().await.is_empty());
        assert_eq!(state.view().await, WorkspaceView::Deals);
    }

    #[tokio::test]
    async fn mutations_write_back_and_survive_rehydration() {
        let blobs = Arc::new(MemoryBlobStore::new());
        {
            let state = StateStore::hydrate(Arc::clone(&blobs) as Arc<dyn BlobStore>).await;
            state.push_message(ChatMessage::user("find me a target")).await;
            state.commit_deal(DealRecord::default()).await;
            state.set_view(WorkspaceView::Memo).await;
        }

        let state = StateStore::hydrate(blobs).await;
        let messages = state.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "find me a target");
        assert!(state.active_deal().await.is_some());
        assert_eq!(state.view().await, WorkspaceView::Memo);
    }

    #[tokio::test]
    async fn legacy_single_deal_blob_is_migrated() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let mut deal = DealRecord::default();
        deal.company_name = "Acme Fasteners".to_string();
        blobs
            .seed(
                LEGACY_KEY_ACTIVE_DEAL,
                &serde_json::to_string(&deal).unwrap(),
            )
            .await;

        let state = StateStore::hydrate(Arc::clone(&blobs) as Arc<dyn BlobStore>).await;
        let book = state.deal_book().await;
        assert_eq!(book.deals.len(), 1);
        assert_eq!(book.active, Some(deal.id));
        assert_eq!(book.active_deal().unwrap().company_name, "Acme Fasteners");

        // The new key exists as if it had always been there.
        assert!(blobs.get(KEY_DEALS).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn persisted_working_status_normalizes_to_idle() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let mut roster = default_roster();
        roster[0].status = AgentStatus::Working;
        roster[0].task = Some("mid-crash task".to_string());
        blobs
            .seed(KEY_AGENTS, &serde_json::to_string(&roster).unwrap())
            .await;

        let state = StateStore::hydrate(blobs).await;
        let agent = state.agent(roster[0].id).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert!(agent.task.is_none());
    }

    #[tokio::test]
    async fn reset_clears_durable_keys_and_memory() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let state = StateStore::hydrate(Arc::clone(&blobs) as Arc<dyn BlobStore>).await;
        state.push_message(ChatMessage::system("hello")).await;
        state.commit_deal(DealRecord::default()).await;
        assert!(!blobs.is_empty().await);

        state.reset().await.unwrap();
        assert!(blobs.is_empty().await);
        assert!(state.messages().await.is_empty());
        assert!(state.active_deal().await.is_none());
    }

    /// Store that accepts reads but fails every write.
    struct ReadOnlyStore;

    #[async_trait]
    impl BlobStore for ReadOnlyStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
        async fn set(&self, key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Write {
                key: key.to_string(),
                reason: "disk full".to_string(),
            })
        }
        async fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn write_back_failure_is_swallowed() {
        let state = StateStore::hydrate(Arc::new(ReadOnlyStore)).await;
        // Must not panic or error; memory stays authoritative.
        state.push_message(ChatMessage::user("still here")).await;
        assert_eq!(state.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn modify_active_deal_requires_one() {
        let state = StateStore::hydrate(Arc::new(MemoryBlobStore::new())).await;
        assert!(!state.modify_active_deal(|d| d.ebitda = 1.0).await);

        state.commit_deal(DealRecord::default()).await;
        assert!(state.modify_active_deal(|d| d.ebitda = 12.0).await);
        assert_eq!(state.active_deal().await.unwrap().ebitda, 12.0);
    }
}
