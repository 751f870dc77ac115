//! The document-analysis flow: uploaded materials in, deal record out.
//!
//! Shorter chain than sourcing: extraction, structuring, final opinion. No
//! candidate screen, no location or image steps. Same trace and abort
//! semantics.

use serde_json::Value;
use uuid::Uuid;

use crate::agents::AgentId;
use crate::attach::FileAttachment;
use crate::deal::normalize_deal;
use crate::error::{PipelineError, Result};
use crate::model::{GenerateConfig, Part};
use crate::sanitize::extract_json;
use crate::state::ChatMessage;

use super::{prompts, run_step, DealPipeline};

impl DealPipeline {
    /// Analyze uploaded deal materials. Returns the committed deal id.
    pub async fn run_document_analysis(&self, attachment: FileAttachment) -> Result<Uuid> {
        let trace_id = Uuid::new_v4();
        self.state.reset_agents().await;
        tracing::info!(%trace_id, file = %attachment.name, "document analysis started");

        match self.document_chain(trace_id, &attachment).await {
            Ok(deal_id) => {
                tracing::info!(%trace_id, %deal_id, "document analysis completed");
                Ok(deal_id)
            }
            Err(err) => {
                self.state.mark_all_agents_error().await;
                self.state
                    .push_message(ChatMessage::system(format!(
                        "Run failed: {err}. See the step log (trace {trace_id}) for detail."
                    )))
                    .await;
                Err(err)
            }
        }
    }

    async fn document_chain(&self, trace_id: Uuid, attachment: &FileAttachment) -> Result<Uuid> {
        let portfolio = self.state.portfolio().await;
        let reasoning = GenerateConfig::default().with_reasoning_budget(self.roster.reasoning_budget);

        let extracted = run_step(
            &self.state,
            trace_id,
            AgentId::Diligence,
            format!("Extract financials from {}", attachment.name),
            async {
                let size = attachment.validate()?;
                tracing::debug!(file = %attachment.name, size, "forwarding attachment");
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[
                            Part::text(prompts::extraction_prompt(&attachment.name)),
                            Part::inline_data(&attachment.mime_type, attachment.raw_base64()),
                        ],
                        &reasoning,
                    )
                    .await?;
                Ok(extract_json(&response.text)?)
            },
        )
        .await?;

        let fallback_name = extracted
            .get("companyName")
            .and_then(Value::as_str)
            .unwrap_or_else(|| attachment.stem())
            .to_string();

        let deal = run_step(
            &self.state,
            trace_id,
            AgentId::Structurer,
            format!("Structure the {fallback_name} deal from documents"),
            async {
                let dossier = serde_json::to_string_pretty(&extracted)
                    .unwrap_or_else(|_| extracted.to_string());
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::structuring_prompt(
                            &dossier,
                            &[],
                            &portfolio,
                        ))],
                        &reasoning.clone().with_schema(prompts::deal_record_schema()),
                    )
                    .await?;
                let parsed = extract_json(&response.text)?;
                Ok(normalize_deal(&parsed, &fallback_name))
            },
        )
        .await?;

        let deal_id = deal.id;
        let company = deal.company_name.clone();
        self.state.commit_deal(deal).await;
        self.state
            .push_message(ChatMessage::agent(
                AgentId::Structurer,
                format!("Structured model committed for {company}."),
            ))
            .await;

        let opinion = run_step(
            &self.state,
            trace_id,
            AgentId::Partner,
            "Issue final opinion",
            async {
                let deal = self
                    .state
                    .active_deal()
                    .await
                    .ok_or(PipelineError::NoActiveDeal)?;
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::opinion_prompt(&deal))],
                        &reasoning,
                    )
                    .await?;
                Ok(response.text)
            },
        )
        .await?;
        self.state
            .push_message(ChatMessage::agent(AgentId::Partner, opinion))
            .await;

        Ok(deal_id)
    }
}
