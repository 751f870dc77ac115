//! The sourcing flow: mandate in, structured deal record out.
//!
//! A strict linear chain once started: strategy, candidate search, selection,
//! deep dive (with a cosmetic comps entry in flight alongside), structuring,
//! location verification, best-effort concept image, final opinion. One trace
//! id spans the run; the first raised step error aborts the remainder, marks
//! every agent errored, and surfaces a single system message. Progress
//! already committed to the deal record is kept.

use serde_json::Value;
use uuid::Uuid;

use crate::agents::AgentId;
use crate::deal::normalize_deal;
use crate::error::{Error, PipelineError, Result};
use crate::model::{GenerateConfig, ImageConfig, ModelTool, Part};
use crate::sanitize::extract_json;
use crate::state::ChatMessage;

use super::{prompts, run_step, DealPipeline};

impl DealPipeline {
    /// Run the sourcing flow for a mandate. Returns the committed deal id.
    pub async fn run_sourcing(&self, mandate: &str) -> Result<Uuid> {
        let trace_id = Uuid::new_v4();
        self.state.reset_agents().await;
        tracing::info!(%trace_id, mandate, "sourcing run started");

        match self.sourcing_chain(trace_id, mandate).await {
            Ok(deal_id) => {
                tracing::info!(%trace_id, %deal_id, "sourcing run completed");
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

    async fn sourcing_chain(&self, trace_id: Uuid, mandate: &str) -> Result<Uuid> {
        let profile = self.state.profile().await;
        let portfolio = self.state.portfolio().await;
        let reasoning = GenerateConfig::default().with_reasoning_budget(self.roster.reasoning_budget);

        let strategy = run_step(
            &self.state,
            trace_id,
            AgentId::Strategist,
            "Frame the acquisition thesis",
            async {
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::strategy_prompt(
                            mandate, &profile, &portfolio,
                        ))],
                        &reasoning,
                    )
                    .await?;
                Ok(response.text)
            },
        )
        .await?;
        self.state
            .push_message(ChatMessage::agent(AgentId::Strategist, strategy.clone()))
            .await;

        let candidates = run_step(
            &self.state,
            trace_id,
            AgentId::Scout,
            "Search the market for candidates",
            async {
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::candidate_search_prompt(&strategy))],
                        &GenerateConfig::default()
                            .with_tool(ModelTool::WebSearch)
                            .with_schema(prompts::candidate_schema()),
                    )
                    .await?;
                let parsed = extract_json(&response.text)?;
                let candidates = candidate_names(&parsed);
                if candidates.is_empty() {
                    return Err(PipelineError::NoCandidates {
                        mandate: mandate.to_string(),
                    }
                    .into());
                }
                Ok(candidates)
            },
        )
        .await?;

        let selected = run_step(
            &self.state,
            trace_id,
            AgentId::Scout,
            "Select the priority target",
            async {
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::selection_prompt(&candidates))],
                        &GenerateConfig::default(),
                    )
                    .await?;
                let parsed = extract_json(&response.text)?;
                // Shape drift never aborts a run; fall back to the top-ranked
                // candidate when the selection payload lacks a name.
                Ok(parsed
                    .get("selected")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| candidates[0].clone()))
            },
        )
        .await?;
        self.state
            .push_message(ChatMessage::agent(
                AgentId::Scout,
                format!("Priority target: {selected}"),
            ))
            .await;

        // Deep dive and the comps placeholder are the only pair allowed in
        // flight together; the comps entry has no real dependency.
        let deep_dive_fut = run_step(
            &self.state,
            trace_id,
            AgentId::Diligence,
            format!("Deep dive on {selected}"),
            async {
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::deep_dive_prompt(&selected))],
                        &GenerateConfig::default().with_tool(ModelTool::WebSearch),
                    )
                    .await?;
                let urls = response
                    .grounding
                    .iter()
                    .map(|g| g.url.clone())
                    .filter(|u| !u.is_empty())
                    .collect::<Vec<_>>();
                Ok((response.text, urls))
            },
        );
        let comps_fut = run_step(
            &self.state,
            trace_id,
            AgentId::CompsAnalyst,
            "Assemble trading comps",
            async { Ok::<_, Error>(prompts::comps_note(&selected)) },
        );
        let (deep_dive_res, comps_res) = tokio::join!(deep_dive_fut, comps_fut);
        let (dossier, dossier_urls) = deep_dive_res?;
        self.state
            .push_message(ChatMessage::agent(AgentId::CompsAnalyst, comps_res?))
            .await;

        let mut deal = run_step(
            &self.state,
            trace_id,
            AgentId::Structurer,
            format!("Structure the {selected} deal"),
            async {
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::structuring_prompt(
                            &dossier, &candidates, &portfolio,
                        ))],
                        &reasoning.clone().with_schema(prompts::deal_record_schema()),
                    )
                    .await?;
                let parsed = extract_json(&response.text)?;
                Ok(normalize_deal(&parsed, &selected))
            },
        )
        .await?;

        if deal.candidates_analyzed.is_empty() {
            deal.candidates_analyzed = candidates.clone();
        }
        merge_urls(&mut deal.grounding_urls, dossier_urls);
        let deal_id = deal.id;
        let company = deal.company_name.clone();
        let stated_location = deal.location.clone();
        self.state.commit_deal(deal).await;
        self.state
            .push_message(ChatMessage::agent(
                AgentId::Structurer,
                format!("Structured model committed for {company}."),
            ))
            .await;

        // Best-effort in intent, but a failure here is a raised step error
        // like any other; only the image step below is isolated.
        let (verified_location, location_urls) = run_step(
            &self.state,
            trace_id,
            AgentId::FieldVerifier,
            format!("Verify headquarters of {company}"),
            async {
                let response = self
                    .model
                    .generate(
                        &self.roster.analyst,
                        &[Part::text(prompts::location_prompt(
                            &company,
                            &stated_location,
                        ))],
                        &GenerateConfig::default().with_tool(ModelTool::MapsGrounding),
                    )
                    .await?;
                let parsed = extract_json(&response.text)?;
                let location = parsed
                    .get("location")
                    .and_then(Value::as_str)
                    .map(String::from);
                let urls = response
                    .grounding
                    .iter()
                    .map(|g| g.url.clone())
                    .filter(|u| !u.is_empty())
                    .collect::<Vec<_>>();
                Ok((location, urls))
            },
        )
        .await?;
        self.state
            .modify_active_deal(|deal| {
                if let Some(location) = verified_location {
                    deal.location = location;
                }
                merge_urls(&mut deal.grounding_urls, location_urls);
            })
            .await;

        let image = run_step(
            &self.state,
            trace_id,
            AgentId::Creative,
            "Render concept image",
            async { Ok::<_, Error>(self.concept_image().await) },
        )
        .await?;
        if let Some(image) = image {
            self.state
                .modify_active_deal(|deal| deal.concept_image = Some(image))
                .await;
        }

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

    /// Isolated concept-image generation: never raises.
    ///
    /// The primary model takes a size hint; on a permission/quota-class
    /// failure the fallback model is tried once with the hint omitted
    /// (it rejects the property). Anything else, or a second failure,
    /// resolves to `None` and the deal simply ships without an image.
    pub(crate) async fn concept_image(&self) -> Option<String> {
        let deal = self.state.active_deal().await?;
        let prompt = [Part::text(prompts::image_prompt(&deal))];

        let primary = GenerateConfig::default().with_image(ImageConfig {
            aspect_ratio: "16:9".to_string(),
            size_hint: Some("2k".to_string()),
        });
        match self.model.generate(&self.roster.image, &prompt, &primary).await {
            Ok(response) => return Some(response.text),
            Err(err) if err.is_permission_or_quota() => {
                tracing::warn!(error = %err, "primary image model unavailable, trying fallback");
            }
            Err(err) => {
                tracing::warn!(error = %err, "concept image skipped");
                return None;
            }
        }

        let reduced = GenerateConfig::default().with_image(ImageConfig {
            aspect_ratio: "16:9".to_string(),
            size_hint: None,
        });
        match self
            .model
            .generate(&self.roster.image_fallback, &prompt, &reduced)
            .await
        {
            Ok(response) => Some(response.text),
            Err(err) => {
                tracing::warn!(error = %err, "fallback image model failed, shipping without image");
                None
            }
        }
    }
}

/// Accept candidate payloads as strings or objects with a `name` field.
fn candidate_names(parsed: &Value) -> Vec<String> {
    parsed
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.as_str()
                        .map(String::from)
                        .or_else(|| item.get("name").and_then(Value::as_str).map(String::from))
                })
                .filter(|name| !name.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn merge_urls(existing: &mut Vec<String>, new: Vec<String>) {
    for url in new {
        if !existing.contains(&url) {
            existing.push(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_names_accept_strings_and_objects() {
        let parsed = json!(["Acme", {"name": "Globex"}, {"ticker": "INI"}, ""]);
        assert_eq!(candidate_names(&parsed), vec!["Acme", "Globex"]);
        assert!(candidate_names(&json!({"not": "array"})).is_empty());
    }

    #[test]
    fn merge_urls_dedupes_preserving_order() {
        let mut urls = vec!["a".to_string()];
        merge_urls(&mut urls, vec!["b".to_string(), "a".to_string(), "b".to_string()]);
        assert_eq!(urls, vec!["a", "b"]);
    }
}
