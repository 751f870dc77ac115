//! End-to-end pipeline runs over the scripted model client.

use std::sync::Arc;

use dealdesk::agents::{AgentId, AgentStatus};
use dealdesk::attach::FileAttachment;
use dealdesk::error::{Error, ModelError, PipelineError};
use dealdesk::model::{GroundingRef, ModelResponse, ScriptedModelClient};
use dealdesk::pipeline::{DealPipeline, ModelRoster, StepStatus};
use dealdesk::state::{MessageRole, StateStore};
use dealdesk::store::MemoryBlobStore;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

async fn pipeline_with(client: ScriptedModelClient) -> (Arc<StateStore>, Arc<ScriptedModelClient>, DealPipeline) {
    let state = Arc::new(StateStore::hydrate(Arc::new(MemoryBlobStore::new())).await);
    let client = Arc::new(client);
    let pipeline = DealPipeline::new(
        Arc::clone(&state),
        Arc::clone(&client) as Arc<dyn dealdesk::model::ModelClient>,
        ModelRoster::default(),
    );
    (state, client, pipeline)
}

/// Queue the happy-path responses for a full sourcing run, with the image
/// step exercising the permission-fallback path.
async fn script_full_sourcing(client: &ScriptedModelClient) {
    // 1. strategy
    client
        .push_text("Target founder-led fastener makers with sticky OEM contracts.")
        .await;
    // 2. candidate search, fenced with a preamble
    client
        .push_text(
            "Sure, here are the results:\n```json\n[\"Acme Fasteners\",\"Globex Industrial\",\"Initech Tooling\"]\n```",
        )
        .await;
    // 3. selection
    client
        .push_text(r#"{"selected": "Acme Fasteners", "rationale": "best margin profile"}"#)
        .await;
    // 4. deep dive, with grounding
    client
        .push_response(ModelResponse {
            text: "Acme Fasteners is a third-generation manufacturer...".to_string(),
            grounding: vec![GroundingRef {
                title: "Acme overview".to_string(),
                url: "https://example.com/acme".to_string(),
            }],
        })
        .await;
    // 5. structuring: truncated mid-object, repaired by the sanitizer
    client
        .push_text(
            r#"{"companyName":"Acme Fasteners","sector":"Industrials","ebitda":18,"revenue":95,"askingMultiple":8,"memo":{"executiveSummary":"A durable niche.","investmentRecommendation":"GO"},"lboModel":{"irr":24,"#,
        )
        .await;
    // 6. location verification
    client
        .push_response(ModelResponse {
            text: r#"{"location": "Pittsburgh, Pennsylvania", "confidence": "high"}"#.to_string(),
            grounding: vec![GroundingRef {
                title: "HQ listing".to_string(),
                url: "https://maps.example.com/acme".to_string(),
            }],
        })
        .await;
    // 7. primary image model rejects on permissions
    client
        .push_error(ModelError::PermissionDenied {
            model: "concept-image-hd".to_string(),
            reason: "caller lacks image access".to_string(),
        })
        .await;
    // 8. fallback image model succeeds
    client.push_text("data:image/png;base64,AAAA").await;
    // 9. final opinion
    client
        .push_text("I back the GO recommendation with reservations on customer concentration.")
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn sourcing_run_commits_a_normalized_deal() {
    let client = ScriptedModelClient::new();
    script_full_sourcing(&client).await;
    let (state, client, pipeline) = pipeline_with(client).await;

    let deal_id = pipeline
        .run_sourcing("Find me a fastener business")
        .await
        .unwrap();

    let deal = state.active_deal().await.unwrap();
    assert_eq!(deal.id, deal_id);
    assert_eq!(deal.company_name, "Acme Fasteners");
    assert_eq!(deal.ebitda, 18.0);
    // Truncated lboModel repaired and defaulted.
    assert_eq!(deal.lbo_model.irr, 24.0);
    assert_eq!(deal.lbo_model.moic, 0.0);
    // Candidate list threaded into the record.
    assert_eq!(
        deal.candidates_analyzed,
        vec!["Acme Fasteners", "Globex Industrial", "Initech Tooling"]
    );
    // Location verification overwrote the record's location.
    assert_eq!(deal.location, "Pittsburgh, Pennsylvania");
    // Grounding urls merged from deep dive and verification.
    assert!(deal.grounding_urls.contains(&"https://example.com/acme".to_string()));
    assert!(deal.grounding_urls.contains(&"https://maps.example.com/acme".to_string()));
    // Fallback image landed.
    assert_eq!(deal.concept_image.as_deref(), Some("data:image/png;base64,AAAA"));

    // Every step completed under one trace id, agents all idle.
    let steps = state.steps().await;
    assert_eq!(steps.len(), 9);
    let trace_id = steps[0].trace_id;
    assert!(steps.iter().all(|s| s.trace_id == trace_id));
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(state.steps_for_trace(trace_id).await.len(), 9);
    for agent in state.agents().await {
        assert_eq!(agent.status, AgentStatus::Idle);
    }

    // Image fallback went out with the reduced config against the fallback id.
    let calls = client.calls().await;
    assert_eq!(calls.len(), 9);
    let primary = &calls[6];
    assert_eq!(primary.model_id, "concept-image-hd");
    assert_eq!(
        primary.config.image_config.as_ref().unwrap().size_hint.as_deref(),
        Some("2k")
    );
    let fallback = &calls[7];
    assert_eq!(fallback.model_id, "concept-image-base");
    assert!(fallback.config.image_config.as_ref().unwrap().size_hint.is_none());

    // The partner's opinion reached the conversation.
    let messages = state.messages().await;
    assert!(messages.iter().any(|m| {
        m.agent == Some(AgentId::Partner) && m.content.contains("GO recommendation")
    }));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_candidate_list_aborts_before_structuring() {
    let client = ScriptedModelClient::new();
    client.push_text("A thesis.").await;
    client.push_text("[]").await;
    let (state, client, pipeline) = pipeline_with(client).await;

    let err = pipeline.run_sourcing("anything").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Pipeline(PipelineError::NoCandidates { .. })
    ));

    // Only strategy and search were invoked; nothing was committed.
    assert_eq!(client.calls().await.len(), 2);
    assert!(state.active_deal().await.is_none());

    // All agents forced to error, one error record in the log, one
    // system-authored failure message pointing at the step log.
    for agent in state.agents().await {
        assert_eq!(agent.status, AgentStatus::Error);
    }
    let steps = state.steps().await;
    assert_eq!(
        steps
            .iter()
            .filter(|s| s.status == StepStatus::Error)
            .count(),
        1
    );
    let messages = state.messages().await;
    let failure = messages
        .iter()
        .find(|m| m.role == MessageRole::System)
        .unwrap();
    assert!(failure.content.contains("step log"));
    assert!(failure.content.contains(&steps[0].trace_id.to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn location_failure_aborts_but_keeps_committed_progress() {
    let client = ScriptedModelClient::new();
    client.push_text("Thesis.").await;
    client.push_text(r#"["Acme Fasteners"]"#).await;
    client.push_text(r#"{"selected": "Acme Fasteners"}"#).await;
    client.push_text("Dossier.").await;
    client
        .push_text(r#"{"companyName":"Acme Fasteners","ebitda":18}"#)
        .await;
    client
        .push_error(ModelError::RequestFailed {
            model: "analyst-xl".to_string(),
            reason: "maps grounding unavailable".to_string(),
        })
        .await;
    let (state, _client, pipeline) = pipeline_with(client).await;

    let err = pipeline.run_sourcing("anything").await.unwrap_err();
    assert!(err.to_string().contains("maps grounding unavailable"));

    // Structuring already committed; the abort does not roll it back.
    let deal = state.active_deal().await.unwrap();
    assert_eq!(deal.company_name, "Acme Fasteners");
    assert!(deal.concept_image.is_none());

    let steps = state.steps().await;
    let failed = steps.iter().find(|s| s.status == StepStatus::Error).unwrap();
    assert_eq!(failed.agent, AgentId::FieldVerifier);
    assert!(failed.error.as_ref().unwrap().message.contains("maps grounding"));
}

#[tokio::test(flavor = "multi_thread")]
async fn image_failure_is_isolated_and_run_succeeds() {
    let client = ScriptedModelClient::new();
    client.push_text("Thesis.").await;
    client.push_text(r#"["Acme Fasteners"]"#).await;
    client.push_text(r#"{"selected": "Acme Fasteners"}"#).await;
    client.push_text("Dossier.").await;
    client
        .push_text(r#"{"companyName":"Acme Fasteners","ebitda":18}"#)
        .await;
    client
        .push_text(r#"{"location": "Pittsburgh, Pennsylvania"}"#)
        .await;
    // Primary image model fails with a non-permission error: no fallback try.
    client
        .push_error(ModelError::RequestFailed {
            model: "concept-image-hd".to_string(),
            reason: "connection reset".to_string(),
        })
        .await;
    client.push_text("Opinion.").await;
    let (state, client, pipeline) = pipeline_with(client).await;

    pipeline.run_sourcing("anything").await.unwrap();

    let deal = state.active_deal().await.unwrap();
    assert!(deal.concept_image.is_none());
    // 8 calls: the fallback image model was never tried.
    assert_eq!(client.calls().await.len(), 8);
    // The image step itself logs as completed; the failure stayed inside it.
    let steps = state.steps().await;
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
}

#[tokio::test(flavor = "multi_thread")]
async fn document_analysis_structures_from_attachment() {
    let client = ScriptedModelClient::new();
    // 1. extraction
    client
        .push_text(r#"{"companyName": "Vought Mills", "revenue": 40, "ebitda": 9}"#)
        .await;
    // 2. structuring
    client
        .push_text(
            r#"{"companyName":"Vought Mills","sector":"Textiles","ebitda":9,"revenue":40,"memo":{"investmentRecommendation":"HOLD"}}"#,
        )
        .await;
    // 3. opinion
    client.push_text("Hold until the customer audit lands.").await;
    let (state, client, pipeline) = pipeline_with(client).await;

    let payload = STANDARD.encode(b"confidential information memorandum");
    let attachment = FileAttachment::new(
        "vought_cim.pdf",
        "application/pdf",
        format!("data:application/pdf;base64,{payload}"),
    );
    pipeline.run_document_analysis(attachment).await.unwrap();

    let deal = state.active_deal().await.unwrap();
    assert_eq!(deal.company_name, "Vought Mills");
    assert_eq!(deal.ebitda, 9.0);
    assert!(deal.candidates_analyzed.is_empty());

    let calls = client.calls().await;
    assert_eq!(calls.len(), 3);
    // The attachment crossed the boundary as inline data, prefix stripped.
    assert!(calls[0].prompt.contains("[inline application/pdf]"));

    let steps = state.steps().await;
    assert_eq!(steps.len(), 3);
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
}
