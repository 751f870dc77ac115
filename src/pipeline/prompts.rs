//! Prompt builders and response schemas for the pipeline steps.
//!
//! Prompts ask for JSON wherever a step's output feeds another step; the
//! sanitizer and normalizer absorb whatever comes back regardless.

use serde_json::{json, Value};

use crate::deal::DealRecord;
use crate::state::{FirmProfile, PortfolioCompany};

fn portfolio_context(portfolio: &[PortfolioCompany]) -> String {
    if portfolio.is_empty() {
        return "(no current holdings)".to_string();
    }
    portfolio
        .iter()
        .map(|company| {
            format!(
                "- {} ({}, ~${:.0}M EBITDA): {}",
                company.name, company.sector, company.ebitda, company.thesis
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn strategy_prompt(
    mandate: &str,
    profile: &FirmProfile,
    portfolio: &[PortfolioCompany],
) -> String {
    format!(
        "You are the strategy partner at {firm}, a private-equity firm.\n\
         Strategy: {strategy}\n\
         Typical check: {check}\n\
         Sector focus: {sectors}\n\n\
         Current portfolio:\n{portfolio}\n\n\
         The deal team received this mandate:\n{mandate}\n\n\
         Frame an acquisition thesis: the target profile, why now, and what \
         would make a candidate a pass. Three short paragraphs, no preamble.",
        firm = profile.firm_name,
        strategy = profile.strategy,
        check = profile.check_size,
        sectors = profile.sectors.join(", "),
        portfolio = portfolio_context(portfolio),
        mandate = mandate,
    )
}

pub fn candidate_search_prompt(strategy: &str) -> String {
    format!(
        "Using the acquisition thesis below, search for real companies that \
         fit it. Return a JSON array of 3 to 6 company names, best fit first. \
         Return only the JSON array.\n\nThesis:\n{strategy}"
    )
}

pub fn candidate_schema() -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "minItems": 1
    })
}

pub fn selection_prompt(candidates: &[String]) -> String {
    format!(
        "From these candidates, pick the single best acquisition target and \
         say why in one sentence. Respond as JSON: \
         {{\"selected\": \"<name>\", \"rationale\": \"<why>\"}}.\n\n\
         Candidates:\n{}",
        candidates
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

pub fn deep_dive_prompt(candidate: &str) -> String {
    format!(
        "Prepare a diligence dossier on {candidate}: business model, revenue \
         quality, customer base, competitive position, management, and any \
         red flags. Use web sources and cite what you find. Plain prose."
    )
}

/// Placeholder comps note appended alongside the deep dive. No model call.
pub fn comps_note(candidate: &str) -> String {
    format!(
        "Pulling trading and transaction comps for {candidate}; full comps \
         table lands with the structured model."
    )
}

pub fn structuring_prompt(
    dossier: &str,
    candidates: &[String],
    portfolio: &[PortfolioCompany],
) -> String {
    format!(
        "Turn the diligence dossier below into a structured deal record. \
         Respond with a single JSON object matching the provided schema: \
         identity and headline financials, a three-statement model with \
         aligned year labels, an LBO summary (entryMultiple, exitMultiple, \
         irr, moic, debtToEquity), an IRR sensitivity grid, an investment \
         memo with a GO / NO-GO / HOLD recommendation, and comparables. \
         All figures are illustrative estimates; state them as numbers, not \
         strings.\n\n\
         Candidates screened: {candidates}\n\n\
         Portfolio context:\n{portfolio}\n\n\
         Dossier:\n{dossier}",
        candidates = if candidates.is_empty() {
            "(direct document analysis, no screen)".to_string()
        } else {
            candidates.join(", ")
        },
        portfolio = portfolio_context(portfolio),
        dossier = dossier,
    )
}

/// Structural descriptor the structuring call targets. Top-level shape only;
/// the normalizer owns the rest.
pub fn deal_record_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "companyName": { "type": "string" },
            "sector": { "type": "string" },
            "location": { "type": "string" },
            "ebitda": { "type": "number" },
            "revenue": { "type": "number" },
            "askingMultiple": { "type": "number" },
            "impliedValue": { "type": "number" },
            "financialModels": {
                "type": "object",
                "properties": {
                    "years": { "type": "array", "items": { "type": "string" } },
                    "incomeStatement": { "type": "array" },
                    "balanceSheet": { "type": "array" },
                    "cashFlow": { "type": "array" }
                }
            },
            "lboModel": { "type": "object" },
            "lboDetailed": { "type": "object" },
            "memo": { "type": "object" },
            "sensitivityAnalysis": { "type": "array" },
            "comparables": { "type": "array" },
            "candidatesAnalyzed": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["companyName", "ebitda", "lboModel", "memo"]
    })
}

pub fn extraction_prompt(file_name: &str) -> String {
    format!(
        "Extract every financial fact from the attached document ({file_name}): \
         company identity, revenue, EBITDA, asking price or multiple, and any \
         statement line items with their periods. Respond with one JSON \
         object; use camelCase keys and numbers for figures. Do not invent \
         values that are not in the document."
    )
}

pub fn location_prompt(company: &str, stated_location: &str) -> String {
    format!(
        "Verify where {company} is actually headquartered. The deal record \
         currently says: {stated_location}. Use maps grounding. Respond as \
         JSON: {{\"location\": \"<city, region>\", \"confidence\": \
         \"high|medium|low\"}}."
    )
}

pub fn image_prompt(deal: &DealRecord) -> String {
    format!(
        "A clean concept illustration for an investment teaser: {name}, a \
         {sector} business based in {location}. Muted palette, no text.",
        name = deal.company_name,
        sector = deal.sector,
        location = deal.location,
    )
}

pub fn opinion_prompt(deal: &DealRecord) -> String {
    format!(
        "You are the managing partner reviewing this deal record before it \
         goes to the investment committee. Record: {record}\n\n\
         Give your opinion in three short paragraphs: what you like, what \
         worries you, and whether you back the {rec} recommendation.",
        record = serde_json::to_string(deal).unwrap_or_else(|_| deal.company_name.clone()),
        rec = deal.memo.investment_recommendation.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portfolio_context_handles_empty_and_filled() {
        assert_eq!(portfolio_context(&[]), "(no current holdings)");

        let holdings = vec![PortfolioCompany {
            name: "Initech".to_string(),
            sector: "Software".to_string(),
            ebitda: 14.0,
            thesis: "sticky contracts".to_string(),
        }];
        let rendered = portfolio_context(&holdings);
        assert!(rendered.contains("Initech"));
        assert!(rendered.contains("$14M"));
    }

    #[test]
    fn schemas_are_well_formed() {
        assert_eq!(candidate_schema()["type"], "array");
        let schema = deal_record_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("lboModel").is_some());
    }
}
