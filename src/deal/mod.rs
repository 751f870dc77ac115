//! Canonical deal record shapes.
//!
//! A [`DealRecord`] is the normalized representation of one target company's
//! sourcing, financial, and memo data. Everything the renderer touches is
//! guaranteed present and typed; the normalizer in [`normalize`] enforces
//! that regardless of what the model returned. Field names serialize in
//! camelCase to match the persisted client-side contract.

pub mod normalize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use normalize::normalize_deal;

/// Default company/sector placeholder.
pub const UNKNOWN: &str = "Unknown";
/// Default location placeholder.
pub const NOT_AVAILABLE: &str = "N/A";

/// Normalized record for one target company.
///
/// Created once per deal on the first successful structuring call and mutated
/// in place afterwards (fields merged, arrays appended) until discarded. Owned
/// exclusively by the state store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DealRecord {
    pub id: Uuid,
    pub company_name: String,
    pub sector: String,
    pub location: String,
    pub ebitda: f64,
    pub revenue: f64,
    pub asking_multiple: f64,
    pub implied_value: f64,
    pub financial_models: FinancialModels,
    pub lbo_model: LboModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lbo_detailed: Option<LboDetailed>,
    pub memo: InvestmentMemo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_analysis: Option<Vec<SensitivityRow>>,
    #[serde(default)]
    pub comparables: Vec<Value>,
    #[serde(default)]
    pub candidates_analyzed: Vec<String>,
    #[serde(default)]
    pub grounding_urls: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Default for DealRecord {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            company_name: UNKNOWN.to_string(),
            sector: UNKNOWN.to_string(),
            location: NOT_AVAILABLE.to_string(),
            ebitda: 0.0,
            revenue: 0.0,
            asking_multiple: 0.0,
            implied_value: 0.0,
            financial_models: FinancialModels::default(),
            lbo_model: LboModel::default(),
            lbo_detailed: None,
            memo: InvestmentMemo::default(),
            sensitivity_analysis: None,
            comparables: Vec::new(),
            candidates_analyzed: Vec::new(),
            grounding_urls: Vec::new(),
            deliverables: Vec::new(),
            concept_image: None,
            created_at: Utc::now(),
        }
    }
}

/// Three-statement model as returned by the structuring step.
///
/// `years` carries the period labels; every row's values align positionally
/// with it. The empty-but-shaped skeleton keeps renderers off the nil path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialModels {
    pub years: Vec<String>,
    pub income_statement: Vec<StatementRow>,
    pub balance_sheet: Vec<StatementRow>,
    pub cash_flow: Vec<StatementRow>,
}

/// One labeled row of a financial statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatementRow {
    pub label: String,
    pub values: Vec<f64>,
}

/// Headline LBO summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LboModel {
    pub entry_multiple: f64,
    pub exit_multiple: f64,
    pub irr: f64,
    pub moic: f64,
    pub debt_to_equity: f64,
}

/// Expanded LBO detail, present only when the model supplied one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LboDetailed {
    pub assumptions: Vec<LabeledNote>,
    pub sources_and_uses: Vec<AmountLine>,
    pub debt_schedule: Vec<StatementRow>,
    pub projected_returns: Vec<StatementRow>,
}

/// Label/text pair (LBO assumptions).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabeledNote {
    pub label: String,
    pub value: String,
}

/// Label/amount pair (sources & uses).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmountLine {
    pub label: String,
    pub value: f64,
}

/// Investment committee memo. Every field has a non-null default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InvestmentMemo {
    pub executive_summary: String,
    pub investment_recommendation: Recommendation,
    pub recommendation_rationale: String,
    pub key_merits: Vec<String>,
    pub investment_thesis: Vec<String>,
    pub key_risks: Vec<String>,
    pub risk_mitigation: String,
    pub market_overview: String,
    pub competitive_landscape: String,
    pub customer_analysis: String,
    pub operational_assessment: String,
}

/// Committee recommendation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recommendation {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "NO-GO")]
    NoGo,
    #[default]
    #[serde(rename = "HOLD")]
    Hold,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "GO",
            Self::NoGo => "NO-GO",
            Self::Hold => "HOLD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GO" => Some(Self::Go),
            "NO-GO" => Some(Self::NoGo),
            "HOLD" => Some(Self::Hold),
            _ => None,
        }
    }
}

/// One row of the IRR sensitivity grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SensitivityRow {
    pub entry_multiple: f64,
    pub exits: Vec<SensitivityCell>,
}

/// Exit-multiple/IRR pair within a sensitivity row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SensitivityCell {
    pub exit_multiple: f64,
    pub irr: f64,
}

/// Generated presentation artifact attached to a deal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Deliverable {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: DeliverableStatus,
    pub slides: Vec<Slide>,
}

/// Lifecycle of a deliverable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliverableStatus {
    #[default]
    Drafting,
    Rendering,
    Completed,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drafting => "drafting",
            Self::Rendering => "rendering",
            Self::Completed => "completed",
        }
    }
}

/// One slide of a deliverable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Slide {
    pub title: String,
    pub bullets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_is_fully_shaped() {
        let deal = DealRecord::default();
        assert_eq!(deal.company_name, UNKNOWN);
        assert_eq!(deal.location, NOT_AVAILABLE);
        assert_eq!(deal.ebitda, 0.0);
        assert_eq!(deal.memo.investment_recommendation, Recommendation::Hold);
        assert!(deal.financial_models.income_statement.is_empty());
        assert!(deal.lbo_detailed.is_none());
    }

    #[test]
    fn recommendation_round_trips_wire_labels() {
        for (variant, label) in [
            (Recommendation::Go, "GO"),
            (Recommendation::NoGo, "NO-GO"),
            (Recommendation::Hold, "HOLD"),
        ] {
            assert_eq!(variant.as_str(), label);
            assert_eq!(Recommendation::parse(label), Some(variant));
        }
        assert_eq!(Recommendation::parse("MAYBE"), None);
    }

    #[test]
    fn record_serializes_camel_case() {
        let deal = DealRecord::default();
        let value = serde_json::to_value(&deal).unwrap();
        assert!(value.get("companyName").is_some());
        assert!(value.get("financialModels").is_some());
        assert!(value.get("lboModel").is_some());
        // Optional sections are omitted entirely when absent.
        assert!(value.get("lboDetailed").is_none());
        assert!(value.get("sensitivityAnalysis").is_none());
    }
}
