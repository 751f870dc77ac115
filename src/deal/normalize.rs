//! Total mapping from untyped model output onto a [`DealRecord`].
//!
//! Everything that crosses the model boundary is untrusted: valid JSON with
//! missing fields, wrong-typed leaves, or nothing at all. `normalize_deal`
//! absorbs every shape mismatch by structural defaulting and never raises.
//! Values the model did supply are used verbatim; there is no deep merge
//! beyond one level inside composite sections.

use serde_json::Value;

use super::{
    AmountLine, DealRecord, Deliverable, DeliverableStatus, FinancialModels, InvestmentMemo,
    LabeledNote, LboDetailed, LboModel, Recommendation, SensitivityCell, SensitivityRow, Slide,
    StatementRow, NOT_AVAILABLE, UNKNOWN,
};

/// Build a fully-populated deal record from whatever the sanitizer produced.
///
/// `fallback_name` fills `company_name` when the payload lacks one. Pure
/// function; committing the record into the state store is the caller's job.
pub fn normalize_deal(parsed: &Value, fallback_name: &str) -> DealRecord {
    let fallback = if fallback_name.trim().is_empty() {
        UNKNOWN
    } else {
        fallback_name
    };

    DealRecord {
        company_name: text_or(parsed.get("companyName"), fallback),
        sector: text_or(parsed.get("sector"), UNKNOWN),
        location: text_or(parsed.get("location"), NOT_AVAILABLE),
        ebitda: number(parsed.get("ebitda")),
        revenue: number(parsed.get("revenue")),
        asking_multiple: number(parsed.get("askingMultiple")),
        implied_value: number(parsed.get("impliedValue")),
        financial_models: financial_models(parsed.get("financialModels")),
        lbo_model: lbo_model(parsed.get("lboModel")),
        lbo_detailed: parsed.get("lboDetailed").map(lbo_detailed),
        memo: memo(parsed.get("memo")),
        sensitivity_analysis: parsed.get("sensitivityAnalysis").map(sensitivity_rows),
        comparables: value_list(parsed.get("comparables")),
        candidates_analyzed: string_list(parsed.get("candidatesAnalyzed")),
        grounding_urls: string_list(parsed.get("groundingUrls")),
        deliverables: deliverables(parsed.get("deliverables")),
        concept_image: parsed
            .get("conceptImage")
            .and_then(Value::as_str)
            .map(String::from),
        ..DealRecord::default()
    }
}

fn text_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn number(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn value_list(value: Option<&Value>) -> Vec<Value> {
    value.and_then(Value::as_array).cloned().unwrap_or_default()
}

fn statement_rows(value: Option<&Value>) -> Vec<StatementRow> {
    value
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| StatementRow {
                    label: text_or(row.get("label"), ""),
                    values: row
                        .get("values")
                        .and_then(Value::as_array)
                        .map(|vs| vs.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect())
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn financial_models(value: Option<&Value>) -> FinancialModels {
    // Absent or non-object payloads fall back to the empty-but-shaped
    // skeleton rather than None, so statement renderers never branch.
    let Some(section) = value.filter(|v| v.is_object()) else {
        return FinancialModels::default();
    };
    FinancialModels {
        years: string_list(section.get("years")),
        income_statement: statement_rows(section.get("incomeStatement")),
        balance_sheet: statement_rows(section.get("balanceSheet")),
        cash_flow: statement_rows(section.get("cashFlow")),
    }
}

fn lbo_model(value: Option<&Value>) -> LboModel {
    let field = |key: &str| value.and_then(|section| section.get(key));
    LboModel {
        entry_multiple: number(field("entryMultiple")),
        exit_multiple: number(field("exitMultiple")),
        irr: number(field("irr")),
        moic: number(field("moic")),
        debt_to_equity: number(field("debtToEquity")),
    }
}

fn lbo_detailed(section: &Value) -> LboDetailed {
    LboDetailed {
        assumptions: section
            .get("assumptions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| LabeledNote {
                        label: text_or(item.get("label"), ""),
                        value: text_or(item.get("value"), ""),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        sources_and_uses: amount_lines(
            section
                .get("sourcesAndUses")
                .or_else(|| section.get("sourcesUses")),
        ),
        debt_schedule: statement_rows(section.get("debtSchedule")),
        projected_returns: statement_rows(section.get("projectedReturns")),
    }
}

fn amount_lines(value: Option<&Value>) -> Vec<AmountLine> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| AmountLine {
                    label: text_or(item.get("label"), ""),
                    value: number(item.get("value")),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn memo(value: Option<&Value>) -> InvestmentMemo {
    let field = |key: &str| value.and_then(|section| section.get(key));
    InvestmentMemo {
        executive_summary: text_or(field("executiveSummary"), ""),
        investment_recommendation: field("investmentRecommendation")
            .and_then(Value::as_str)
            .and_then(Recommendation::parse)
            .unwrap_or_default(),
        recommendation_rationale: text_or(field("recommendationRationale"), ""),
        key_merits: string_list(field("keyMerits")),
        investment_thesis: string_list(field("investmentThesis")),
        key_risks: string_list(field("keyRisks")),
        risk_mitigation: text_or(field("riskMitigation"), ""),
        market_overview: text_or(field("marketOverview"), ""),
        competitive_landscape: text_or(field("competitiveLandscape"), ""),
        customer_analysis: text_or(field("customerAnalysis"), ""),
        operational_assessment: text_or(field("operationalAssessment"), ""),
    }
}

fn sensitivity_rows(value: &Value) -> Vec<SensitivityRow> {
    value
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| SensitivityRow {
                    entry_multiple: number(row.get("entryMultiple")),
                    exits: row
                        .get("exits")
                        .and_then(Value::as_array)
                        .map(|cells| {
                            cells
                                .iter()
                                .map(|cell| SensitivityCell {
                                    exit_multiple: number(cell.get("exitMultiple")),
                                    irr: number(cell.get("irr")),
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn deliverables(value: Option<&Value>) -> Vec<Deliverable> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| Deliverable {
                    id: text_or(item.get("id"), ""),
                    kind: text_or(item.get("type"), ""),
                    title: text_or(item.get("title"), ""),
                    status: item
                        .get("status")
                        .and_then(Value::as_str)
                        .and_then(|s| {
                            serde_json::from_value::<DeliverableStatus>(Value::String(s.into()))
                                .ok()
                        })
                        .unwrap_or_default(),
                    slides: item
                        .get("slides")
                        .and_then(Value::as_array)
                        .map(|slides| {
                            slides
                                .iter()
                                .map(|slide| Slide {
                                    title: text_or(slide.get("title"), ""),
                                    bullets: string_list(slide.get("bullets")),
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}
