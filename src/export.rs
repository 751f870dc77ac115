//! Export surfaces over the deal record.
//!
//! Consumers of the record, not part of the core: a CSV layout mirroring the
//! financial sections and a Markdown layout mirroring the memo. Both are pure
//! text producers; writing them anywhere is the caller's business.

use crate::deal::{DealRecord, StatementRow};

/// CSV of the financial sections: the three statements, the LBO summary, and
/// sources & uses when present.
pub fn financials_csv(deal: &DealRecord) -> String {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let mut header = vec!["Line Item".to_string()];
    header.extend(deal.financial_models.years.iter().cloned());

    for (title, rows) in [
        ("Income Statement", &deal.financial_models.income_statement),
        ("Balance Sheet", &deal.financial_models.balance_sheet),
        ("Cash Flow", &deal.financial_models.cash_flow),
    ] {
        let _ = writer.write_record([title]);
        let _ = writer.write_record(&header);
        write_statement_rows(&mut writer, rows);
        let _ = writer.write_record([""]);
    }

    let _ = writer.write_record(["LBO Summary"]);
    let _ = writer.write_record(["Metric", "Value"]);
    for (metric, value) in [
        ("Entry Multiple", deal.lbo_model.entry_multiple),
        ("Exit Multiple", deal.lbo_model.exit_multiple),
        ("IRR", deal.lbo_model.irr),
        ("MOIC", deal.lbo_model.moic),
        ("Debt / Equity", deal.lbo_model.debt_to_equity),
    ] {
        let _ = writer.write_record([metric, &format_number(value)]);
    }

    if let Some(detailed) = &deal.lbo_detailed {
        if !detailed.sources_and_uses.is_empty() {
            let _ = writer.write_record([""]);
            let _ = writer.write_record(["Sources & Uses"]);
            let _ = writer.write_record(["Item", "Amount"]);
            for line in &detailed.sources_and_uses {
                let _ = writer.write_record([line.label.as_str(), &format_number(line.value)]);
            }
        }
    }

    let bytes = writer.into_inner().unwrap_or_default();
    String::from_utf8(bytes).unwrap_or_default()
}

fn write_statement_rows(writer: &mut csv::Writer<Vec<u8>>, rows: &[StatementRow]) {
    for row in rows {
        let mut record = vec![row.label.clone()];
        record.extend(row.values.iter().map(|v| format_number(*v)));
        let _ = writer.write_record(&record);
    }
}

fn format_number(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}

/// Markdown of the investment memo.
pub fn memo_markdown(deal: &DealRecord) -> String {
    let memo = &deal.memo;
    let mut out = String::new();

    out.push_str(&format!("# Investment Memo: {}\n\n", deal.company_name));
    out.push_str(&format!(
        "**Recommendation:** {}\n\n",
        memo.investment_recommendation.as_str()
    ));
    if !memo.recommendation_rationale.is_empty() {
        out.push_str(&format!("_{}_\n\n", memo.recommendation_rationale));
    }

    out.push_str("## Executive Summary\n\n");
    out.push_str(if memo.executive_summary.is_empty() {
        "(not yet drafted)"
    } else {
        &memo.executive_summary
    });
    out.push_str("\n\n");

    for (title, items) in [
        ("Key Merits", &memo.key_merits),
        ("Investment Thesis", &memo.investment_thesis),
        ("Key Risks", &memo.key_risks),
    ] {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("## {title}\n\n"));
        for item in items {
            out.push_str(&format!("- {item}\n"));
        }
        out.push('\n');
    }

    for (title, body) in [
        ("Risk Mitigation", &memo.risk_mitigation),
        ("Market Overview", &memo.market_overview),
        ("Competitive Landscape", &memo.competitive_landscape),
        ("Customer Analysis", &memo.customer_analysis),
        ("Operational Assessment", &memo.operational_assessment),
    ] {
        if body.is_empty() {
            continue;
        }
        out.push_str(&format!("## {title}\n\n{body}\n\n"));
    }

    if !deal.grounding_urls.is_empty() {
        out.push_str("## Sources\n\n");
        for url in &deal.grounding_urls {
            out.push_str(&format!("- <{url}>\n"));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deal::{AmountLine, LboDetailed, Recommendation};

    fn sample_deal() -> DealRecord {
        let mut deal = DealRecord::default();
        deal.company_name = "Acme Fasteners".to_string();
        deal.financial_models.years = vec!["FY24".to_string(), "FY25".to_string()];
        deal.financial_models.income_statement = vec![
            StatementRow {
                label: "Revenue".to_string(),
                values: vec![100.0, 115.5],
            },
            StatementRow {
                label: "EBITDA, adjusted".to_string(),
                values: vec![20.0, 24.0],
            },
        ];
        deal.lbo_model.entry_multiple = 8.0;
        deal.lbo_model.irr = 25.5;
        deal.memo.investment_recommendation = Recommendation::Go;
        deal.memo.executive_summary = "A durable niche manufacturer.".to_string();
        deal.memo.key_risks = vec!["Customer concentration".to_string()];
        deal
    }

    #[test]
    fn csv_mirrors_sections_and_quotes_commas() {
        let csv = financials_csv(&sample_deal());
        assert!(csv.contains("Income Statement"));
        assert!(csv.contains("Line Item,FY24,FY25"));
        assert!(csv.contains("Revenue,100,115.50"));
        // Labels containing commas must be quoted.
        assert!(csv.contains("\"EBITDA, adjusted\",20,24"));
        assert!(csv.contains("Balance Sheet"));
        assert!(csv.contains("Cash Flow"));
        assert!(csv.contains("IRR,25.50"));
    }

    #[test]
    fn csv_includes_sources_and_uses_when_present() {
        let mut deal = sample_deal();
        deal.lbo_detailed = Some(LboDetailed {
            sources_and_uses: vec![AmountLine {
                label: "Senior debt".to_string(),
                value: 120.0,
            }],
            ..LboDetailed::default()
        });
        let csv = financials_csv(&deal);
        assert!(csv.contains("Sources & Uses"));
        assert!(csv.contains("Senior debt,120"));
    }

    #[test]
    fn memo_markdown_mirrors_memo_fields() {
        let md = memo_markdown(&sample_deal());
        assert!(md.starts_with("# Investment Memo: Acme Fasteners"));
        assert!(md.contains("**Recommendation:** GO"));
        assert!(md.contains("A durable niche manufacturer."));
        assert!(md.contains("## Key Risks"));
        assert!(md.contains("- Customer concentration"));
        // Empty narrative sections are omitted, not rendered blank.
        assert!(!md.contains("## Market Overview"));
    }

    #[test]
    fn memo_markdown_handles_fully_defaulted_record() {
        let md = memo_markdown(&DealRecord::default());
        assert!(md.contains("**Recommendation:** HOLD"));
        assert!(md.contains("(not yet drafted)"));
    }
}
