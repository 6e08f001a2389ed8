//! Markdown renditions of widgets for the terminal.
use genui::renderer::{DealRow, Widget};
use serde_json::Value;
use std::fmt::Write;

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn table(columns: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let mut out = format!("| {} |\n", columns.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(columns.len()));
    for row in rows {
        let _ = writeln!(out, "| {} |", row.join(" | "));
    }
    out
}

fn deal_table(deals: &[DealRow], with_issuer: bool) -> String {
    let mut columns = vec!["Priced", "ISIN", "Size", "Tenor", "Coupon", "Spread", "NIP", "Book"];
    if with_issuer {
        columns.insert(1, "Issuer");
    }
    table(
        &columns,
        deals.iter().map(|d| {
            let mut row = vec![
                d.pricing_date.clone(),
                d.isin.clone(),
                format!("{} {}M", d.currency, d.size),
                d.tenor.clone(),
                format!("{}%", d.coupon),
                format!("{}bps", d.spread),
                format!("{}bps", d.nip),
                format!("{}x", d.oversubscription),
            ];
            if with_issuer {
                row.insert(1, d.issuer_name.clone());
            }
            row
        }),
    )
}

/// The markdown shown for a widget.
pub fn widget_markdown(widget: &Widget) -> String {
    match widget {
        Widget::Loading { label } => format!("_{}_\n", label),
        Widget::FilterForm { form, .. } => format!("**{}** (form)\n", form.title),
        Widget::Approval { approval, .. } => {
            format!("**{}** (risk: {})\n", approval.summary, approval.risk)
        }
        Widget::Table(t) => {
            let mut out = String::new();
            if !t.title.is_empty() {
                let _ = writeln!(out, "### {}", t.title);
            }
            if let Some(banner) = &t.banner {
                let _ = writeln!(out, "_{}_\n", banner);
            }
            if !t.rows.is_empty() {
                let columns: Vec<&str> = t.columns.iter().map(String::as_str).collect();
                out.push_str(&table(
                    &columns,
                    t.rows
                        .iter()
                        .map(|row| columns.iter().map(|c| cell(&row[*c])).collect()),
                ));
            }
            out
        }
        Widget::Chart(c) => {
            let mut out = format!("### {} ({} chart)\n", c.title, c.chart_type);
            for point in &c.data {
                let _ = writeln!(out, "- {}: {}", cell(&point[&c.x_key]), cell(&point[&c.y_key]));
            }
            out
        }
        Widget::EntityPicker { query, candidates } => {
            let mut out = format!("Several issuers match \"{}\":\n", query);
            for candidate in candidates {
                let _ = writeln!(
                    out,
                    "- **{}** ({}) {}",
                    candidate.display_name(),
                    candidate.id,
                    candidate.sector.as_deref().unwrap_or_default()
                );
            }
            out
        }
        Widget::EntityResolved(entity) => {
            format!("Resolved **{}** ({})\n", entity.display_name(), entity.id)
        }
        Widget::IssuerTimeline(t) => format!(
            "### {} issuance\n{} deals, {}M raised, avg tenor {}, avg NIP {}bps\n\n{}",
            t.issuer.name,
            t.summary.total_deals,
            t.summary.total_raised,
            t.summary.avg_tenor,
            t.summary.avg_nip,
            deal_table(&t.deals, false)
        ),
        Widget::MarketIssuance(m) => format!(
            "### Market issuance\n{} deals, {}M volume, avg spread {}bps, avg NIP {}bps\n\n{}",
            m.summary.total_deals,
            m.summary.total_volume,
            m.summary.avg_spread,
            m.summary.avg_nip,
            deal_table(&m.deals, true)
        ),
        Widget::ComparableDeals(c) => {
            let mut rows = vec![vec![
                format!("**{}**", c.issuer.name),
                c.issuer_summary.total_deals.to_string(),
                format!("{}bps", c.issuer_summary.avg_nip),
            ]];
            rows.extend(c.peers.iter().map(|p| {
                vec![
                    p.issuer_name.clone(),
                    p.summary.total_deals.to_string(),
                    format!("{}bps", p.summary.avg_nip),
                ]
            }));
            format!(
                "### Peer comparison: {}\n{}\n\n{}",
                c.issuer.name,
                c.comparison.nip_vs_peers,
                table(&["Issuer", "Deals", "Avg NIP"], rows)
            )
        }
        Widget::AllocationBreakdown(a) => {
            let shares = |shares: &[genui::renderer::Share]| {
                table(
                    &["", "Amount", "%"],
                    shares.iter().map(|s| {
                        vec![s.label.clone(), format!("{}M", s.amount), s.percentage.to_string()]
                    }),
                )
            };
            format!(
                "### {} allocations ({}M, {}x covered)\n{} investors, avg fill {}%\n\n{}\n{}",
                a.deal.issuer,
                a.deal.size,
                a.deal.oversubscription,
                a.summary.total_investors,
                a.summary.avg_fill_rate,
                shares(&a.breakdown.by_type),
                shares(&a.breakdown.by_geography)
            )
        }
        Widget::SecondaryPerformance(p) => {
            let latest = p.performance.last();
            format!(
                "### {} {}% {} ({})\nIssued at {}bps, now {}bps ({:+}bps): **{}**\n{}\n",
                p.bond.issuer,
                p.bond.coupon,
                p.bond.tenor,
                p.bond.isin,
                p.bond.issue_spread,
                latest.map_or(p.bond.issue_spread, |l| l.spread),
                p.drift,
                p.analysis.trend,
                p.analysis.interpretation
            )
        }
        Widget::ParticipationHistory(h) => format!(
            "### Investor behaviour for {}\n{} participations, {}% held, {}% flipped\n\n{}",
            h.issuer_id,
            h.summary.total_participations,
            h.summary.hold_percentage,
            h.summary.flip_percentage,
            table(
                &["Date", "Deal", "Allocated", "Behaviour"],
                h.participations.iter().map(|p| {
                    vec![
                        p.date.clone(),
                        p.deal_name.clone(),
                        format!("{}M", p.allocated_size),
                        p.behaviour.clone(),
                    ]
                })
            )
        ),
        Widget::ExportPanel(e) => {
            let mut out = format!(
                "## Mandate brief: {}\n_generated {}_\n",
                e.brief.issuer_name, e.brief.generated_at
            );
            for section in &e.brief.sections {
                let _ = write!(out, "\n### {}\n{}\n", section.title, section.content);
            }
            let _ = writeln!(out, "\nExport as: {}", e.export_formats.join(", "));
            out
        }
        Widget::IssuerProfile(p) => {
            let mut out = format!("### {}\n", p.title);
            for (field, value) in &p.facts {
                let _ = writeln!(out, "- **{}**: {}", field, value);
            }
            out
        }
        Widget::InvestorList(l) => format!(
            "### {} investors\n{}",
            l.total,
            table(
                &["Name", "Type", "Geography", "Flip score"],
                l.investors.iter().map(|i| {
                    vec![
                        i.name.clone(),
                        i.investor_type.clone(),
                        i.geography.clone(),
                        i.flip_score.to_string(),
                    ]
                })
            )
        ),
        Widget::SectorCurve(c) => format!(
            "### {} {} curve vs {}\n{}",
            c.sector,
            c.rating,
            c.benchmark,
            table(
                &["Tenor", "Spread", "Yield"],
                c.curve.iter().map(|p| {
                    vec![p.tenor.clone(), format!("{}bps", p.spread), format!("{}%", p.yield_pct)]
                })
            )
        ),
        Widget::Submitted { text } => format!("✓ {}\n", text),
        Widget::ErrorNotice { tool_name, message } => {
            format!("**{} failed:** {}\n", tool_name, message)
        }
        Widget::Fallback { tool_name, state } => format!("Tool: {} ({})\n", tool_name, state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genui::renderer::Table;
    use serde_json::json;

    #[test]
    fn test_table_markdown() {
        let widget = Widget::Table(Table {
            title: "employees".to_string(),
            columns: vec!["Name".to_string(), "Salary".to_string()],
            rows: vec![json!({"Name": "Ada", "Salary": "$120,000"})],
            banner: Some("Showing 1 of 50".to_string()),
        });
        assert_eq!(
            widget_markdown(&widget),
            "### employees\n_Showing 1 of 50_\n\n| Name | Salary |\n|---|---|\n| Ada | $120,000 |\n"
        );
    }

    #[test]
    fn test_empty_table_shows_banner_only() {
        let widget = Widget::Table(Table {
            title: String::new(),
            columns: vec!["Name".to_string()],
            rows: vec![],
            banner: Some("No results found".to_string()),
        });
        assert_eq!(widget_markdown(&widget), "_No results found_\n\n");
    }

    #[test]
    fn test_fallback_and_error() {
        assert_eq!(
            widget_markdown(&Widget::Fallback {
                tool_name: "weather".to_string(),
                state: "call".to_string()
            }),
            "Tool: weather (call)\n"
        );
        assert!(widget_markdown(&Widget::ErrorNotice {
            tool_name: "get_performance".to_string(),
            message: "Bond not found: XS0".to_string()
        })
        .contains("Bond not found"));
    }
}
