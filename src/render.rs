//! View descriptions derived from site state.
//!
//! Everything here is a pure function of the stored records: the CLI formats
//! the returned views, and nothing in this module touches storage.

use crate::ledger::{compute_totals, search};
use crate::models::{BoqTotals, Certificate, LineItem, Project, SiteData};
use serde::Serialize;
use std::fmt::Write as _;

/// One BOQ row with its derived columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoqRowView {
    /// Position in the full BOQ (stable under filtering)
    pub index: usize,
    pub id: String,
    pub description: String,
    pub unit: String,
    pub qty: f64,
    pub rate: f64,
    pub amount: f64,
    pub prev_perc: f64,
    pub curr_perc: f64,
    pub total_perc: f64,
    pub work_done_value: f64,
}

impl BoqRowView {
    fn from_item(index: usize, item: &LineItem) -> Self {
        Self {
            index,
            id: item.id.clone(),
            description: item.description.clone(),
            unit: item.unit.clone(),
            qty: item.qty,
            rate: item.rate,
            amount: item.amount(),
            prev_perc: item.prev_perc,
            curr_perc: item.curr_perc,
            total_perc: item.total_perc(),
            work_done_value: item.work_done_value(),
        }
    }
}

/// The BOQ panel: rows (optionally filtered) plus totals over the whole BOQ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoqView {
    pub job_no: String,
    pub rows: Vec<BoqRowView>,
    pub item_count: usize,
    pub totals: BoqTotals,
    pub total_value_display: String,
    pub work_done_display: String,
    pub progress_display: String,
}

/// Build the BOQ panel for `site`. A search term filters rows but not totals.
pub fn boq_view(site: &SiteData, search_term: Option<&str>, currency: &str) -> BoqView {
    let rows = search(&site.boq, search_term.unwrap_or(""))
        .into_iter()
        .map(|(index, item)| BoqRowView::from_item(index, item))
        .collect();
    let totals = compute_totals(&site.boq);

    BoqView {
        job_no: site.job_no.clone(),
        rows,
        item_count: site.boq.len(),
        totals,
        total_value_display: format_money(totals.total_value, currency),
        work_done_display: format_money(totals.total_work_done, currency),
        progress_display: format!("{}%", totals.progress),
    }
}

/// Plain-text table for a BOQ view.
pub fn boq_table(view: &BoqView) -> String {
    let mut out = String::new();
    if view.rows.is_empty() {
        if view.item_count == 0 {
            let _ = writeln!(out, "BOQ for {} is empty.", view.job_no);
        } else {
            let _ = writeln!(out, "No BOQ items match.");
        }
    } else {
        let _ = writeln!(
            out,
            "{:>4}  {:<8} {:<32} {:<6} {:>10} {:>12} {:>14} {:>6} {:>6} {:>6} {:>14}",
            "#", "ID", "Description", "Unit", "Qty", "Rate", "Amount", "Prev", "Curr", "Total",
            "Work Done"
        );
        for row in &view.rows {
            let _ = writeln!(
                out,
                "{:>4}  {:<8} {:<32} {:<6} {:>10} {:>12} {:>14} {:>5}% {:>5}% {:>5}% {:>14}",
                row.index,
                truncate(&row.id, 8),
                truncate(&row.description, 32),
                truncate(&row.unit, 6),
                row.qty,
                format_amount(row.rate),
                format_amount(row.amount),
                row.prev_perc,
                row.curr_perc,
                format!("{:.0}", row.total_perc),
                format_amount(row.work_done_value),
            );
        }
    }
    let _ = writeln!(out, "Total value:     {}", view.total_value_display);
    let _ = writeln!(out, "Work done value: {}", view.work_done_display);
    let _ = write!(out, "Progress:        {}", view.progress_display);
    out
}

/// One row of the certificate history panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateHistoryRow {
    pub index: usize,
    pub cert_no: String,
    /// Issue date as `YYYY-MM-DD`
    pub date: String,
    pub net_payable: f64,
    pub net_payable_display: String,
}

/// Build the certificate history panel, oldest first.
pub fn certificate_history(site: &SiteData, currency: &str) -> Vec<CertificateHistoryRow> {
    site.payment_certificates
        .iter()
        .enumerate()
        .map(|(index, cert)| CertificateHistoryRow {
            index,
            cert_no: cert.cert_no.clone(),
            date: cert.date.format("%Y-%m-%d").to_string(),
            net_payable: cert.net_payable,
            net_payable_display: format_money(cert.net_payable, currency),
        })
        .collect()
}

/// Plain-text table for the certificate history.
pub fn certificate_history_table(rows: &[CertificateHistoryRow]) -> String {
    if rows.is_empty() {
        return "No certificates issued yet.".to_string();
    }
    let mut lines = vec![format!(
        "{:>4}  {:<12} {:<10} {:>20}",
        "#", "Cert. No.", "Date", "Net Payable"
    )];
    for row in rows {
        lines.push(format!(
            "{:>4}  {:<12} {:<10} {:>20}",
            row.index, row.cert_no, row.date, row.net_payable_display
        ));
    }
    lines.join("\n")
}

/// Renders a printable certificate document for a project.
///
/// Implementations own the layout; callers only supply the record.
pub trait CertificateTemplate {
    fn render(&self, certificate: &Certificate, project: &Project) -> String;
}

/// Plain-text certificate layout used by `boq cert show --document`.
#[derive(Debug, Clone)]
pub struct PlainTextTemplate {
    pub currency: String,
}

impl PlainTextTemplate {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }
}

impl CertificateTemplate for PlainTextTemplate {
    fn render(&self, certificate: &Certificate, project: &Project) -> String {
        let money = |v: f64| format_money(v, &self.currency);
        let mut out = String::new();

        let _ = writeln!(out, "INTERIM PAYMENT CERTIFICATE {}", certificate.cert_no);
        let _ = writeln!(out, "{}", "=".repeat(56));
        let _ = writeln!(out, "Project:  {} ({})", project.name, project.job_no);
        if let Some(ref client) = project.client {
            let _ = writeln!(out, "Client:   {}", client);
        }
        if let Some(ref location) = project.location {
            let _ = writeln!(out, "Location: {}", location);
        }
        let _ = writeln!(out, "Date:     {}", certificate.date.format("%Y-%m-%d"));
        let _ = writeln!(out, "{}", "-".repeat(56));

        let lines = [
            ("Total contract value", money(certificate.total_contract_value)),
            (
                "Work done to date",
                format!(
                    "{} ({}%)",
                    money(certificate.work_done_value),
                    certificate.work_done_percentage
                ),
            ),
            ("Less retention", money(-certificate.retention)),
            ("Less advance recovery", money(-certificate.advance_deduction)),
            ("Less previously certified", money(-certificate.previously_certified)),
            ("Total for this invoice", money(certificate.total_for_invoice)),
            ("VAT", money(certificate.vat)),
            ("Round off", money(certificate.round_off)),
        ];
        for (label, value) in lines {
            let _ = writeln!(out, "{:<28}{:>28}", label, value);
        }
        let _ = writeln!(out, "{}", "-".repeat(56));
        let _ = write!(
            out,
            "{:<28}{:>28}",
            "NET PAYABLE",
            money(certificate.net_payable)
        );
        out
    }
}

/// Format an amount with thousands separators and two decimals, e.g. `1,234.50`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some(parts) => parts,
        None => (fixed.as_str(), "00"),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// [`format_amount`] followed by the currency code.
pub fn format_money(value: f64, currency: &str) -> String {
    format!("{} {}", format_amount(value), currency)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
