//! BOQ line item commands.

use super::{Output, json_string};
use crate::ledger::{self, ImportPreview, delimited};
use crate::models::{BoqField, BoqTotals, LineItem};
use crate::render::{self, BoqView, format_money};
use crate::state::AppState;
use crate::storage::write_atomic;
use crate::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct ItemAdded {
    pub added: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<LineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Output for ItemAdded {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match (self.index, &self.reason) {
            (Some(index), _) => format!("Added variation order line #{}", index),
            (None, Some(reason)) => format!("Nothing added: {}", reason),
            (None, None) => "Nothing added".to_string(),
        }
    }
}

/// Append a blank variation order line to the selected project.
///
/// With no project selected this is a no-op that reports why.
pub fn item_add(state: &mut AppState) -> Result<ItemAdded> {
    let Some(job_no) = state.current_job_no.clone() else {
        return Ok(ItemAdded {
            added: false,
            index: None,
            item: None,
            reason: Some("no project selected".to_string()),
        });
    };

    let (index, item) = state.storage.update_site_data(&job_no, |site| {
        let index = ledger::add_item(site);
        Ok((index, site.boq[index].clone()))
    })?;
    tracing::debug!(job_no = %job_no, index, "added BOQ item");

    Ok(ItemAdded {
        added: true,
        index: Some(index),
        item: Some(item),
        reason: None,
    })
}

#[derive(Debug, Serialize)]
pub struct ItemEdited {
    pub index: usize,
    pub field: String,
    pub item: LineItem,
    pub amount: f64,
    pub total_perc: f64,
    pub work_done_value: f64,
    pub totals: BoqTotals,
}

impl Output for ItemEdited {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Updated #{} {}: {} ({} x {} = {}, {}% done)\nBOQ progress: {}%",
            self.index,
            self.field,
            self.item.description,
            self.item.qty,
            self.item.rate,
            render::format_amount(self.amount),
            self.total_perc,
            self.totals.progress
        )
    }
}

/// Edit one field of the item at `index`.
pub fn item_edit(state: &mut AppState, index: usize, field: &str, value: &str) -> Result<ItemEdited> {
    let job_no = state.require_project()?;
    let field = BoqField::parse(field).ok_or_else(|| {
        Error::InvalidInput(format!(
            "Unknown field '{}'. Valid fields: id, description, unit, qty, rate, curr-perc",
            field
        ))
    })?;

    let (item, totals) = state.storage.update_site_data(&job_no, |site| {
        let item = ledger::edit_item(site, index, field, value)?.clone();
        Ok((item, ledger::compute_totals(&site.boq)))
    })?;

    Ok(ItemEdited {
        index,
        field: field.to_string(),
        amount: item.amount(),
        total_perc: item.total_perc(),
        work_done_value: item.work_done_value(),
        item,
        totals,
    })
}

#[derive(Debug, Serialize)]
pub struct ItemDeleted {
    pub index: usize,
    pub item: LineItem,
    pub remaining: usize,
    pub totals: BoqTotals,
}

impl Output for ItemDeleted {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Deleted #{} {} ({} items left, progress {}%)",
            self.index, self.item.description, self.remaining, self.totals.progress
        )
    }
}

/// Delete the item at `index`. Refuses without `confirmed`.
pub fn item_delete(state: &mut AppState, index: usize, confirmed: bool) -> Result<ItemDeleted> {
    let job_no = state.require_project()?;

    if !confirmed {
        let site = state.storage.get_site_data(&job_no)?;
        let item = ledger::get_item(&site, index)?;
        return Err(Error::ConfirmationRequired(format!(
            "Delete item: {}?",
            item.description
        )));
    }

    let (item, remaining, totals) = state.storage.update_site_data(&job_no, |site| {
        let item = ledger::remove_item(site, index)?;
        Ok((item, site.boq.len(), ledger::compute_totals(&site.boq)))
    })?;
    tracing::info!(job_no = %job_no, index, id = %item.id, "deleted BOQ item");

    Ok(ItemDeleted {
        index,
        item,
        remaining,
        totals,
    })
}

impl Output for BoqView {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        render::boq_table(self)
    }
}

/// List the selected project's BOQ, optionally filtered.
pub fn item_list(state: &AppState, search: Option<&str>) -> Result<BoqView> {
    let job_no = state.require_project()?;
    let site = state.storage.get_site_data(&job_no)?;
    Ok(render::boq_view(&site, search, state.currency()))
}

#[derive(Debug, Serialize)]
pub struct TotalsResult {
    pub job_no: String,
    pub item_count: usize,
    pub totals: BoqTotals,
    pub currency: String,
    /// Whether the stored progress was out of date and has been rewritten
    pub progress_updated: bool,
}

impl Output for TotalsResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "{}: {} items\n  Contract value: {}\n  Work done: {}\n  Progress: {}%",
            self.job_no,
            self.item_count,
            format_money(self.totals.total_value, &self.currency),
            format_money(self.totals.total_work_done, &self.currency),
            self.totals.progress
        )
    }
}

/// Compute totals and bring the stored progress up to date.
pub fn item_totals(state: &mut AppState) -> Result<TotalsResult> {
    let job_no = state.require_project()?;
    let (totals, progress_updated) = state.storage.refresh_progress(&job_no)?;
    let item_count = state.storage.get_site_data(&job_no)?.boq.len();

    Ok(TotalsResult {
        job_no,
        item_count,
        totals,
        currency: state.currency().to_string(),
        progress_updated,
    })
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub job_no: String,
    pub file: String,
    /// False when only a preview was produced
    pub committed: bool,
    pub item_count: usize,
    pub replaced: usize,
    pub header_skipped: bool,
    pub skipped_rows: usize,
    pub before: BoqTotals,
    pub after: BoqTotals,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<LineItem>,
}

impl ImportResult {
    fn new(job_no: String, file: &Path, preview: &ImportPreview, committed: bool) -> Self {
        Self {
            job_no,
            file: file.display().to_string(),
            committed,
            item_count: preview.items.len(),
            replaced: preview.removed,
            header_skipped: preview.header_skipped,
            skipped_rows: preview.skipped_rows,
            before: preview.before,
            after: preview.after,
            items: if committed {
                Vec::new()
            } else {
                preview.items.clone()
            },
        }
    }
}

impl Output for ImportResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.committed {
            lines.push(format!(
                "Imported {} items into {} (replaced {}).",
                self.item_count, self.job_no, self.replaced
            ));
        } else {
            lines.push(format!(
                "Found {} items. This will REPLACE the existing BOQ ({} items).",
                self.item_count, self.replaced
            ));
            for item in self.items.iter().take(10) {
                lines.push(format!(
                    "  {:<8} {:<40} {:<6} {:>10} x {:>10}",
                    item.id, item.description, item.unit, item.qty, item.rate
                ));
            }
            if self.items.len() > 10 {
                lines.push(format!("  ... and {} more", self.items.len() - 10));
            }
            lines.push("Re-run with --yes to import.".to_string());
        }
        if self.skipped_rows > 0 {
            lines.push(format!(
                "Skipped {} rows with fewer than {} columns.",
                self.skipped_rows,
                delimited::MIN_IMPORT_COLUMNS
            ));
        }
        lines.push(format!(
            "Contract value: {} -> {}",
            render::format_amount(self.before.total_value),
            render::format_amount(self.after.total_value)
        ));
        lines.join("\n")
    }
}

/// Preview an import, or replace the BOQ with it when `confirmed`.
pub fn item_import(state: &mut AppState, file: &Path, confirmed: bool) -> Result<ImportResult> {
    let job_no = state.require_project()?;
    let text = fs::read_to_string(file)?;

    if !confirmed {
        let site = state.storage.get_site_data(&job_no)?;
        let preview = ledger::preview_import(&text, &site.boq);
        return Ok(ImportResult::new(job_no, file, &preview, false));
    }

    // Parse against the stored BOQ inside the transaction so the preview
    // numbers match what was replaced.
    let preview = state.storage.update_site_data(&job_no, |site| {
        let preview = ledger::preview_import(&text, &site.boq);
        ledger::commit_import(site, preview.clone());
        Ok(preview)
    })?;
    tracing::info!(
        job_no = %job_no,
        items = preview.items.len(),
        replaced = preview.removed,
        "imported BOQ"
    );

    Ok(ImportResult::new(job_no, file, &preview, true))
}

#[derive(Debug, Serialize)]
pub struct ExportResult {
    pub job_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub item_count: usize,
    /// Export text when writing to stdout
    #[serde(skip)]
    pub content: Option<String>,
}

impl Output for ExportResult {
    fn to_json(&self) -> String {
        match &self.content {
            Some(content) => content.clone(),
            None => json_string(self),
        }
    }

    fn to_human(&self) -> String {
        match (&self.content, &self.path) {
            (Some(content), _) => content.clone(),
            (None, Some(path)) => format!("Exported {} items to {}", self.item_count, path),
            (None, None) => String::new(),
        }
    }
}

/// Export the BOQ as comma-separated text.
///
/// `output` of `-` returns the text for stdout; otherwise it is written to
/// `output` or `<JOB_NO>_BOQ_Export.csv` in the current directory.
pub fn item_export(state: &AppState, output: Option<&Path>) -> Result<ExportResult> {
    let job_no = state.require_project()?;
    let site = state.storage.get_site_data(&job_no)?;
    if site.boq.is_empty() {
        return Err(Error::Validation("BOQ is empty. Nothing to export.".to_string()));
    }

    let text = delimited::export_to_delimited_text(&site.boq);
    if output == Some(Path::new("-")) {
        return Ok(ExportResult {
            job_no,
            path: None,
            item_count: site.boq.len(),
            content: Some(text),
        });
    }

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(delimited::export_file_name(&job_no)),
    };
    write_atomic(&path, &text)?;

    Ok(ExportResult {
        job_no,
        path: Some(path.display().to_string()),
        item_count: site.boq.len(),
        content: None,
    })
}
