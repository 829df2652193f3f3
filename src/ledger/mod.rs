//! BOQ ledger operations.
//!
//! Pure functions over a project's [`SiteData`]: adding, editing and removing
//! line items, rolling up totals, and staging a destructive import. Callers
//! run these inside [`Storage::update_site_data`](crate::storage::Storage::update_site_data)
//! so the read-modify-write happens in one transaction.

pub mod delimited;

use crate::models::{BoqField, BoqTotals, LineItem, SiteData};
use crate::{Error, Result};
use serde::Serialize;

/// Roll up a list of line items.
///
/// `progress` is the rounded share of work done, or 0 when the BOQ has no value.
pub fn compute_totals(items: &[LineItem]) -> BoqTotals {
    let total_value: f64 = items.iter().map(LineItem::amount).sum();
    let total_work_done: f64 = items.iter().map(LineItem::work_done_value).sum();

    let progress = if total_value > 0.0 {
        (total_work_done / total_value * 100.0).round() as u32
    } else {
        0
    };

    BoqTotals {
        total_value,
        total_work_done,
        progress,
    }
}

/// Recompute the cached progress. Returns true if the cached value changed.
pub fn refresh_progress(site: &mut SiteData) -> bool {
    let totals = compute_totals(&site.boq);
    if site.progress != totals.progress {
        site.progress = totals.progress;
        true
    } else {
        false
    }
}

/// Append a default variation-order row. Returns its index.
pub fn add_item(site: &mut SiteData) -> usize {
    site.boq.push(LineItem::variation_order());
    site.boq.len() - 1
}

/// Apply one cell edit to the item at `index`.
///
/// Numeric fields go through [`parse_lenient_number`]; `qty` and `rate` are
/// floored at zero and `curr_perc` is clamped to `[0, 100 - prev_perc]`.
/// Text fields store the raw value.
pub fn edit_item<'a>(
    site: &'a mut SiteData,
    index: usize,
    field: BoqField,
    value: &str,
) -> Result<&'a LineItem> {
    let count = site.boq.len();
    let item = site
        .boq
        .get_mut(index)
        .ok_or_else(|| item_not_found(index, count))?;

    match field {
        BoqField::Id => item.id = value.to_string(),
        BoqField::Description => item.description = value.to_string(),
        BoqField::Unit => item.unit = value.to_string(),
        BoqField::Qty => item.qty = non_negative(parse_lenient_number(value)),
        BoqField::Rate => item.rate = non_negative(parse_lenient_number(value)),
        BoqField::CurrPerc => {
            let max = item.max_curr_perc();
            item.curr_perc = non_negative(parse_lenient_number(value).clamp(0.0, max));
        }
    }

    Ok(item)
}

/// Remove the item at `index`. Later items shift down by one.
pub fn remove_item(site: &mut SiteData, index: usize) -> Result<LineItem> {
    if index >= site.boq.len() {
        return Err(item_not_found(index, site.boq.len()));
    }
    Ok(site.boq.remove(index))
}

/// Look up an item by index.
pub fn get_item(site: &SiteData, index: usize) -> Result<&LineItem> {
    site.boq
        .get(index)
        .ok_or_else(|| item_not_found(index, site.boq.len()))
}

/// Filter items by a case-insensitive match on description or id.
///
/// Returned pairs keep each item's index in the full list so edits made from
/// a filtered view address the right row. An empty term matches everything.
pub fn search<'a>(items: &'a [LineItem], term: &str) -> Vec<(usize, &'a LineItem)> {
    let needle = term.trim().to_lowercase();
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            needle.is_empty()
                || item.description.to_lowercase().contains(&needle)
                || item.id.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Staged result of parsing an import file, shown before the BOQ is replaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPreview {
    /// Items that will replace the current BOQ
    pub items: Vec<LineItem>,
    /// Number of existing items that will be discarded
    pub removed: usize,
    /// Whether the first row was recognized as a header
    pub header_skipped: bool,
    /// Rows dropped for having fewer than five columns
    pub skipped_rows: usize,
    /// Totals of the current BOQ
    pub before: BoqTotals,
    /// Totals after the import
    pub after: BoqTotals,
}

/// Parse `text` and describe what importing it would change. Does not mutate.
pub fn preview_import(text: &str, current: &[LineItem]) -> ImportPreview {
    let parsed = delimited::import_from_delimited_text(text);
    let after = compute_totals(&parsed.items);
    ImportPreview {
        items: parsed.items,
        removed: current.len(),
        header_skipped: parsed.header_skipped,
        skipped_rows: parsed.skipped_rows,
        before: compute_totals(current),
        after,
    }
}

/// Replace the BOQ with the previewed items. Returns the new item count.
pub fn commit_import(site: &mut SiteData, preview: ImportPreview) -> usize {
    site.boq = preview.items;
    site.boq.len()
}

/// Parse a number the way a lenient float parser reads a typed cell.
///
/// Leading whitespace is skipped and the longest numeric prefix is used, so
/// `"12.5 m"` reads as 12.5. Input with no numeric prefix, or a non-finite
/// result, reads as 0.
pub fn parse_lenient_number(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return 0.0;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Floor at zero, folding -0.0 into 0.0.
fn non_negative(value: f64) -> f64 {
    if value > 0.0 { value } else { 0.0 }
}

fn item_not_found(index: usize, count: usize) -> Error {
    Error::NotFound(format!(
        "BOQ item #{} does not exist (BOQ has {} items)",
        index, count
    ))
}
