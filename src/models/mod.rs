//! Data models for boqtrack entities.
//!
//! This module defines the core data structures:
//! - `Project` - A construction job keyed by its job number
//! - `LineItem` - One bill-of-quantities row with quantities, rates and progress
//! - `SiteData` - Per-project aggregate of BOQ items and issued certificates
//! - `Certificate` - An immutable payment certificate record
//! - `BoqTotals` - Roll-up of a BOQ snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A construction project tracked by boqtrack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Job number, the key for all stored project data (e.g., "J-2041")
    pub job_no: String,

    /// Project name
    pub name: String,

    /// Client or employer name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,

    /// Site location or plot reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project with the given job number and name.
    pub fn new(job_no: String, name: String) -> Self {
        Self {
            job_no,
            name,
            client: None,
            location: None,
            created_at: Utc::now(),
        }
    }
}

/// One row of a bill of quantities.
///
/// Numeric fields absent from stored JSON read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item reference as printed on the BOQ (e.g., "2.1", "V.O.")
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Unit of measure (e.g., "m3", "nos")
    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub qty: f64,

    #[serde(default)]
    pub rate: f64,

    /// Percentage certified on previous certificates
    #[serde(default)]
    pub prev_perc: f64,

    /// Percentage completed in the current period
    #[serde(default)]
    pub curr_perc: f64,
}

impl LineItem {
    /// Create an item with the given reference columns and zero progress.
    pub fn new(id: String, description: String, unit: String, qty: f64, rate: f64) -> Self {
        Self {
            id,
            description,
            unit,
            qty,
            rate,
            prev_perc: 0.0,
            curr_perc: 0.0,
        }
    }

    /// The placeholder row appended by `item add`: a variation order
    /// with zero quantity and rate.
    pub fn variation_order() -> Self {
        Self::new(
            "V.O.".to_string(),
            "New Item".to_string(),
            String::new(),
            0.0,
            0.0,
        )
    }

    /// `qty × rate`.
    pub fn amount(&self) -> f64 {
        self.qty * self.rate
    }

    /// Cumulative completion percentage.
    pub fn total_perc(&self) -> f64 {
        self.prev_perc + self.curr_perc
    }

    /// Value of the work completed to date.
    pub fn work_done_value(&self) -> f64 {
        self.amount() * (self.total_perc() / 100.0)
    }

    /// Largest `curr_perc` allowed by the previous certification.
    pub fn max_curr_perc(&self) -> f64 {
        (100.0 - self.prev_perc).max(0.0)
    }
}

/// Editable columns of a BOQ row.
///
/// `prev_perc` is not editable; it only changes through certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoqField {
    Id,
    Description,
    Unit,
    Qty,
    Rate,
    CurrPerc,
}

impl BoqField {
    /// Parse a field name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "id" => Some(Self::Id),
            "description" | "desc" => Some(Self::Description),
            "unit" => Some(Self::Unit),
            "qty" | "quantity" => Some(Self::Qty),
            "rate" => Some(Self::Rate),
            "curr_perc" | "curr-perc" | "current" => Some(Self::CurrPerc),
            _ => None,
        }
    }

    /// Convert to the stored field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Description => "description",
            Self::Unit => "unit",
            Self::Qty => "qty",
            Self::Rate => "rate",
            Self::CurrPerc => "curr_perc",
        }
    }
}

impl fmt::Display for BoqField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-project site record: the BOQ and the certificate history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    /// Job number of the owning project
    pub job_no: String,

    /// Ordered BOQ line items
    #[serde(default)]
    pub boq: Vec<LineItem>,

    /// Cached overall progress percentage, rounded
    #[serde(default)]
    pub progress: u32,

    /// Issued certificates, oldest first
    #[serde(default)]
    pub payment_certificates: Vec<Certificate>,
}

impl SiteData {
    /// Create an empty site record for a project.
    pub fn new(job_no: String) -> Self {
        Self {
            job_no,
            boq: Vec::new(),
            progress: 0,
            payment_certificates: Vec::new(),
        }
    }
}

/// An issued payment certificate. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Certificate number (e.g., "PC-03")
    pub cert_no: String,

    /// Issue timestamp
    pub date: DateTime<Utc>,

    pub total_contract_value: f64,
    pub work_done_value: f64,

    /// Overall completion, rounded to a whole percentage
    pub work_done_percentage: u32,

    pub retention: f64,
    pub advance_deduction: f64,

    /// Sum of `total_for_invoice` over earlier certificates
    pub previously_certified: f64,

    pub total_for_invoice: f64,
    pub vat: f64,
    pub round_off: f64,
    pub net_payable: f64,
}

/// Roll-up of a BOQ snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoqTotals {
    pub total_value: f64,
    pub total_work_done: f64,
    /// `round(total_work_done / total_value × 100)`, 0 for an empty BOQ
    pub progress: u32,
}
