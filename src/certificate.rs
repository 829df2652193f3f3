//! Payment certificate generation.
//!
//! A certificate values the work done to date from the BOQ snapshot, holds
//! back retention and advance recovery, subtracts what earlier certificates
//! already invoiced, adds VAT on a positive balance and rounds the payable
//! up to the next whole currency unit.

use crate::ledger::compute_totals;
use crate::models::{Certificate, SiteData};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default share of work done withheld as retention.
pub const DEFAULT_RETENTION_RATE: f64 = 0.10;
/// Default share of work done deducted to recover the advance payment.
pub const DEFAULT_ADVANCE_RATE: f64 = 0.10;
/// Default VAT rate applied to a positive invoice total.
pub const DEFAULT_VAT_RATE: f64 = 0.05;

/// Rates applied when generating a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CertificateRates {
    pub retention: f64,
    pub advance: f64,
    pub vat: f64,
}

impl Default for CertificateRates {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION_RATE,
            advance: DEFAULT_ADVANCE_RATE,
            vat: DEFAULT_VAT_RATE,
        }
    }
}

/// Compute the next certificate for `site` without recording it.
///
/// Fails with [`Error::Validation`] when `cert_no` is blank or the BOQ is empty.
pub fn generate(
    cert_no: &str,
    site: &SiteData,
    rates: &CertificateRates,
    date: DateTime<Utc>,
) -> Result<Certificate> {
    let cert_no = cert_no.trim();
    if cert_no.is_empty() {
        return Err(Error::Validation(
            "Please provide a Certificate Number.".to_string(),
        ));
    }
    if site.boq.is_empty() {
        return Err(Error::Validation(
            "Cannot generate certificate. No BOQ data found from site engineer.".to_string(),
        ));
    }

    let totals = compute_totals(&site.boq);
    let work_done_value = totals.total_work_done;
    let work_done_percentage = if totals.total_value > 0.0 {
        work_done_value / totals.total_value * 100.0
    } else {
        0.0
    };

    let retention = work_done_value * rates.retention;
    let advance_deduction = work_done_value * rates.advance;
    let previously_certified = previously_certified(&site.payment_certificates);
    let total_for_invoice = work_done_value - retention - advance_deduction - previously_certified;
    let vat = if total_for_invoice > 0.0 {
        total_for_invoice * rates.vat
    } else {
        0.0
    };
    let gross = total_for_invoice + vat;
    let round_off = gross.ceil() - gross;
    let net_payable = gross + round_off;

    Ok(Certificate {
        cert_no: cert_no.to_string(),
        date,
        total_contract_value: totals.total_value,
        work_done_value,
        work_done_percentage: work_done_percentage.round() as u32,
        retention,
        advance_deduction,
        previously_certified,
        total_for_invoice,
        vat,
        round_off,
        net_payable,
    })
}

/// Generate a certificate and append it to the site's history.
pub fn issue(
    cert_no: &str,
    site: &mut SiteData,
    rates: &CertificateRates,
    date: DateTime<Utc>,
) -> Result<Certificate> {
    let certificate = generate(cert_no, site, rates, date)?;
    site.payment_certificates.push(certificate.clone());
    Ok(certificate)
}

/// Sum of `total_for_invoice` across prior certificates.
pub fn previously_certified(history: &[Certificate]) -> f64 {
    history.iter().map(|c| c.total_for_invoice).sum()
}

/// Suggested number for the next certificate, e.g. `PC-03` after two issued.
pub fn suggest_next_cert_no(history: &[Certificate]) -> String {
    format!("PC-{:02}", history.len() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineItem;
    use chrono::TimeZone;

    fn fixed_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 9, 0, 0).unwrap()
    }

    fn site_with_progress(qty: f64, rate: f64, prev: f64, curr: f64) -> SiteData {
        let mut item = LineItem::new(
            "1".to_string(),
            "Structure".to_string(),
            "ls".to_string(),
            qty,
            rate,
        );
        item.prev_perc = prev;
        item.curr_perc = curr;
        let mut site = SiteData::new("J-1".to_string());
        site.boq.push(item);
        site
    }

    #[test]
    fn test_generate_first_certificate() {
        let site = site_with_progress(10.0, 100.0, 0.0, 50.0);
        let cert = generate("PC-01", &site, &CertificateRates::default(), fixed_date()).unwrap();

        assert_eq!(cert.total_contract_value, 1000.0);
        assert_eq!(cert.work_done_value, 500.0);
        assert_eq!(cert.work_done_percentage, 50);
        assert_eq!(cert.retention, 50.0);
        assert_eq!(cert.advance_deduction, 50.0);
        assert_eq!(cert.previously_certified, 0.0);
        assert_eq!(cert.total_for_invoice, 400.0);
        assert_eq!(cert.vat, 20.0);
        assert_eq!(cert.round_off, 0.0);
        assert_eq!(cert.net_payable, 420.0);
        assert_eq!(cert.date, fixed_date());
    }

    #[test]
    fn test_round_off_reaches_next_whole_unit() {
        // 333 done -> 266.4 invoice + 13.32 VAT = 279.72 -> 280
        let site = site_with_progress(1.0, 333.0, 0.0, 100.0);
        let cert = generate("PC-01", &site, &CertificateRates::default(), fixed_date()).unwrap();

        assert_eq!(cert.net_payable, 280.0);
        assert!(cert.round_off > 0.0 && cert.round_off < 1.0);
        assert!((cert.total_for_invoice + cert.vat + cert.round_off - 280.0).abs() < 1e-9);
    }

    #[test]
    fn test_second_certificate_deducts_previous_invoice() {
        let mut site = site_with_progress(10.0, 100.0, 0.0, 50.0);
        let rates = CertificateRates::default();
        let first = issue("PC-01", &mut site, &rates, fixed_date()).unwrap();

        site.boq[0].prev_perc = 50.0;
        site.boq[0].curr_perc = 30.0;
        let second = issue("PC-02", &mut site, &rates, fixed_date()).unwrap();

        assert_eq!(second.previously_certified, first.total_for_invoice);
        // 800 done - 80 - 80 - 400
        assert_eq!(second.total_for_invoice, 240.0);
        assert_eq!(second.vat, 12.0);
        assert_eq!(second.net_payable, 252.0);
        assert_eq!(site.payment_certificates.len(), 2);
    }

    #[test]
    fn test_no_vat_on_negative_balance() {
        let mut site = site_with_progress(10.0, 100.0, 0.0, 50.0);
        let rates = CertificateRates::default();
        issue("PC-01", &mut site, &rates, fixed_date()).unwrap();

        // No further progress: the whole previous invoice comes back negative
        let second = generate("PC-02", &site, &rates, fixed_date()).unwrap();
        assert_eq!(second.total_for_invoice, 0.0);
        assert_eq!(second.vat, 0.0);

        site.boq[0].curr_perc = 10.0;
        let third = generate("PC-03", &site, &rates, fixed_date()).unwrap();
        assert!(third.total_for_invoice < 0.0);
        assert_eq!(third.vat, 0.0);
        assert_eq!(third.net_payable, third.total_for_invoice.ceil());
    }

    #[test]
    fn test_zero_value_boq_has_zero_percentage() {
        let site = site_with_progress(0.0, 0.0, 0.0, 0.0);
        let cert = generate("PC-01", &site, &CertificateRates::default(), fixed_date()).unwrap();
        assert_eq!(cert.work_done_percentage, 0);
        assert_eq!(cert.net_payable, 0.0);
    }

    #[test]
    fn test_generate_rejects_empty_boq() {
        let site = SiteData::new("J-1".to_string());
        let result = generate("PC-01", &site, &CertificateRates::default(), fixed_date());
        assert!(matches!(result, Err(Error::Validation(msg)) if msg.contains("No BOQ data")));
    }

    #[test]
    fn test_generate_rejects_blank_number() {
        let site = site_with_progress(1.0, 1.0, 0.0, 0.0);
        let result = generate("   ", &site, &CertificateRates::default(), fixed_date());
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_generate_does_not_append() {
        let site = site_with_progress(1.0, 1.0, 0.0, 0.0);
        generate("PC-01", &site, &CertificateRates::default(), fixed_date()).unwrap();
        assert!(site.payment_certificates.is_empty());
    }

    #[test]
    fn test_custom_rates() {
        let site = site_with_progress(10.0, 100.0, 0.0, 100.0);
        let rates = CertificateRates {
            retention: 0.05,
            advance: 0.0,
            vat: 0.0,
        };
        let cert = generate("PC-01", &site, &rates, fixed_date()).unwrap();
        assert_eq!(cert.retention, 50.0);
        assert_eq!(cert.total_for_invoice, 950.0);
        assert_eq!(cert.net_payable, 950.0);
    }

    #[test]
    fn test_suggest_next_cert_no() {
        assert_eq!(suggest_next_cert_no(&[]), "PC-01");

        let mut site = site_with_progress(10.0, 100.0, 0.0, 50.0);
        let rates = CertificateRates::default();
        for n in 1..=11 {
            issue(&format!("PC-{:02}", n), &mut site, &rates, fixed_date()).unwrap();
        }
        assert_eq!(suggest_next_cert_no(&site.payment_certificates), "PC-12");
    }
}
