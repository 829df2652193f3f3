//! Payment certificate commands.

use super::{Output, json_string};
use crate::certificate;
use crate::models::Certificate;
use crate::render::{
    self, CertificateHistoryRow, CertificateTemplate, PlainTextTemplate, format_money,
};
use crate::state::AppState;
use crate::{Error, Result};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NextCertNo {
    pub job_no: String,
    pub cert_no: String,
    pub issued: usize,
}

impl Output for NextCertNo {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Next certificate for {}: {} ({} issued so far)",
            self.job_no, self.cert_no, self.issued
        )
    }
}

/// Suggest the next certificate number for the selected project.
pub fn cert_next(state: &AppState) -> Result<NextCertNo> {
    let job_no = state.require_project()?;
    let site = state.storage.get_site_data(&job_no)?;
    Ok(NextCertNo {
        cert_no: certificate::suggest_next_cert_no(&site.payment_certificates),
        issued: site.payment_certificates.len(),
        job_no,
    })
}

#[derive(Debug, Serialize)]
pub struct CertIssued {
    pub job_no: String,
    pub index: usize,
    pub certificate: Certificate,
    #[serde(skip)]
    pub document: String,
}

impl Output for CertIssued {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Certificate {} saved to history.\n\n{}",
            self.certificate.cert_no, self.document
        )
    }
}

/// Generate the next certificate from the current BOQ and record it.
///
/// `cert_no` defaults to the suggested next number.
pub fn cert_generate(state: &mut AppState, cert_no: Option<&str>) -> Result<CertIssued> {
    let job_no = state.require_project()?;
    let project = state.storage.get_project(&job_no)?;
    let rates = state.config.rates();
    let date = Utc::now();

    let (index, certificate) = state.storage.update_site_data(&job_no, |site| {
        let cert_no = match cert_no {
            Some(no) => no.to_string(),
            None => certificate::suggest_next_cert_no(&site.payment_certificates),
        };
        let cert = certificate::issue(&cert_no, site, &rates, date)?;
        Ok((site.payment_certificates.len() - 1, cert))
    })?;
    tracing::info!(
        job_no = %job_no,
        cert_no = %certificate.cert_no,
        net_payable = certificate.net_payable,
        "issued payment certificate"
    );

    let document = PlainTextTemplate::new(state.currency()).render(&certificate, &project);
    Ok(CertIssued {
        job_no,
        index,
        certificate,
        document,
    })
}

#[derive(Debug, Serialize)]
pub struct CertList {
    pub job_no: String,
    pub certificates: Vec<CertificateHistoryRow>,
    pub count: usize,
    pub total_certified: f64,
    pub currency: String,
}

impl Output for CertList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut out = render::certificate_history_table(&self.certificates);
        if !self.certificates.is_empty() {
            out.push_str(&format!(
                "\n\nTotal certified (before VAT): {}",
                format_money(self.total_certified, &self.currency)
            ));
        }
        out
    }
}

/// List issued certificates, oldest first.
pub fn cert_list(state: &AppState) -> Result<CertList> {
    let job_no = state.require_project()?;
    let site = state.storage.get_site_data(&job_no)?;
    let certificates = render::certificate_history(&site, state.currency());

    Ok(CertList {
        job_no,
        count: certificates.len(),
        certificates,
        total_certified: certificate::previously_certified(&site.payment_certificates),
        currency: state.currency().to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct CertShow {
    pub job_no: String,
    pub index: usize,
    pub certificate: Certificate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip)]
    pub currency: String,
}

impl Output for CertShow {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if let Some(ref document) = self.document {
            return document.clone();
        }
        let c = &self.certificate;
        let money = |v: f64| format_money(v, &self.currency);
        [
            format!("#{} {} ({})", self.index, c.cert_no, c.date.format("%Y-%m-%d")),
            format!("  Work done: {} ({}%)", money(c.work_done_value), c.work_done_percentage),
            format!("  Total for invoice: {}", money(c.total_for_invoice)),
            format!("  VAT: {}", money(c.vat)),
            format!("  Net payable: {}", money(c.net_payable)),
        ]
        .join("\n")
    }
}

/// Show an issued certificate, optionally with its rendered document.
pub fn cert_show(state: &AppState, index: usize, document: bool) -> Result<CertShow> {
    let job_no = state.require_project()?;
    let site = state.storage.get_site_data(&job_no)?;
    let certificate = site
        .payment_certificates
        .get(index)
        .cloned()
        .ok_or_else(|| {
            Error::NotFound(format!(
                "Certificate #{} does not exist ({} issued)",
                index,
                site.payment_certificates.len()
            ))
        })?;

    let document = if document {
        let project = state.storage.get_project(&job_no)?;
        Some(PlainTextTemplate::new(state.currency()).render(&certificate, &project))
    } else {
        None
    };

    Ok(CertShow {
        job_no,
        index,
        certificate,
        document,
        currency: state.currency().to_string(),
    })
}
