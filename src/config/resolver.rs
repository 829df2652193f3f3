//! Precedence resolution for preferences.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Session config.kdl (`~/.local/share/boqtrack/<workspace-hash>/config.kdl`)
//! 3. System config.kdl (`~/.config/boqtrack/config.kdl`)
//! 4. Built-in defaults

use crate::Result;
use crate::certificate::{
    CertificateRates, DEFAULT_ADVANCE_RATE, DEFAULT_RETENTION_RATE, DEFAULT_VAT_RATE,
};
use crate::config::schema::DEFAULT_CURRENCY;
use crate::config::{BoqConfig, OutputFormat};
use crate::storage::Storage;
use serde::Serialize;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from session-level config
    Session,
    /// Value from system-level config
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Session => write!(f, "session"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub output_format: Resolved<OutputFormat>,
    pub currency: Resolved<String>,
    pub retention_rate: Resolved<f64>,
    pub advance_rate: Resolved<f64>,
    pub vat_rate: Resolved<f64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            currency: Resolved::new(DEFAULT_CURRENCY.to_string(), ValueSource::Default),
            retention_rate: Resolved::new(DEFAULT_RETENTION_RATE, ValueSource::Default),
            advance_rate: Resolved::new(DEFAULT_ADVANCE_RATE, ValueSource::Default),
            vat_rate: Resolved::new(DEFAULT_VAT_RATE, ValueSource::Default),
        }
    }
}

impl ResolvedConfig {
    /// Get the output format value.
    pub fn output_format(&self) -> &OutputFormat {
        &self.output_format.value
    }

    /// Get the currency label.
    pub fn currency(&self) -> &str {
        &self.currency.value
    }

    /// Rates used for certificate generation.
    pub fn rates(&self) -> CertificateRates {
        CertificateRates {
            retention: self.retention_rate.value,
            advance: self.advance_rate.value,
            vat: self.vat_rate.value,
        }
    }

    /// Resolved value and source for a preference key, as display strings.
    pub fn lookup(&self, key: &str) -> Option<(String, &ValueSource)> {
        match key {
            "output-format" => Some((
                self.output_format.value.to_string(),
                &self.output_format.source,
            )),
            "currency" => Some((self.currency.value.clone(), &self.currency.source)),
            "retention-rate" => Some((
                self.retention_rate.value.to_string(),
                &self.retention_rate.source,
            )),
            "advance-rate" => Some((
                self.advance_rate.value.to_string(),
                &self.advance_rate.source,
            )),
            "vat-rate" => Some((self.vat_rate.value.to_string(), &self.vat_rate.source)),
            _ => None,
        }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Output format override from CLI flag
    pub output_format: Option<OutputFormat>,
    /// Currency override
    pub currency: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output format override.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Set currency override.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

fn pick<T: Clone>(
    cli: Option<&T>,
    session: Option<&T>,
    system: Option<&T>,
    default: Resolved<T>,
) -> Resolved<T> {
    if let Some(v) = cli {
        Resolved::new(v.clone(), ValueSource::CliFlag)
    } else if let Some(v) = session {
        Resolved::new(v.clone(), ValueSource::Session)
    } else if let Some(v) = system {
        Resolved::new(v.clone(), ValueSource::System)
    } else {
        default
    }
}

/// Resolve configuration with full precedence chain.
pub fn resolve_config(storage: &Storage, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let system = Storage::read_system_boq_config()?;
    let session = storage.read_boq_config()?;
    Ok(resolve_from(&system, &session, overrides))
}

/// Resolve from already-loaded config layers.
pub fn resolve_from(
    system: &BoqConfig,
    session: &BoqConfig,
    overrides: &ConfigOverrides,
) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();
    ResolvedConfig {
        output_format: pick(
            overrides.output_format.as_ref(),
            session.output_format.as_ref(),
            system.output_format.as_ref(),
            defaults.output_format,
        ),
        currency: pick(
            overrides.currency.as_ref(),
            session.currency.as_ref(),
            system.currency.as_ref(),
            defaults.currency,
        ),
        retention_rate: pick(
            None,
            session.retention_rate.as_ref(),
            system.retention_rate.as_ref(),
            defaults.retention_rate,
        ),
        advance_rate: pick(
            None,
            session.advance_rate.as_ref(),
            system.advance_rate.as_ref(),
            defaults.advance_rate,
        ),
        vat_rate: pick(
            None,
            session.vat_rate.as_ref(),
            system.vat_rate.as_ref(),
            defaults.vat_rate,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CONFIG_DIR_ENV;
    use crate::test_utils::TestEnv;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_value_source_display() {
        assert_eq!(format!("{}", ValueSource::Session), "session");
        assert_eq!(format!("{}", ValueSource::System), "system");
        assert_eq!(format!("{}", ValueSource::CliFlag), "cli");
        assert_eq!(format!("{}", ValueSource::Default), "default");
    }

    #[test]
    fn test_resolve_from_defaults() {
        let config = resolve_from(
            &BoqConfig::default(),
            &BoqConfig::default(),
            &ConfigOverrides::default(),
        );
        assert_eq!(*config.output_format(), OutputFormat::Json);
        assert_eq!(config.currency(), "AED");
        assert_eq!(config.rates(), CertificateRates::default());
        assert_eq!(config.vat_rate.source, ValueSource::Default);
    }

    #[test]
    fn test_resolve_from_precedence() {
        let system = BoqConfig {
            currency: Some("USD".to_string()),
            vat_rate: Some(0.15),
            retention_rate: Some(0.05),
            ..Default::default()
        };
        let session = BoqConfig {
            currency: Some("SAR".to_string()),
            retention_rate: Some(0.0),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new().with_currency("EUR");

        let config = resolve_from(&system, &session, &overrides);

        assert_eq!(config.currency(), "EUR");
        assert_eq!(config.currency.source, ValueSource::CliFlag);
        assert_eq!(config.retention_rate.value, 0.0);
        assert_eq!(config.retention_rate.source, ValueSource::Session);
        assert_eq!(config.vat_rate.value, 0.15);
        assert_eq!(config.vat_rate.source, ValueSource::System);
        assert_eq!(config.advance_rate.source, ValueSource::Default);
    }

    #[test]
    fn test_lookup() {
        let config = ResolvedConfig::default();
        let (value, source) = config.lookup("vat-rate").unwrap();
        assert_eq!(value, "0.05");
        assert_eq!(*source, ValueSource::Default);
        assert!(config.lookup("editor").is_none());
    }

    #[test]
    #[serial]
    fn test_resolve_config_session_overrides_system() {
        let env = TestEnv::new();
        let storage = env.init_storage();

        let system_config_dir = TempDir::new().unwrap();
        // SAFETY: serialized test; no other thread reads the env concurrently
        unsafe { std::env::set_var(CONFIG_DIR_ENV, system_config_dir.path()) };

        Storage::write_system_boq_config(&BoqConfig {
            currency: Some("USD".to_string()),
            advance_rate: Some(0.2),
            ..Default::default()
        })
        .unwrap();
        storage
            .write_boq_config(&BoqConfig {
                currency: Some("AED".to_string()),
                ..Default::default()
            })
            .unwrap();

        let config = resolve_config(&storage, &ConfigOverrides::default()).unwrap();

        unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

        assert_eq!(config.currency(), "AED");
        assert_eq!(config.currency.source, ValueSource::Session);
        assert_eq!(config.rates().advance, 0.2);
        assert_eq!(config.advance_rate.source, ValueSource::System);
    }

    #[test]
    #[serial]
    fn test_resolve_config_cli_overrides_session() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let system_config_dir = TempDir::new().unwrap();
        unsafe { std::env::set_var(CONFIG_DIR_ENV, system_config_dir.path()) };

        storage
            .write_boq_config(&BoqConfig {
                output_format: Some(OutputFormat::Json),
                ..Default::default()
            })
            .unwrap();

        let overrides = ConfigOverrides::new().with_output_format(OutputFormat::Human);
        let config = resolve_config(&storage, &overrides).unwrap();

        unsafe { std::env::remove_var(CONFIG_DIR_ENV) };

        assert_eq!(*config.output_format(), OutputFormat::Human);
        assert_eq!(config.output_format.source, ValueSource::CliFlag);
    }
}
