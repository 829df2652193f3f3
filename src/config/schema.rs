//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The [`BoqConfig`] struct mirroring the KDL document
//! - Conversion to and from [`KdlDocument`]
//! - Validation and merging

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Currency label used when none is configured.
pub const DEFAULT_CURRENCY: &str = "AED";

/// Preference keys understood in config.kdl.
pub const PREFERENCE_KEYS: [&str; 5] = [
    "output-format",
    "currency",
    "retention-rate",
    "advance-rate",
    "vat-rate",
];

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// output-format "human"  // or "json"
/// currency "AED"
/// retention-rate 0.1
/// advance-rate 0.1
/// vat-rate 0.05
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoqConfig {
    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// Currency label printed next to amounts
    pub currency: Option<String>,

    /// Share of work done withheld as retention (0-1)
    pub retention_rate: Option<f64>,

    /// Share of work done deducted for advance recovery (0-1)
    pub advance_rate: Option<f64>,

    /// VAT rate applied to a positive invoice total (0-1)
    pub vat_rate: Option<f64>,
}

impl BoqConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref currency) = self.currency {
            if currency.trim().is_empty() {
                return Err("currency must not be empty".to_string());
            }
        }
        for (key, rate) in [
            ("retention-rate", self.retention_rate),
            ("advance-rate", self.advance_rate),
            ("vat-rate", self.vat_rate),
        ] {
            if let Some(rate) = rate {
                if !(0.0..=1.0).contains(&rate) {
                    return Err(format!("{} must be between 0 and 1, got {}", key, rate));
                }
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes and values of the wrong type are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(s) = first_string(doc, "output-format") {
            config.output_format = OutputFormat::parse(s);
        }
        if let Some(s) = first_string(doc, "currency") {
            config.currency = Some(s.to_string());
        }
        config.retention_rate = first_rate(doc, "retention-rate");
        config.advance_rate = first_rate(doc, "advance-rate");
        config.vat_rate = first_rate(doc, "vat-rate");

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref format) = self.output_format {
            push_node(
                &mut doc,
                "output-format",
                KdlValue::String(format.as_str().to_string()),
            );
        }
        if let Some(ref currency) = self.currency {
            push_node(&mut doc, "currency", KdlValue::String(currency.clone()));
        }
        if let Some(rate) = self.retention_rate {
            push_node(&mut doc, "retention-rate", KdlValue::Float(rate));
        }
        if let Some(rate) = self.advance_rate {
            push_node(&mut doc, "advance-rate", KdlValue::Float(rate));
        }
        if let Some(rate) = self.vat_rate {
            push_node(&mut doc, "vat-rate", KdlValue::Float(rate));
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &BoqConfig) {
        if other.output_format.is_some() {
            self.output_format = other.output_format.clone();
        }
        if other.currency.is_some() {
            self.currency = other.currency.clone();
        }
        if other.retention_rate.is_some() {
            self.retention_rate = other.retention_rate;
        }
        if other.advance_rate.is_some() {
            self.advance_rate = other.advance_rate;
        }
        if other.vat_rate.is_some() {
            self.vat_rate = other.vat_rate;
        }
    }

    /// Set a preference by its KDL key from a string value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "output-format" => {
                let format = OutputFormat::parse(value).ok_or_else(|| {
                    format!("output-format must be 'json' or 'human', got '{}'", value)
                })?;
                self.output_format = Some(format);
            }
            "currency" => self.currency = Some(value.trim().to_string()),
            "retention-rate" => self.retention_rate = Some(parse_rate(key, value)?),
            "advance-rate" => self.advance_rate = Some(parse_rate(key, value)?),
            "vat-rate" => self.vat_rate = Some(parse_rate(key, value)?),
            _ => return Err(format!("Unknown preference key: {}", key)),
        }
        self.validate()
    }

    /// Get a preference by its KDL key as a display string.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "output-format" => self.output_format.as_ref().map(|f| f.to_string()),
            "currency" => self.currency.clone(),
            "retention-rate" => self.retention_rate.map(|r| r.to_string()),
            "advance-rate" => self.advance_rate.map(|r| r.to_string()),
            "vat-rate" => self.vat_rate.map(|r| r.to_string()),
            _ => None,
        }
    }
}

/// Whether `key` names a config.kdl preference.
pub fn is_preference_key(key: &str) -> bool {
    PREFERENCE_KEYS.contains(&key)
}

fn parse_rate(key: &str, value: &str) -> Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("{} must be a number, got '{}'", key, value))
}

fn first_string<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a str> {
    doc.get(name)?.entries().first()?.value().as_string()
}

// Rates may be written as `0.1` or as a whole number like `0`.
fn first_rate(doc: &KdlDocument, name: &str) -> Option<f64> {
    let value = doc.get(name)?.entries().first()?.value();
    let rate = value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))?;
    (0.0..=1.0).contains(&rate).then_some(rate)
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("HUMAN"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }

    #[test]
    fn test_config_from_kdl_empty() {
        let doc = KdlDocument::new();
        assert_eq!(BoqConfig::from_kdl(&doc), BoqConfig::default());
    }

    #[test]
    fn test_config_from_kdl_full() {
        let kdl = r#"
            output-format "human"
            currency "USD"
            retention-rate 0.05
            advance-rate 0
            vat-rate 0.15
        "#;
        let doc: KdlDocument = kdl.parse().unwrap();
        let config = BoqConfig::from_kdl(&doc);

        assert_eq!(config.output_format, Some(OutputFormat::Human));
        assert_eq!(config.currency.as_deref(), Some("USD"));
        assert_eq!(config.retention_rate, Some(0.05));
        assert_eq!(config.advance_rate, Some(0.0));
        assert_eq!(config.vat_rate, Some(0.15));
    }

    #[test]
    fn test_config_from_kdl_ignores_out_of_range_rate() {
        let doc: KdlDocument = "vat-rate 5\nretention-rate \"ten\"".parse().unwrap();
        let config = BoqConfig::from_kdl(&doc);
        assert_eq!(config.vat_rate, None);
        assert_eq!(config.retention_rate, None);
    }

    #[test]
    fn test_config_to_kdl_roundtrip() {
        let config = BoqConfig {
            output_format: Some(OutputFormat::Json),
            currency: Some("SAR".to_string()),
            retention_rate: Some(0.1),
            advance_rate: Some(0.2),
            vat_rate: Some(0.05),
        };
        let text = config.to_kdl().to_string();
        let doc: KdlDocument = text.parse().unwrap();
        assert_eq!(BoqConfig::from_kdl(&doc), config);
    }

    #[test]
    fn test_config_validate() {
        assert!(BoqConfig::default().validate().is_ok());

        let bad_rate = BoqConfig {
            vat_rate: Some(1.5),
            ..Default::default()
        };
        assert!(bad_rate.validate().unwrap_err().contains("vat-rate"));

        let blank_currency = BoqConfig {
            currency: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank_currency.validate().is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut base = BoqConfig {
            currency: Some("AED".to_string()),
            vat_rate: Some(0.05),
            ..Default::default()
        };
        let other = BoqConfig {
            vat_rate: Some(0.15),
            output_format: Some(OutputFormat::Human),
            ..Default::default()
        };
        base.merge(&other);

        assert_eq!(base.currency.as_deref(), Some("AED"));
        assert_eq!(base.vat_rate, Some(0.15));
        assert_eq!(base.output_format, Some(OutputFormat::Human));
    }

    #[test]
    fn test_config_set_and_get() {
        let mut config = BoqConfig::new();
        config.set("currency", " USD ").unwrap();
        config.set("retention-rate", "0.05").unwrap();
        config.set("output-format", "human").unwrap();

        assert_eq!(config.get("currency").as_deref(), Some("USD"));
        assert_eq!(config.get("retention-rate").as_deref(), Some("0.05"));
        assert_eq!(config.get("output-format").as_deref(), Some("human"));
        assert_eq!(config.get("vat-rate"), None);
    }

    #[test]
    fn test_config_set_rejects_bad_values() {
        let mut config = BoqConfig::new();
        assert!(config.set("vat-rate", "abc").is_err());
        assert!(config.set("vat-rate", "2").is_err());
        assert!(config.set("output-format", "xml").is_err());
        assert!(config.set("editor", "vim").is_err());
    }

    #[test]
    fn test_preference_keys() {
        let mut config = BoqConfig::new();
        assert_eq!(config.get("currency"), None);
        config.set("vat-rate", "0.15").unwrap();
        assert_eq!(config.get("vat-rate").as_deref(), Some("0.15"));
        assert!(is_preference_key("advance-rate"));
        assert!(!is_preference_key("current_project"));
    }
}
