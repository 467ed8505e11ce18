//! Analysis report payload.
//!
//! Every field is optional: the backend fills the report in stages and older
//! tasks may lack sections entirely.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::id::Fingerprint;

/// Report attached to a completed task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Fingerprint>,
    /// Binary metadata as produced by the disassembler (architecture, bits,
    /// signing, sizes). Kept as raw JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// A section that is not a JSON object is dropped rather than rejected.
    #[serde(
        default,
        deserialize_with = "object_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub malware_report: Option<MalwareReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_analyses: Option<serde_json::Value>,
}

impl Report {
    /// Returns the risk classification, if the narrative section is present.
    #[must_use]
    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.malware_report.as_ref().map(|m| m.risk_level)
    }
}

/// Narrative verdict section of a report.
///
/// The section is free-form model output, so each field accepts `null`,
/// a missing key, or a value of an unexpected shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct MalwareReport {
    #[serde(default, deserialize_with = "lenient_risk_level")]
    pub risk_level: RiskLevel,
    #[serde(default, deserialize_with = "lenient_text")]
    pub threat_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub malware_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub attack_chain: Option<String>,
    /// Markdown explanation of the verdict.
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub indicators: Vec<Indicator>,
    #[serde(default, deserialize_with = "lenient_techniques")]
    pub techniques: Vec<Technique>,
}

/// An indicator of compromise: a bare string or a structured entry such as
/// `{"type": "ip", "value": "10.0.0.7"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Indicator {
    Text(String),
    Detail(serde_json::Value),
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Detail(v) => write!(f, "{v}"),
        }
    }
}

/// An attack technique referenced by the report, e.g. a MITRE ATT&CK entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Technique {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
}

/// Risk classification of an analysed artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RiskLevel {
    /// `High` and `Critical` are considered malicious verdicts.
    #[must_use]
    pub const fn is_malicious(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Case-insensitive label lookup; anything unrecognised is `Unknown`.
    fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "safe" => Self::Safe,
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Safe => "safe",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn lenient_risk_level<'de, D>(deserializer: D) -> Result<RiskLevel, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(label)) => RiskLevel::from_label(&label),
        _ => RiskLevel::Unknown,
    })
}

/// Strings pass through; other non-null values keep their JSON text.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Objects become techniques, bare strings become a named technique, and
/// anything else is skipped.
fn lenient_techniques<'de, D>(deserializer: D) -> Result<Vec<Technique>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<Value> = null_as_default(deserializer)?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(name) => Some(Technique {
                name: Some(name),
                ..Technique::default()
            }),
            obj @ Value::Object(_) => serde_json::from_value(obj).ok(),
            _ => None,
        })
        .collect())
}

fn object_or_none<'de, D>(deserializer: D) -> Result<Option<MalwareReport>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(obj @ Value::Object(_)) => serde_json::from_value(obj).ok(),
        _ => None,
    })
}
