//! Collector metadata: the record a plugin returns from `getMetadata`.
//!
//! Identity fields, the field-requirement record that drives host UI
//! prompts, polling defaults, and setup instructions. Wire field names are
//! camelCase.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `namespace.name`, both segments lowercase kebab-case. Identifiers with
/// no `.` denote built-in native collectors and are exempt.
static PLUGIN_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*\.[a-z][a-z0-9]*(-[a-z0-9]+)*$").unwrap()
});

/// Whether a `collectorName` denotes a plugin (as opposed to a native
/// built-in collector).
pub fn is_plugin_collector(name: &str) -> bool {
    name.contains('.')
}

/// Whether a plugin `collectorName` satisfies the naming rule.
pub fn is_valid_plugin_name(name: &str) -> bool {
    PLUGIN_NAME_RE.is_match(name)
}

/// Metadata describing one collector, as returned by `getMetadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorMetadata {
    /// Collector identity: `namespace.name` for plugins, a bare name for
    /// native built-ins.
    pub collector_name: String,
    /// Human-readable name shown in the host UI.
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub emoji: String,
    /// Which connection fields the host UI should prompt for.
    #[serde(default)]
    pub field_requirements: FieldRequirements,
    /// Default connection settings and polling cadence.
    #[serde(default)]
    pub defaults: CollectorDefaults,
    /// Ordered setup walkthrough shown before first use.
    #[serde(default)]
    pub setup_instructions: Vec<SetupStep>,
    /// Whether the collector keeps a session open between polls
    /// (`startSession` / `stopSession`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_persistent_session: Option<bool>,
    /// External service the collector depends on, when one is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_service_type: Option<String>,
}

/// Declares which fields the host UI should prompt for, with optional
/// labels, placeholders, and validation patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRequirements {
    #[serde(default)]
    pub needs_url: bool,
    #[serde(default)]
    pub needs_access_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_placeholder: Option<String>,
    /// Regex the host UI applies to the URL field before accepting it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_validation_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_placeholder: Option<String>,
}

/// Default settings applied when the user has not configured the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorDefaults {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// How often the host polls `fetchSensors`, in milliseconds.
    #[serde(default = "default_poll_rate_ms")]
    pub poll_rate_ms: u64,
    /// How often results are forwarded downstream, in milliseconds.
    #[serde(default = "default_send_rate_ms")]
    pub send_rate_ms: u64,
}

fn default_poll_rate_ms() -> u64 {
    10_000
}

fn default_send_rate_ms() -> u64 {
    5_000
}

impl Default for CollectorDefaults {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            poll_rate_ms: default_poll_rate_ms(),
            send_rate_ms: default_send_rate_ms(),
        }
    }
}

/// One step of the setup walkthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStep {
    pub title: String,
    pub body: String,
}
