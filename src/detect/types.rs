//! Core types for tool detection operations.
//!
//! This module contains the fundamental types used throughout the detection
//! pipeline: discovered tools, their parameters, the tier tag recording where
//! a tool came from, and the per-server result reported back to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which detection tier produced a tool.
///
/// Tiers are tried strictly in this order; the first tier returning at least
/// one valid tool wins and later tiers are never consulted for that server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Live `<base>/list_resources` endpoint responded with tools
    StandardMcpApi,
    /// One of the fixed alternative endpoint paths responded with tools
    AlternativeApi,
    /// Tools were statically extracted from the server's GitHub repository
    GithubRepository,
}

impl DetectionSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StandardMcpApi => "standard_mcp_api",
            Self::AlternativeApi => "alternative_api",
            Self::GithubRepository => "github_repository",
        }
    }
}

impl fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parameter of a discovered tool.
///
/// Owned exclusively by its [`Tool`]; deleting a tool cascades to its
/// parameters in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Free-text type tag (string/number/array/...)
    #[serde(default = "default_param_type", rename = "type")]
    pub param_type: String,
    /// Defaults to true when the source is ambiguous
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_param_type() -> String {
    "string".to_string()
}

const fn default_true() -> bool {
    true
}

impl ToolParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            param_type: default_param_type(),
            required: true,
        }
    }
}

/// A discovered capability of a cataloged server.
///
/// `name` is the dedup key within a server: when the same name shows up in
/// multiple files or endpoints, the first occurrence wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// HTTP verb, defaults depend on the source (POST for API shapes)
    #[serde(default = "default_method")]
    pub method: String,
    /// Path the tool is reachable at; may be empty for statically detected tools
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    /// Set by the tier that produced this tool, never by extractors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_source: Option<DetectionSource>,
}

fn default_method() -> String {
    "POST".to_string()
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            method: default_method(),
            endpoint: String::new(),
            parameters: Vec::new(),
            detection_source: None,
        }
    }
}

/// Tag every tool in a list with the tier that produced it.
pub fn tag_tools(tools: &mut [Tool], source: DetectionSource) {
    for tool in tools {
        tool.detection_source = Some(source);
    }
}

/// Outcome status of one server's detection attempt.
///
/// Zero tools found is `Success`: an empty result set is a valid outcome,
/// not an error. `Error` is reserved for hard failures (repository tier
/// blowing up, store writes failing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Success,
    Error,
}

/// Per-server result collected by the batch controller and returned to
/// HTTP/CLI callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub server_id: String,
    pub name: String,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_detected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the detector found for one server, before persistence.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub tools: Vec<Tool>,
    pub source: Option<DetectionSource>,
    pub duration: Duration,
    /// Set only on hard failures (e.g. the repository tier erroring out)
    pub error: Option<String>,
}

impl DetectionOutcome {
    #[must_use]
    pub fn empty(duration: Duration) -> Self {
        Self {
            tools: Vec::new(),
            source: None,
            duration,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(duration: Duration, message: String) -> Self {
        Self {
            tools: Vec::new(),
            source: None,
            duration,
            error: Some(message),
        }
    }

    /// Log-row source tag: the winning tier, or "failed"/"error"
    #[must_use]
    pub fn source_tag(&self) -> &'static str {
        if self.error.is_some() {
            "error"
        } else {
            self.source.map_or("failed", |s| s.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_source_round_trips_through_serde() {
        let json = serde_json::to_string(&DetectionSource::StandardMcpApi).unwrap();
        assert_eq!(json, "\"standard_mcp_api\"");
        let back: DetectionSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DetectionSource::StandardMcpApi);
    }

    #[test]
    fn tag_tools_sets_source_on_every_tool() {
        let mut tools = vec![Tool::new("a", "first"), Tool::new("b", "second")];
        tag_tools(&mut tools, DetectionSource::AlternativeApi);
        assert!(
            tools
                .iter()
                .all(|t| t.detection_source == Some(DetectionSource::AlternativeApi))
        );
    }

    #[test]
    fn outcome_source_tag_prefers_error() {
        let mut outcome = DetectionOutcome::empty(Duration::from_millis(5));
        assert_eq!(outcome.source_tag(), "failed");
        outcome.source = Some(DetectionSource::GithubRepository);
        assert_eq!(outcome.source_tag(), "github_repository");
        outcome.error = Some("boom".to_string());
        assert_eq!(outcome.source_tag(), "error");
    }
}
