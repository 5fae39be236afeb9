//! YAML tool extraction.
//!
//! YAML manifests (including `openapi.yaml`/`swagger.yaml`) are parsed with a
//! real YAML parser and deserialized into `serde_json::Value`, so the JSON
//! shape rules apply unchanged.

use tracing::debug;

use super::json;
use crate::detect::types::Tool;

/// Extract tools from raw YAML text. Unparsable input yields zero tools.
#[must_use]
pub fn extract_from_yaml_str(content: &str) -> Vec<Tool> {
    match serde_yaml::from_str::<serde_json::Value>(content) {
        Ok(value) => json::extract_from_value(&value),
        Err(e) => {
            debug!("skipping unparsable YAML content: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_tool_list() {
        let content = r"
tools:
  - name: ping
    description: check liveness
  - name: echo
    description: repeat input
    method: get
";
        let tools = extract_from_yaml_str(content);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "ping");
        assert_eq!(tools[1].method, "GET");
    }

    #[test]
    fn yaml_openapi_document() {
        let content = r#"
openapi: "3.0.0"
paths:
  /health:
    get:
      operationId: health
      summary: health probe
"#;
        let tools = extract_from_yaml_str(content);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "health");
    }

    #[test]
    fn invalid_yaml_yields_nothing() {
        assert!(extract_from_yaml_str(": : :").is_empty());
        assert!(extract_from_yaml_str("just a scalar").is_empty());
    }
}
