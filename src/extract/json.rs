//! JSON tool extraction.
//!
//! Handles the response and manifest shapes the pipeline encounters in the
//! wild: a bare array of tool entries, an object wrapping the array under one
//! of several conventional keys, a `schema.functions` object-map, or a full
//! OpenAPI/Swagger document (delegated to the openapi extractor).

use serde_json::Value;
use tracing::debug;

use super::openapi;
use crate::detect::types::{Tool, ToolParameter};

/// Object keys that may hold the tool array.
const ARRAY_KEYS: [&str; 5] = ["tools", "functions", "resources", "endpoints", "commands"];

/// Description aliases, in priority order.
const DESCRIPTION_KEYS: [&str; 4] = ["description", "desc", "summary", "info"];

/// Extract tools from raw JSON text. Unparsable input yields zero tools.
#[must_use]
pub fn extract_from_json_str(content: &str) -> Vec<Tool> {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => extract_from_value(&value),
        Err(e) => {
            debug!("skipping unparsable JSON content: {e}");
            Vec::new()
        }
    }
}

/// Extract tools from an already-parsed JSON value.
///
/// Shape handling, in order:
/// 1. bare array of entries
/// 2. OpenAPI/Swagger document (`paths` object present)
/// 3. object with one of `tools`/`functions`/`resources`/`endpoints`/`commands`
/// 4. `schema.functions` object-map (name -> definition)
#[must_use]
pub fn extract_from_value(value: &Value) -> Vec<Tool> {
    if let Some(entries) = value.as_array() {
        return collect_entries(entries);
    }

    let Some(obj) = value.as_object() else {
        return Vec::new();
    };

    if obj.get("paths").is_some_and(Value::is_object) {
        return openapi::extract_from_openapi(value);
    }

    for key in ARRAY_KEYS {
        if let Some(entries) = obj.get(key).and_then(Value::as_array) {
            let tools = collect_entries(entries);
            if !tools.is_empty() {
                return tools;
            }
        }
    }

    if let Some(functions) = value
        .pointer("/schema/functions")
        .and_then(Value::as_object)
    {
        return functions
            .iter()
            .filter_map(|(name, def)| tool_from_named_entry(name, def))
            .collect();
    }

    Vec::new()
}

fn collect_entries(entries: &[Value]) -> Vec<Tool> {
    entries.iter().filter_map(tool_from_entry).collect()
}

/// Build a tool from one array entry. Entries without a non-empty name AND
/// a non-empty description are dropped silently.
fn tool_from_entry(entry: &Value) -> Option<Tool> {
    let obj = entry.as_object()?;
    let name = obj.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }
    let description = description_of(entry)?;
    Some(build_tool(name, &description, entry))
}

/// Build a tool from an object-map entry where the key is the tool name.
fn tool_from_named_entry(name: &str, def: &Value) -> Option<Tool> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let description = description_of(def)?;
    Some(build_tool(name, &description, def))
}

fn build_tool(name: &str, description: &str, entry: &Value) -> Tool {
    let mut tool = Tool::new(name, description);
    if let Some(method) = entry.get("method").and_then(Value::as_str) {
        tool.method = method.to_uppercase();
    }
    if let Some(endpoint) = entry
        .get("endpoint")
        .or_else(|| entry.get("path"))
        .and_then(Value::as_str)
    {
        tool.endpoint = endpoint.to_string();
    }
    tool.parameters = parse_parameters(entry.get("parameters"));
    tool
}

fn description_of(entry: &Value) -> Option<String> {
    DESCRIPTION_KEYS
        .iter()
        .filter_map(|key| entry.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|d| !d.is_empty())
        .map(ToString::to_string)
}

/// Parse the `parameters` field of a tool entry.
///
/// Accepts three shapes: an array of `{name, description, type, required}`
/// objects, a JSON-schema-like `{properties: {...}, required: [...]}` object,
/// or a plain object-map of name -> definition.
pub fn parse_parameters(value: Option<&Value>) -> Vec<ToolParameter> {
    let Some(value) = value else {
        return Vec::new();
    };

    if let Some(entries) = value.as_array() {
        return entries.iter().filter_map(param_from_entry).collect();
    }

    let Some(obj) = value.as_object() else {
        return Vec::new();
    };

    if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
        let required: Vec<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        return properties
            .iter()
            .map(|(name, def)| param_from_schema(name, def, required.contains(&name.as_str())))
            .collect();
    }

    // Plain object-map: name -> definition
    obj.iter()
        .map(|(name, def)| {
            let required = def.get("required").and_then(Value::as_bool).unwrap_or(true);
            param_from_schema(name, def, required)
        })
        .collect()
}

fn param_from_entry(entry: &Value) -> Option<ToolParameter> {
    let name = entry.get("name").and_then(Value::as_str)?.trim();
    if name.is_empty() {
        return None;
    }
    let mut param = ToolParameter::new(name);
    if let Some(description) = description_of(entry) {
        param.description = description;
    }
    if let Some(ty) = entry.get("type").and_then(Value::as_str) {
        param.param_type = ty.to_string();
    }
    param.required = entry
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    Some(param)
}

fn param_from_schema(name: &str, def: &Value, required: bool) -> ToolParameter {
    let mut param = ToolParameter::new(name);
    if let Some(description) = def.get("description").and_then(Value::as_str) {
        param.description = description.to_string();
    }
    if let Some(ty) = def.get("type").and_then(Value::as_str) {
        param.param_type = ty.to_string();
    }
    param.required = required;
    param
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_array_of_entries() {
        let tools = extract_from_value(&json!([
            {"name": "search", "description": "find docs"},
            {"name": "fetch", "desc": "get a page", "method": "get", "endpoint": "/fetch"}
        ]));
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "search");
        assert_eq!(tools[0].method, "POST");
        assert_eq!(tools[1].method, "GET");
        assert_eq!(tools[1].endpoint, "/fetch");
        assert_eq!(tools[1].description, "get a page");
    }

    #[test]
    fn wrapped_arrays_under_conventional_keys() {
        for key in ARRAY_KEYS {
            let doc = json!({ key: [{"name": "run", "description": "execute"}] });
            let tools = extract_from_value(&doc);
            assert_eq!(tools.len(), 1, "key {key} should yield one tool");
        }
    }

    #[test]
    fn schema_functions_object_map() {
        let tools = extract_from_value(&json!({
            "schema": {
                "functions": {
                    "lookup": {"description": "resolve a name"},
                    "nameless": {}
                }
            }
        }));
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "lookup");
    }

    #[test]
    fn entries_missing_name_or_description_are_dropped() {
        let tools = extract_from_value(&json!([
            {"name": "ok", "description": "kept"},
            {"name": "", "description": "empty name"},
            {"name": "no-desc"},
            {"description": "no name"},
            {"name": "blank-desc", "description": "   "}
        ]));
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "ok");
    }

    #[test]
    fn parameters_array_shape() {
        let tools = extract_from_value(&json!([{
            "name": "query",
            "description": "run a query",
            "parameters": [
                {"name": "q", "description": "the query", "type": "string"},
                {"name": "limit", "type": "number", "required": false}
            ]
        }]));
        let params = &tools[0].parameters;
        assert_eq!(params.len(), 2);
        assert!(params[0].required, "required defaults to true");
        assert!(!params[1].required);
        assert_eq!(params[1].param_type, "number");
    }

    #[test]
    fn parameters_schema_shape() {
        let tools = extract_from_value(&json!([{
            "name": "create",
            "description": "make a thing",
            "parameters": {
                "properties": {
                    "title": {"type": "string", "description": "display title"},
                    "draft": {"type": "boolean"}
                },
                "required": ["title"]
            }
        }]));
        let params = &tools[0].parameters;
        assert_eq!(params.len(), 2);
        let title = params.iter().find(|p| p.name == "title").unwrap();
        let draft = params.iter().find(|p| p.name == "draft").unwrap();
        assert!(title.required);
        assert!(!draft.required);
    }

    #[test]
    fn unparsable_json_yields_nothing() {
        assert!(extract_from_json_str("{not json").is_empty());
        assert!(extract_from_json_str("42").is_empty());
    }
}
