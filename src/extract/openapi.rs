//! OpenAPI/Swagger document extraction.
//!
//! Every `path x method` pair becomes one tool. Parameters are merged from
//! the operation's `parameters` array (query/path params) and from the
//! JSON-schema `properties` of the first `requestBody.content` entry.

use serde_json::Value;

use crate::detect::types::{Tool, ToolParameter};

const METHODS: [&str; 5] = ["get", "post", "put", "delete", "patch"];

/// Extract one tool per operation from an OpenAPI/Swagger document.
#[must_use]
pub fn extract_from_openapi(doc: &Value) -> Vec<Tool> {
    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut tools = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        for method in METHODS {
            if let Some(op) = item.get(method).filter(|op| op.is_object())
                && let Some(tool) = tool_from_operation(path, method, op)
            {
                tools.push(tool);
            }
        }
    }
    tools
}

fn tool_from_operation(path: &str, method: &str, op: &Value) -> Option<Tool> {
    let name = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("{}_{}", method.to_uppercase(), path.replace('/', "_")));

    let description = op
        .get("summary")
        .or_else(|| op.get("description"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())?;

    let mut tool = Tool::new(name, description);
    tool.method = method.to_uppercase();
    tool.endpoint = path.to_string();
    tool.parameters = operation_parameters(op);
    Some(tool)
}

fn operation_parameters(op: &Value) -> Vec<ToolParameter> {
    let mut params = Vec::new();

    // Query/path parameters declared on the operation
    if let Some(declared) = op.get("parameters").and_then(Value::as_array) {
        for entry in declared {
            let Some(name) = entry.get("name").and_then(Value::as_str) else {
                continue;
            };
            let mut param = ToolParameter::new(name);
            if let Some(description) = entry.get("description").and_then(Value::as_str) {
                param.description = description.to_string();
            }
            if let Some(ty) = entry
                .pointer("/schema/type")
                .or_else(|| entry.get("type"))
                .and_then(Value::as_str)
            {
                param.param_type = ty.to_string();
            }
            param.required = entry
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            params.push(param);
        }
    }

    // Body schema from the first requestBody content entry
    if let Some(content) = op.pointer("/requestBody/content").and_then(Value::as_object)
        && let Some((_, media)) = content.iter().next()
        && let Some(schema) = media.get("schema")
    {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, def) in properties {
                let mut param = ToolParameter::new(name);
                if let Some(description) = def.get("description").and_then(Value::as_str) {
                    param.description = description.to_string();
                }
                if let Some(ty) = def.get("type").and_then(Value::as_str) {
                    param.param_type = ty.to_string();
                }
                param.required = required.contains(&name.as_str());
                params.push(param);
            }
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_id_names_the_tool() {
        let doc = json!({
            "openapi": "3.0.0",
            "paths": {
                "/items/{id}": {
                    "get": {
                        "operationId": "getItem",
                        "summary": "Fetch a single item",
                        "parameters": [
                            {"name": "id", "in": "path", "required": true,
                             "schema": {"type": "string"}}
                        ]
                    }
                }
            }
        });
        let tools = extract_from_openapi(&doc);
        assert_eq!(tools.len(), 1);
        let tool = &tools[0];
        assert_eq!(tool.name, "getItem");
        assert_eq!(tool.method, "GET");
        assert_eq!(tool.endpoint, "/items/{id}");
        assert_eq!(tool.parameters.len(), 1);
        assert_eq!(tool.parameters[0].name, "id");
        assert!(tool.parameters[0].required);
    }

    #[test]
    fn missing_operation_id_falls_back_to_method_and_path() {
        let doc = json!({
            "paths": {
                "/users/list": {
                    "post": {"description": "List all users"}
                }
            }
        });
        let tools = extract_from_openapi(&doc);
        assert_eq!(tools[0].name, "POST__users_list");
    }

    #[test]
    fn request_body_properties_become_parameters() {
        let doc = json!({
            "paths": {
                "/notes": {
                    "post": {
                        "operationId": "createNote",
                        "summary": "Create a note",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "properties": {
                                            "body": {"type": "string", "description": "note text"},
                                            "pinned": {"type": "boolean"}
                                        },
                                        "required": ["body"]
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });
        let params = &extract_from_openapi(&doc)[0].parameters;
        assert_eq!(params.len(), 2);
        let body = params.iter().find(|p| p.name == "body").unwrap();
        let pinned = params.iter().find(|p| p.name == "pinned").unwrap();
        assert!(body.required);
        assert!(!pinned.required);
        assert_eq!(body.description, "note text");
    }

    #[test]
    fn operations_without_any_description_are_dropped() {
        let doc = json!({
            "paths": {
                "/bare": {"get": {"operationId": "bare"}}
            }
        });
        assert!(extract_from_openapi(&doc).is_empty());
    }
}
