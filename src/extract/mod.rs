//! Tool Extractors
//!
//! Pure, side-effect-free functions mapping raw file or response content to
//! normalized [`Tool`] records. Each format has its own extractor; this
//! module routes repository files by extension and provides the shared
//! name-dedup pass used when merging tools across files.

pub mod json;
pub mod markdown;
pub mod openapi;
pub mod source;
pub mod yaml;

pub use json::{extract_from_json_str, extract_from_value};
pub use markdown::extract_from_markdown;
pub use openapi::extract_from_openapi;
pub use source::extract_from_source;
pub use yaml::extract_from_yaml_str;

use std::collections::HashSet;

use crate::detect::types::Tool;

/// Extract tools from a repository file, routed by its extension.
///
/// Unknown extensions get the JSON extractor first, then the best-effort
/// source scanner.
#[must_use]
pub fn extract_from_file(path: &str, content: &str) -> Vec<Tool> {
    match extension_of(path) {
        "json" => extract_from_json_str(content),
        "yaml" | "yml" => extract_from_yaml_str(content),
        "js" | "ts" | "jsx" | "tsx" | "mjs" | "cjs" => extract_from_source(content),
        "md" | "markdown" => extract_from_markdown(content),
        _ => {
            let tools = extract_from_json_str(content);
            if tools.is_empty() {
                extract_from_source(content)
            } else {
                tools
            }
        }
    }
}

/// Drop tools whose name was already seen; the first occurrence wins.
#[must_use]
pub fn dedup_by_name(tools: Vec<Tool>) -> Vec<Tool> {
    let mut seen = HashSet::new();
    tools
        .into_iter()
        .filter(|tool| seen.insert(tool.name.clone()))
        .collect()
}

fn extension_of(path: &str) -> &str {
    path.rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map_or("", |(_, ext)| ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_extension() {
        let json_tools =
            extract_from_file("tools.json", r#"[{"name":"a","description":"alpha"}]"#);
        assert_eq!(json_tools.len(), 1);

        let yaml_tools =
            extract_from_file("dir/openapi.yml", "tools:\n  - name: b\n    description: beta\n");
        assert_eq!(yaml_tools.len(), 1);

        let ts_tools = extract_from_file("src/index.ts", "defineTool('c', 'gamma');");
        assert_eq!(ts_tools.len(), 1);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let tools = dedup_by_name(vec![
            Tool::new("a", "first"),
            Tool::new("b", "other"),
            Tool::new("a", "second"),
        ]);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].description, "first");
    }

    #[test]
    fn unknown_extension_tries_json_then_source() {
        let tools = extract_from_file("server.txt", "registerTool('x', 'from source');");
        assert_eq!(tools.len(), 1);
    }
}
