//! Best-effort JS/TS source scanning.
//!
//! Regex extraction of tool-shaped object literals and registration calls
//! from JavaScript/TypeScript source. This is the lowest-confidence,
//! last-resort extractor: it cannot handle arbitrary expression contexts and
//! may miss tools or pick up false positives. Its failure mode is always
//! "zero tools", never an error.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::detect::types::Tool;

lazy_static! {
    /// `{ name: 'x', description: 'y', ... }` object literals, including the
    /// argument of `functions.push({...})`. Keys may be bare or quoted.
    static ref OBJECT_LITERAL: Regex = Regex::new(
        r#"(?s)\{\s*['"]?name['"]?\s*:\s*['"`]([^'"`]+)['"`]\s*,\s*['"]?description['"]?\s*:\s*['"`]([^'"`]+)['"`]"#
    ).expect("object literal pattern is valid");

    /// `defineTool('name', 'description', ...)` / `registerTool(...)` calls.
    static ref REGISTER_CALL: Regex = Regex::new(
        r#"(?:defineTool|registerTool)\s*\(\s*['"`]([^'"`]+)['"`]\s*,\s*['"`]([^'"`]+)['"`]"#
    ).expect("register call pattern is valid");
}

/// Extract tools from JavaScript/TypeScript source text.
#[must_use]
pub fn extract_from_source(content: &str) -> Vec<Tool> {
    let mut seen = HashSet::new();
    let mut tools = Vec::new();

    for captures in OBJECT_LITERAL
        .captures_iter(content)
        .chain(REGISTER_CALL.captures_iter(content))
    {
        let name = captures[1].trim();
        let description = captures[2].trim();
        if name.is_empty() || description.is_empty() {
            continue;
        }
        if seen.insert(name.to_string()) {
            tools.push(Tool::new(name, description));
        }
    }

    tools
}
