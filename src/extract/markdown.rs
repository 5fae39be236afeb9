//! Markdown tool extraction.
//!
//! Scans fenced ```json and ```javascript/```typescript code blocks and
//! recursively applies the JSON/source extractors to each block's content.

use lazy_static::lazy_static;
use regex::Regex;

use super::{json, source};
use crate::detect::types::Tool;

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(json|javascript|js|typescript|ts)[^\n]*\n(.*?)```")
            .expect("fenced block pattern is valid");
}

/// Extract tools from fenced code blocks in a Markdown document.
#[must_use]
pub fn extract_from_markdown(content: &str) -> Vec<Tool> {
    let mut tools = Vec::new();
    for captures in FENCED_BLOCK.captures_iter(content) {
        let lang = &captures[1];
        let block = &captures[2];
        match lang {
            "json" => tools.extend(json::extract_from_json_str(block)),
            _ => tools.extend(source::extract_from_source(block)),
        }
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_blocks_are_extracted() {
        let md = r#"
# Tools

```json
[{"name": "run", "description": "execute"}]
```
"#;
        let tools = extract_from_markdown(md);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "run");
    }

    #[test]
    fn javascript_blocks_use_the_source_extractor() {
        let md = "
Example usage:

```typescript
defineTool('lint', 'check style');
```
";
        let tools = extract_from_markdown(md);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "lint");
    }

    #[test]
    fn other_languages_and_prose_are_ignored() {
        let md = "
```python
def tool(): pass
```

Inline { name: 'x', description: 'y' } outside a fence.
";
        assert!(extract_from_markdown(md).is_empty());
    }
}
