//! Render a Notion block tree as Markdown.
//!
//! Blocks are the raw JSON objects returned by `GET /blocks/{id}/children`.
//! The Notion client attaches fetched children under a `children` key so
//! the whole tree can be rendered without further requests.

use serde_json::Value;

pub const UNTITLED: &str = "Untitled";

fn item_text(item: &Value) -> &str {
    item.get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| {
            item.get("text")
                .and_then(|text| text.get("content"))
                .and_then(Value::as_str)
        })
        .unwrap_or_default()
}

pub fn plain_text_from_rich_text(value: &Value) -> String {
    value
        .as_array()
        .map(|items| items.iter().map(item_text).collect::<Vec<_>>().join(""))
        .unwrap_or_default()
}

/// Rich text with its annotations rendered inline.
pub fn rich_text_to_markdown(value: &Value) -> String {
    let Some(items) = value.as_array() else {
        return String::new();
    };

    let mut out = String::new();
    for item in items {
        let text = item_text(item).to_string();
        if text.is_empty() {
            continue;
        }
        let annotations = item.get("annotations");
        let flag = |name: &str| {
            annotations
                .and_then(|value| value.get(name))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };

        let mut rendered = if flag("code") { format!("`{text}`") } else { text };
        if flag("bold") {
            rendered = format!("**{rendered}**");
        }
        if flag("italic") {
            rendered = format!("_{rendered}_");
        }
        if flag("strikethrough") {
            rendered = format!("~~{rendered}~~");
        }
        let href = item
            .get("href")
            .and_then(Value::as_str)
            .or_else(|| {
                item.get("text")
                    .and_then(|text| text.get("link"))
                    .and_then(|link| link.get("url"))
                    .and_then(Value::as_str)
            });
        if let Some(url) = href {
            rendered = format!("[{rendered}]({url})");
        }
        out.push_str(&rendered);
    }
    out
}

fn block_type(block: &Value) -> &str {
    block.get("type").and_then(Value::as_str).unwrap_or_default()
}

fn block_body<'a>(block: &'a Value) -> &'a Value {
    block.get(block_type(block)).unwrap_or(&Value::Null)
}

fn block_rich_text(block: &Value) -> String {
    block_body(block)
        .get("rich_text")
        .map(rich_text_to_markdown)
        .unwrap_or_default()
}

fn file_url(body: &Value) -> Option<&str> {
    body.get("file")
        .or_else(|| body.get("external"))
        .and_then(|file| file.get("url"))
        .and_then(Value::as_str)
        .or_else(|| body.get("url").and_then(Value::as_str))
}

fn is_list_item(block: &Value) -> bool {
    matches!(
        block_type(block),
        "bulleted_list_item" | "numbered_list_item" | "to_do"
    )
}

fn children(block: &Value) -> &[Value] {
    block
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_to_markdown(block: &Value) -> String {
    let rows = children(block)
        .iter()
        .filter(|row| block_type(row) == "table_row")
        .map(|row| {
            block_body(row)
                .get("cells")
                .and_then(Value::as_array)
                .map(|cells| cells.iter().map(rich_text_to_markdown).collect::<Vec<_>>())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();
    let Some(width) = rows.iter().map(Vec::len).max().filter(|width| *width > 0) else {
        return String::new();
    };

    let line = |cells: &[String]| {
        let mut padded = cells.to_vec();
        padded.resize(width, String::new());
        format!("| {} |", padded.join(" | "))
    };
    let mut lines = vec![line(&rows[0]), format!("|{}", " --- |".repeat(width))];
    lines.extend(rows[1..].iter().map(|row| line(row)));
    lines.join("\n")
}

/// One block without its children. `ordinal` numbers consecutive
/// numbered-list items.
pub fn block_to_markdown(block: &Value, ordinal: usize) -> String {
    let body = block_body(block);
    match block_type(block) {
        "paragraph" => block_rich_text(block),
        "heading_1" => format!("# {}", block_rich_text(block)),
        "heading_2" => format!("## {}", block_rich_text(block)),
        "heading_3" => format!("### {}", block_rich_text(block)),
        "bulleted_list_item" => format!("- {}", block_rich_text(block)),
        "numbered_list_item" => format!("{ordinal}. {}", block_rich_text(block)),
        "to_do" => {
            let checked = body.get("checked").and_then(Value::as_bool).unwrap_or(false);
            format!("- [{}] {}", if checked { "x" } else { " " }, block_rich_text(block))
        }
        "toggle" => format!("- {}", block_rich_text(block)),
        "quote" => block_rich_text(block)
            .lines()
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n"),
        "callout" => {
            let icon = body
                .get("icon")
                .and_then(|icon| icon.get("emoji"))
                .and_then(Value::as_str)
                .map(|emoji| format!("{emoji} "))
                .unwrap_or_default();
            format!("> {icon}{}", block_rich_text(block))
        }
        "code" => {
            let language = body
                .get("language")
                .and_then(Value::as_str)
                .filter(|language| *language != "plain text")
                .unwrap_or_default();
            let code = body
                .get("rich_text")
                .map(plain_text_from_rich_text)
                .unwrap_or_default();
            format!("```{language}\n{code}\n```")
        }
        "divider" => "---".to_string(),
        "equation" => {
            let expression = body.get("expression").and_then(Value::as_str).unwrap_or_default();
            format!("$$\n{expression}\n$$")
        }
        "image" => {
            let caption = body
                .get("caption")
                .map(plain_text_from_rich_text)
                .unwrap_or_default();
            file_url(body)
                .map(|url| format!("![{caption}]({url})"))
                .unwrap_or_default()
        }
        "bookmark" | "embed" | "link_preview" | "video" | "pdf" | "file" => {
            let caption = body
                .get("caption")
                .map(plain_text_from_rich_text)
                .filter(|caption| !caption.trim().is_empty());
            file_url(body)
                .map(|url| format!("[{}]({url})", caption.as_deref().unwrap_or(url)))
                .unwrap_or_default()
        }
        "child_page" | "child_database" => {
            let title = body
                .get("title")
                .and_then(Value::as_str)
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(UNTITLED);
            format!("**{title}**")
        }
        "table" => table_to_markdown(block),
        _ => String::new(),
    }
}

/// Render sibling blocks, recursing into attached children. List items are
/// kept on consecutive lines; other blocks are separated by a blank line.
pub fn blocks_to_markdown(blocks: &[Value]) -> String {
    let mut out = String::new();
    let mut ordinal = 0;
    let mut previous_was_list = false;

    for block in blocks {
        ordinal = if block_type(block) == "numbered_list_item" {
            ordinal + 1
        } else {
            0
        };

        let mut rendered = block_to_markdown(block, ordinal);
        if block_type(block) != "table" {
            let nested = blocks_to_markdown(children(block));
            if !nested.is_empty() {
                if !rendered.is_empty() {
                    rendered.push('\n');
                }
                rendered.push_str(&indent(&nested));
            }
        }
        if rendered.trim().is_empty() {
            continue;
        }

        let list = is_list_item(block) || block_type(block) == "toggle";
        if !out.is_empty() {
            out.push_str(if list && previous_was_list { "\n" } else { "\n\n" });
        }
        out.push_str(&rendered);
        previous_was_list = list;
    }
    out
}

/// Title of a page from its first `title` property.
pub fn page_title(page: &Value) -> String {
    page.get("properties")
        .and_then(Value::as_object)
        .and_then(|properties| {
            properties
                .values()
                .find(|property| property.get("type").and_then(Value::as_str) == Some("title"))
        })
        .and_then(|property| property.get("title"))
        .map(plain_text_from_rich_text)
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// A converted page: the title as H1 followed by the rendered body.
pub fn page_document(title: &str, body: &str) -> String {
    format!("# {title}\n\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(content: &str) -> Value {
        json!([{ "type": "text", "plain_text": content, "text": { "content": content } }])
    }

    fn block(kind: &str, content: &str) -> Value {
        let mut value = json!({ "type": kind });
        value[kind] = json!({ "rich_text": text(content) });
        value
    }

    #[test]
    fn annotations_render_inline() {
        let rich = json!([
            { "plain_text": "bold", "annotations": { "bold": true } },
            { "plain_text": " and " },
            { "plain_text": "code", "annotations": { "code": true } },
            { "plain_text": " " },
            { "plain_text": "site", "href": "https://example.com" }
        ]);
        assert_eq!(
            rich_text_to_markdown(&rich),
            "**bold** and `code` [site](https://example.com)"
        );
    }

    #[test]
    fn lists_stay_tight_and_number_consecutively() {
        let blocks = vec![
            block("heading_2", "Plan"),
            block("numbered_list_item", "first"),
            block("numbered_list_item", "second"),
            json!({ "type": "to_do", "to_do": { "rich_text": text("ship"), "checked": true } }),
            block("paragraph", "done"),
        ];
        assert_eq!(
            blocks_to_markdown(&blocks),
            "## Plan\n\n1. first\n2. second\n- [x] ship\n\ndone"
        );
    }

    #[test]
    fn children_are_indented() {
        let mut parent = block("bulleted_list_item", "parent");
        parent["children"] = json!([block("bulleted_list_item", "child")]);
        assert_eq!(blocks_to_markdown(&[parent]), "- parent\n  - child");
    }

    #[test]
    fn code_divider_and_media() {
        let blocks = vec![
            json!({ "type": "code", "code": { "rich_text": text("let x = 1;"), "language": "rust" } }),
            json!({ "type": "divider", "divider": {} }),
            json!({ "type": "image", "image": { "type": "external", "external": { "url": "https://img/a.png" }, "caption": [] } }),
            json!({ "type": "bookmark", "bookmark": { "url": "https://notion.so", "caption": [] } }),
            json!({ "type": "equation", "equation": { "expression": "e=mc^2" } }),
        ];
        assert_eq!(
            blocks_to_markdown(&blocks),
            "```rust\nlet x = 1;\n```\n\n---\n\n![](https://img/a.png)\n\n[https://notion.so](https://notion.so)\n\n$$\ne=mc^2\n$$"
        );
    }

    #[test]
    fn tables_render_with_header_separator() {
        let table = json!({
            "type": "table",
            "table": { "table_width": 2 },
            "children": [
                { "type": "table_row", "table_row": { "cells": [text("a"), text("b")] } },
                { "type": "table_row", "table_row": { "cells": [text("1"), text("2")] } }
            ]
        });
        assert_eq!(blocks_to_markdown(&[table]), "| a | b |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn unknown_and_empty_blocks_are_skipped() {
        let blocks = vec![
            json!({ "type": "unsupported", "unsupported": {} }),
            block("paragraph", ""),
            block("quote", "wise words"),
        ];
        assert_eq!(blocks_to_markdown(&blocks), "> wise words");
    }

    #[test]
    fn page_title_falls_back_to_untitled() {
        let page = json!({ "properties": { "Name": { "type": "title", "title": text("Roadmap") } } });
        assert_eq!(page_title(&page), "Roadmap");
        assert_eq!(page_title(&json!({ "properties": {} })), UNTITLED);
        assert_eq!(page_document("Roadmap", "body"), "# Roadmap\n\nbody");
    }
}
