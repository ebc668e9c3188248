//! Markdown → Notion block conversion.
//!
//! Only headings, paragraphs, fenced/indented code and list items survive.
//! Lists are flattened into bulleted items in document order. Everything
//! else (tables, quotes, images, rules, raw HTML) is dropped.

use crate::error::{DashboardError, Result};
use crate::types::{DEFAULT_NOTE_TITLE, MAX_RICH_TEXT_CHARS};
use crate::util::{chunk_chars, option_non_empty};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const DEFAULT_CODE_LANGUAGE: &str = "plain text";

/// Languages the Notion API accepts on a code block.
const NOTION_CODE_LANGUAGES: &[&str] = &[
    "bash", "c", "c#", "c++", "clojure", "css", "dart", "diff", "docker", "elixir", "erlang",
    "go", "graphql", "haskell", "html", "java", "javascript", "json", "kotlin", "latex", "lua",
    "makefile", "markdown", "mermaid", "nix", "objective-c", "ocaml", "perl", "php",
    "plain text", "powershell", "python", "r", "ruby", "rust", "scala", "shell", "sql", "swift",
    "toml", "typescript", "xml", "yaml",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RichText {
    pub content: String,
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: Option<String>,
}

impl RichText {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    fn same_style(&self, other: &RichText) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.strikethrough == other.strikethrough
            && self.code == other.code
            && self.link == other.link
    }

    fn has_annotations(&self) -> bool {
        self.bold || self.italic || self.strikethrough || self.code
    }

    /// Notion rejects text objects longer than 2000 characters, so long
    /// runs become several objects with the same styling.
    fn to_json(&self) -> Vec<Value> {
        chunk_chars(&self.content, MAX_RICH_TEXT_CHARS)
            .into_iter()
            .map(|content| {
                let mut text = Map::new();
                text.insert("content".to_string(), Value::String(content));
                if let Some(url) = &self.link {
                    text.insert("link".to_string(), json!({ "url": url }));
                }
                let mut item = json!({ "type": "text", "text": Value::Object(text) });
                if self.has_annotations() {
                    item["annotations"] = json!({
                        "bold": self.bold,
                        "italic": self.italic,
                        "strikethrough": self.strikethrough,
                        "code": self.code,
                    });
                }
                item
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotionBlock {
    Heading { level: u8, text: Vec<RichText> },
    Paragraph { text: Vec<RichText> },
    Code { language: String, text: Vec<RichText> },
    BulletedListItem { text: Vec<RichText> },
}

impl NotionBlock {
    pub fn heading(level: u8, content: &str) -> Self {
        NotionBlock::Heading {
            level: level.clamp(1, 3),
            text: vec![RichText::plain(content)],
        }
    }

    pub fn paragraph(content: &str) -> Self {
        NotionBlock::Paragraph {
            text: vec![RichText::plain(content)],
        }
    }

    pub fn code(language: &str, content: &str) -> Self {
        NotionBlock::Code {
            language: language.to_string(),
            text: vec![RichText::plain(content)],
        }
    }

    pub fn bulleted(content: &str) -> Self {
        NotionBlock::BulletedListItem {
            text: vec![RichText::plain(content)],
        }
    }

    /// Notion block type name, e.g. `heading_2`.
    pub fn block_type(&self) -> String {
        match self {
            NotionBlock::Heading { level, .. } => format!("heading_{level}"),
            NotionBlock::Paragraph { .. } => "paragraph".to_string(),
            NotionBlock::Code { .. } => "code".to_string(),
            NotionBlock::BulletedListItem { .. } => "bulleted_list_item".to_string(),
        }
    }

    pub fn rich_text(&self) -> &[RichText] {
        match self {
            NotionBlock::Heading { text, .. }
            | NotionBlock::Paragraph { text }
            | NotionBlock::Code { text, .. }
            | NotionBlock::BulletedListItem { text } => text,
        }
    }

    pub fn plain_text(&self) -> String {
        self.rich_text().iter().map(|item| item.content.as_str()).collect()
    }

    pub fn to_json(&self) -> Value {
        let block_type = self.block_type();
        let rich_text = self
            .rich_text()
            .iter()
            .flat_map(RichText::to_json)
            .collect::<Vec<_>>();
        let mut body = json!({ "rich_text": rich_text });
        if let NotionBlock::Code { language, .. } = self {
            body["language"] = Value::String(language.clone());
        }
        let mut block = json!({ "object": "block", "type": block_type });
        block[block_type.as_str()] = body;
        block
    }
}

/// Title and body of a note ready to be created as a Notion page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedNote {
    pub title: String,
    pub blocks: Vec<NotionBlock>,
}

#[derive(Debug)]
enum Frame {
    Paragraph(Vec<RichText>),
    Heading(u8, Vec<RichText>),
    Code(String, Vec<RichText>),
    Item { text: Vec<RichText>, flushed: bool },
    List,
    Strong,
    Emphasis,
    Strikethrough,
    Link(String),
    /// Transparent wrapper, e.g. the paragraph inside a loose list item.
    Passthrough,
    /// Anything we drop, together with all of its content.
    Dropped,
}

impl Frame {
    fn captures(&self) -> bool {
        matches!(
            self,
            Frame::Paragraph(_) | Frame::Heading(..) | Frame::Code(..) | Frame::Item { .. }
        )
    }
}

struct Converter {
    stack: Vec<Frame>,
    blocks: Vec<NotionBlock>,
}

impl Converter {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn dropped(&self) -> bool {
        self.stack.iter().any(|frame| matches!(frame, Frame::Dropped))
    }

    fn in_item(&self) -> bool {
        self.stack.iter().any(|frame| matches!(frame, Frame::Item { .. }))
    }

    fn start(&mut self, tag: Tag<'_>) {
        if self.dropped() {
            self.stack.push(Frame::Dropped);
            return;
        }
        let frame = match tag {
            Tag::Paragraph if self.in_item() => Frame::Passthrough,
            Tag::Paragraph => Frame::Paragraph(Vec::new()),
            Tag::Heading { level, .. } => Frame::Heading(heading_depth(level), Vec::new()),
            Tag::CodeBlock(kind) => Frame::Code(code_language(&kind), Vec::new()),
            Tag::List(_) => {
                self.flush_open_item();
                Frame::List
            }
            Tag::Item => Frame::Item {
                text: Vec::new(),
                flushed: false,
            },
            Tag::Strong => Frame::Strong,
            Tag::Emphasis => Frame::Emphasis,
            Tag::Strikethrough => Frame::Strikethrough,
            Tag::Link { dest_url, .. } => Frame::Link(dest_url.to_string()),
            _ => Frame::Dropped,
        };
        self.stack.push(frame);
    }

    fn end(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Paragraph(text) => {
                let text = trim_segments(text);
                if !text.is_empty() {
                    self.blocks.push(NotionBlock::Paragraph { text });
                }
            }
            Frame::Heading(level, text) => {
                self.blocks.push(NotionBlock::Heading {
                    level,
                    text: trim_segments(text),
                });
            }
            Frame::Code(language, mut text) => {
                if let Some(last) = text.last_mut() {
                    if last.content.ends_with('\n') {
                        last.content.pop();
                    }
                }
                self.blocks.push(NotionBlock::Code { language, text });
            }
            Frame::Item { text, flushed } => {
                let text = trim_segments(text);
                if !flushed || !text.is_empty() {
                    self.blocks.push(NotionBlock::BulletedListItem { text });
                }
            }
            _ => {}
        }
    }

    /// A nested list starts: emit the parent item first so the flattened
    /// order stays parent-before-children.
    fn flush_open_item(&mut self) {
        let Some(Frame::Item { text, flushed }) = self
            .stack
            .iter_mut()
            .rev()
            .find(|frame| matches!(frame, Frame::Item { .. }))
        else {
            return;
        };
        let pending = trim_segments(std::mem::take(text));
        if !*flushed || !pending.is_empty() {
            self.blocks.push(NotionBlock::BulletedListItem { text: pending });
        }
        *flushed = true;
    }

    fn text(&mut self, content: &str, inline_code: bool) {
        if self.dropped() {
            return;
        }
        let mut segment = RichText {
            content: content.to_string(),
            code: inline_code,
            ..RichText::default()
        };

        let mut target = None;
        for frame in self.stack.iter_mut().rev() {
            if frame.captures() {
                target = Some(frame);
                break;
            }
            match frame {
                Frame::Strong => segment.bold = true,
                Frame::Emphasis => segment.italic = true,
                Frame::Strikethrough => segment.strikethrough = true,
                Frame::Link(url) if segment.link.is_none() => segment.link = Some(url.clone()),
                _ => {}
            }
        }

        let Some(frame) = target else {
            return;
        };
        let segments = match frame {
            Frame::Paragraph(text)
            | Frame::Heading(_, text)
            | Frame::Code(_, text)
            | Frame::Item { text, .. } => text,
            _ => return,
        };
        match segments.last_mut() {
            Some(last) if last.same_style(&segment) => last.content.push_str(&segment.content),
            _ => segments.push(segment),
        }
    }
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        _ => 3,
    }
}

fn code_language(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => normalize_code_language(info),
        CodeBlockKind::Indented => DEFAULT_CODE_LANGUAGE.to_string(),
    }
}

/// Map a fence info string to a language Notion accepts.
pub fn normalize_code_language(info: &str) -> String {
    let tag = info
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let alias = match tag.as_str() {
        "" => DEFAULT_CODE_LANGUAGE,
        "js" | "jsx" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "rs" => "rust",
        "sh" | "zsh" => "shell",
        "yml" => "yaml",
        "md" => "markdown",
        "cpp" | "cc" => "c++",
        "cs" | "csharp" => "c#",
        "golang" => "go",
        "dockerfile" => "docker",
        "text" | "txt" | "plaintext" => DEFAULT_CODE_LANGUAGE,
        other => other,
    };
    if NOTION_CODE_LANGUAGES.contains(&alias) {
        alias.to_string()
    } else {
        DEFAULT_CODE_LANGUAGE.to_string()
    }
}

fn trim_segments(mut segments: Vec<RichText>) -> Vec<RichText> {
    if let Some(first) = segments.first_mut() {
        first.content = first.content.trim_start().to_string();
    }
    if let Some(last) = segments.last_mut() {
        last.content = last.content.trim_end().to_string();
    }
    segments.retain(|segment| !segment.content.is_empty());
    segments
}

pub fn markdown_to_blocks(markdown: &str) -> Vec<NotionBlock> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut converter = Converter::new();
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => converter.start(tag),
            Event::End(_) => converter.end(),
            Event::Text(text) => converter.text(&text, false),
            Event::Code(code) => converter.text(&code, true),
            Event::SoftBreak | Event::HardBreak => converter.text("\n", false),
            _ => {}
        }
    }
    converter.blocks
}

/// Pull a leading level-1 heading out as the document title.
pub fn extract_title(mut blocks: Vec<NotionBlock>) -> (Option<String>, Vec<NotionBlock>) {
    match blocks.first() {
        Some(NotionBlock::Heading { level: 1, .. }) => {
            let heading = blocks.remove(0);
            (option_non_empty(heading.plain_text()), blocks)
        }
        _ => (None, blocks),
    }
}

/// Validate and convert a note for page creation. The title is the leading
/// H1 when present, otherwise `explicit_title`, otherwise "New Note".
pub fn prepare_note(markdown: &str, explicit_title: Option<&str>) -> Result<PreparedNote> {
    if markdown.trim().is_empty() {
        return Err(DashboardError::InvalidInput(
            "'markdown' must be a non-empty string".to_string(),
        ));
    }

    let blocks = markdown_to_blocks(markdown);
    if blocks.is_empty() {
        return Err(DashboardError::EmptyDocument);
    }

    let fallback = explicit_title
        .and_then(|title| option_non_empty(title.to_string()))
        .unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string());
    let (heading_title, blocks) = extract_title(blocks);
    if blocks.is_empty() {
        return Err(DashboardError::EmptyDocument);
    }

    Ok(PreparedNote {
        title: heading_title.unwrap_or(fallback),
        blocks,
    })
}
