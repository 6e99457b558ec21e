//! Local vault notes: frontmatter plus a markdown body

use std::sync::LazyLock;

use regex::Regex;

use super::{Codec, frontmatter, inline};
use crate::document::{ConversionNote, Decoded, Document};
use crate::id::StableId;
use crate::tree::{Block, ContentTree, EmbedKind, ListKind, Unmapped};

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t]*$").unwrap());
static DIVIDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(?:(?:- *){3,}|(?:\* *){3,}|(?:_ *){3,})$").unwrap());
static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,})[ \t]*([^`]*)$").unwrap());
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([ \t]*)([-*+]|\d+[.)])(?:[ \t]+(.*))?$").unwrap());
static TODO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([ xX])\](?:[ \t]+(.*))?$").unwrap());
static EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^!\[((?:\\.|[^\\\]])*)\]\((?:<([^>]+)>|([^\s)]+))(?:[ \t]+"(embed|bookmark)")?\)$"#)
        .unwrap()
});
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!-- docsync:(unmapped|frontmatter) (.*) -->$").unwrap());
static HTML: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^</?[A-Za-z][A-Za-z0-9-]*(?:[\s/>]|$)|^<!--").unwrap());

/// Codec for markdown notes with YAML frontmatter.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownCodec;

impl Codec for MarkdownCodec {
    type Native = String;

    fn decode(&self, native: &String) -> Decoded {
        decode(native)
    }

    fn encode(&self, document: &Document, claim: Option<StableId>, _previous: Option<&String>) -> String {
        encode(document, claim)
    }
}

pub fn decode(text: &str) -> Decoded {
    let mut notes = Vec::new();
    let mut blocks = Vec::new();
    let mut decoded = Decoded::default();

    let (raw_front, body) = frontmatter::split(text);
    if let Some(raw) = raw_front {
        match frontmatter::parse(raw, &mut notes) {
            Some(parsed) => {
                decoded.document.properties = parsed.properties;
                decoded.claim = parsed.claim;
            }
            None => {
                notes.push(ConversionNote::new("frontmatter", "not a key/value mapping; kept verbatim"));
                blocks.push(Block::Unmapped(Unmapped::Frontmatter(raw.to_string())));
            }
        }
    }

    parse_blocks(body, &mut blocks, &mut notes);

    decoded.document.tree = ContentTree::new(blocks).normalize();
    decoded.notes = notes;
    decoded
}

fn parse_blocks(body: &str, blocks: &mut Vec<Block>, notes: &mut Vec<ConversionNote>) {
    let lines: Vec<&str> = body.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        let location = || format!("line {}", i + 1);

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if let Some(caps) = FENCE.captures(line) {
            let fence_len = caps[1].len();
            let language = caps[2].trim().to_string();
            let mut code = Vec::new();
            i += 1;
            while i < lines.len() {
                let candidate = lines[i].trim();
                if candidate.len() >= fence_len && candidate.chars().all(|c| c == '`') {
                    i += 1;
                    break;
                }
                code.push(lines[i]);
                i += 1;
            }
            blocks.push(Block::Code {
                language,
                text: code.join("\n"),
            });
            continue;
        }

        if let Some(caps) = MARKER.captures(trimmed) {
            let payload = &caps[2];
            let block = if &caps[1] == "unmapped" {
                serde_json::from_str(payload).map(Unmapped::RemoteBlock)
            } else {
                serde_json::from_str::<String>(payload).map(Unmapped::Frontmatter)
            };
            match block {
                Ok(unmapped) => blocks.push(Block::Unmapped(unmapped)),
                Err(e) => {
                    notes.push(ConversionNote::new(location(), format!("unreadable marker: {e}")));
                    blocks.push(Block::Unmapped(Unmapped::Markdown(line.to_string())));
                }
            }
            i += 1;
            continue;
        }

        if let Some(caps) = HEADING.captures(line) {
            let text = caps.get(2).map_or("", |m| m.as_str());
            blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                spans: inline::parse_spans(text),
            });
            i += 1;
            continue;
        }

        if DIVIDER.is_match(line) {
            blocks.push(Block::Divider);
            i += 1;
            continue;
        }

        if let Some(caps) = EMBED.captures(trimmed) {
            let url = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            let kind = match caps.get(4).map(|m| m.as_str()) {
                Some("embed") => EmbedKind::Embed,
                Some("bookmark") => EmbedKind::Bookmark,
                _ => EmbedKind::Image,
            };
            blocks.push(Block::Embed {
                kind,
                url: url.to_string(),
                caption: inline::unescape(&caps[1]),
            });
            i += 1;
            continue;
        }

        if trimmed.starts_with('|') {
            let start = i;
            while i < lines.len() && lines[i].trim().starts_with('|') {
                i += 1;
            }
            notes.push(ConversionNote::new(format!("line {}", start + 1), "table kept as raw markdown"));
            blocks.push(Block::Unmapped(Unmapped::Markdown(lines[start..i].join("\n"))));
            continue;
        }

        if HTML.is_match(trimmed) {
            let start = i;
            while i < lines.len() && !lines[i].trim().is_empty() {
                i += 1;
            }
            notes.push(ConversionNote::new(format!("line {}", start + 1), "HTML kept as raw markdown"));
            blocks.push(Block::Unmapped(Unmapped::Markdown(lines[start..i].join("\n"))));
            continue;
        }

        if trimmed.starts_with('>') {
            let mut quoted = Vec::new();
            while i < lines.len() {
                let Some(rest) = lines[i].trim_start().strip_prefix('>') else {
                    break;
                };
                quoted.push(rest.strip_prefix(' ').unwrap_or(rest));
                i += 1;
            }
            blocks.push(Block::Quote {
                spans: inline::parse_spans(&quoted.join("\n")),
            });
            continue;
        }

        if let Some(caps) = LIST_ITEM.captures(line) {
            blocks.push(list_item(&caps));
            i += 1;
            continue;
        }

        let mut paragraph = vec![trimmed];
        i += 1;
        while i < lines.len() && !lines[i].trim().is_empty() && !starts_block(lines[i]) {
            paragraph.push(lines[i].trim());
            i += 1;
        }
        blocks.push(Block::Paragraph {
            spans: inline::parse_spans(&paragraph.join("\n")),
        });
    }
}

fn list_item(caps: &regex::Captures<'_>) -> Block {
    let width: usize = caps[1].chars().map(|c| if c == '\t' { 2 } else { 1 }).sum();
    let depth = u8::try_from(width / 2).unwrap_or(u8::MAX);
    let marker = &caps[2];
    let text = caps.get(3).map_or("", |m| m.as_str());

    let (kind, text) = match TODO.captures(text) {
        Some(todo) if !marker.ends_with(['.', ')']) => (
            ListKind::Todo {
                checked: &todo[1] != " ",
            },
            todo.get(2).map_or("", |m| m.as_str()),
        ),
        _ if marker.ends_with(['.', ')']) => (ListKind::Numbered, text),
        _ => (ListKind::Bulleted, text),
    };

    Block::ListItem {
        kind,
        depth,
        spans: inline::parse_spans(text),
    }
}

fn starts_block(line: &str) -> bool {
    let trimmed = line.trim();
    FENCE.is_match(line)
        || HEADING.is_match(line)
        || DIVIDER.is_match(line)
        || LIST_ITEM.is_match(line)
        || MARKER.is_match(trimmed)
        || EMBED.is_match(trimmed)
        || HTML.is_match(trimmed)
        || trimmed.starts_with('>')
        || trimmed.starts_with('|')
}

pub fn encode(document: &Document, claim: Option<StableId>) -> String {
    let mut out = frontmatter::render(&document.properties, claim);
    let mut blocks = document.tree.blocks.as_slice();

    // Verbatim frontmatter goes back where it came from when nothing else claims that spot
    if out.is_empty()
        && let Some((Block::Unmapped(Unmapped::Frontmatter(raw)), rest)) = blocks.split_first()
        && restorable_frontmatter(raw)
    {
        out = format!("---\n{raw}---\n");
        blocks = rest;
    }
    if !out.is_empty() && !blocks.is_empty() {
        out.push('\n');
    }

    let mut previous: Option<&Block> = None;
    for block in blocks {
        if let Some(prev) = previous {
            let tight = matches!(prev, Block::ListItem { .. }) && matches!(block, Block::ListItem { .. });
            out.push_str(if tight { "\n" } else { "\n\n" });
        }
        render_block(block, &mut out);
        previous = Some(block);
    }
    if previous.is_some() {
        out.push('\n');
    }
    out
}

/// Raw frontmatter that decodes back to itself as an unmapped block.
fn restorable_frontmatter(raw: &str) -> bool {
    raw.ends_with('\n')
        && raw.lines().all(|line| !matches!(line.trim_end(), "---" | "..."))
        && frontmatter::parse(raw, &mut Vec::new()).is_none()
}

fn render_block(block: &Block, out: &mut String) {
    match block {
        Block::Paragraph { spans } => out.push_str(&inline::render_spans(spans)),
        Block::Heading { level, spans } => {
            out.push_str(&"#".repeat(usize::from((*level).clamp(1, 6))));
            let text = inline::render_spans(spans);
            if !text.is_empty() {
                out.push(' ');
                out.push_str(&text);
            }
        }
        Block::ListItem { kind, depth, spans } => {
            out.push_str(&"  ".repeat(usize::from(*depth)));
            out.push_str(match kind {
                ListKind::Numbered => "1.",
                ListKind::Bulleted => "-",
                ListKind::Todo { checked: false } => "- [ ]",
                ListKind::Todo { checked: true } => "- [x]",
            });
            let text = inline::render_spans(spans);
            if !text.is_empty() {
                out.push(' ');
                out.push_str(&text);
            }
        }
        Block::Quote { spans } => {
            let text = inline::render_spans(spans);
            let quoted: Vec<String> = text
                .split('\n')
                .map(|line| if line.is_empty() { ">".to_string() } else { format!("> {line}") })
                .collect();
            out.push_str(&quoted.join("\n"));
        }
        Block::Code { language, text } => {
            let longest_run = text.split(|c| c != '`').map(str::len).max().unwrap_or(0);
            let fence = "`".repeat((longest_run + 1).max(3));
            out.push_str(&fence);
            out.push_str(language);
            out.push('\n');
            if !text.is_empty() {
                out.push_str(text);
                out.push('\n');
            }
            out.push_str(&fence);
        }
        // A leading `---` would open a frontmatter block
        Block::Divider => out.push_str(if out.is_empty() { "***" } else { "---" }),
        Block::Embed { kind, url, caption } => {
            let mut escaped_caption = String::new();
            for c in caption.chars() {
                if matches!(c, '\\' | '[' | ']') {
                    escaped_caption.push('\\');
                }
                escaped_caption.push(c);
            }
            out.push_str("![");
            out.push_str(&escaped_caption);
            out.push_str("](");
            if url.contains([' ', '(', ')']) {
                out.push('<');
                out.push_str(url);
                out.push('>');
            } else {
                out.push_str(url);
            }
            match kind {
                EmbedKind::Image => {}
                EmbedKind::Embed => out.push_str(" \"embed\""),
                EmbedKind::Bookmark => out.push_str(" \"bookmark\""),
            }
            out.push(')');
        }
        Block::Unmapped(Unmapped::RemoteBlock(json)) => {
            out.push_str("<!-- docsync:unmapped ");
            out.push_str(&json.to_string());
            out.push_str(" -->");
        }
        Block::Unmapped(Unmapped::Frontmatter(raw)) => {
            out.push_str("<!-- docsync:frontmatter ");
            out.push_str(&serde_json::Value::String(raw.clone()).to_string());
            out.push_str(" -->");
        }
        Block::Unmapped(Unmapped::Markdown(raw)) => out.push_str(raw),
    }
}
