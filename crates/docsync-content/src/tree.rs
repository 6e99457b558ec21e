//! Neutral document tree shared by the remote and local codecs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::id::StableId;

/// Line breaks inside a text span, with surrounding whitespace and blank lines
static PADDED_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\n[ \t\n]*").unwrap());

/// Inline formatting applied to a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marks {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Marks {
    pub const PLAIN: Marks = Marks {
        bold: false,
        italic: false,
        strikethrough: false,
        code: false,
    };

    pub fn is_plain(&self) -> bool {
        *self == Self::PLAIN
    }

    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::PLAIN
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Self::PLAIN
        }
    }
}

/// Where a link points.
///
/// `Remote` and `Local` are native references still waiting for a
/// [`StableId`]; `Tombstone` marks a target confirmed deleted and keeps
/// its last known name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LinkTarget {
    Resolved(StableId),
    Remote(String),
    Local(String),
    Url(String),
    Tombstone(String),
}

impl LinkTarget {
    /// A native reference that has not been bound to a stable id yet.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Local(_))
    }
}

/// A link inside a tree. The display text is owned by the link and is
/// never rewritten when the target changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkReference {
    pub display: String,
    pub target: LinkTarget,
    #[serde(default, skip_serializing_if = "Marks::is_plain")]
    pub marks: Marks,
}

impl LinkReference {
    pub fn new(display: impl Into<String>, target: LinkTarget) -> Self {
        Self {
            display: display.into(),
            target,
            marks: Marks::PLAIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Span {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Marks::is_plain")]
        marks: Marks,
    },
    Link(LinkReference),
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            marks: Marks::PLAIN,
        }
    }

    pub fn marked(text: impl Into<String>, marks: Marks) -> Self {
        Self::Text {
            text: text.into(),
            marks,
        }
    }

    /// Visible text of the span.
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Link(link) => &link.display,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum ListKind {
    Bulleted,
    Numbered,
    Todo { checked: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedKind {
    Image,
    Bookmark,
    Embed,
}

/// Native content with no neutral equivalent, carried opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", content = "payload", rename_all = "snake_case")]
pub enum Unmapped {
    /// A remote block kept verbatim.
    RemoteBlock(serde_json::Value),
    /// Markdown such as tables or raw HTML.
    Markdown(String),
    /// Frontmatter that could not be read as a property mapping.
    Frontmatter(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        spans: Vec<Span>,
    },
    Heading {
        level: u8,
        spans: Vec<Span>,
    },
    ListItem {
        kind: ListKind,
        depth: u8,
        spans: Vec<Span>,
    },
    Quote {
        spans: Vec<Span>,
    },
    Code {
        #[serde(default)]
        language: String,
        text: String,
    },
    Divider,
    Embed {
        kind: EmbedKind,
        url: String,
        #[serde(default)]
        caption: String,
    },
    Unmapped(Unmapped),
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph {
            spans: vec![Span::plain(text)],
        }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self::Heading {
            level,
            spans: vec![Span::plain(text)],
        }
    }

    pub fn spans(&self) -> Option<&[Span]> {
        match self {
            Self::Paragraph { spans }
            | Self::Heading { spans, .. }
            | Self::ListItem { spans, .. }
            | Self::Quote { spans } => Some(spans),
            _ => None,
        }
    }

    pub fn spans_mut(&mut self) -> Option<&mut Vec<Span>> {
        match self {
            Self::Paragraph { spans }
            | Self::Heading { spans, .. }
            | Self::ListItem { spans, .. }
            | Self::Quote { spans } => Some(spans),
            _ => None,
        }
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, Self::Unmapped(_))
    }
}

/// Ordered body of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentTree {
    pub blocks: Vec<Block>,
}

impl ContentTree {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Canonical form used for comparison and fingerprinting.
    ///
    /// Adjacent text spans with equal marks are merged, empty text spans
    /// and empty paragraphs are dropped, block-edge whitespace is trimmed,
    /// heading levels are clamped to 1..=6 and list depth may grow by at
    /// most one level per item.
    pub fn normalize(self) -> Self {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        let mut previous_depth: Option<u8> = None;

        for block in self.blocks {
            let mut list_depth = None;
            let block = match block {
                Block::Paragraph { spans } => {
                    let spans = normalize_spans(spans, false);
                    if spans.is_empty() {
                        continue;
                    }
                    Block::Paragraph { spans }
                }
                Block::Heading { level, spans } => Block::Heading {
                    level: level.clamp(1, 6),
                    spans: normalize_spans(spans, true),
                },
                Block::ListItem { kind, depth, spans } => {
                    let max = previous_depth.map_or(0, |d| d.saturating_add(1));
                    let depth = depth.min(max);
                    list_depth = Some(depth);
                    Block::ListItem {
                        kind,
                        depth,
                        spans: normalize_spans(spans, true),
                    }
                }
                Block::Quote { spans } => Block::Quote {
                    spans: normalize_spans(spans, false),
                },
                Block::Code { language, text } => Block::Code {
                    language: language.trim().to_string(),
                    text: text.trim_end_matches(['\n', '\r']).to_string(),
                },
                other => other,
            };
            previous_depth = list_depth;
            blocks.push(block);
        }

        Self { blocks }
    }

    /// Every block of `other` appears in `self`, in the same order.
    pub fn is_superset_of(&self, other: &ContentTree) -> bool {
        let mut mine = self.blocks.iter();
        other.blocks.iter().all(|block| mine.any(|m| m == block))
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkReference> {
        self.blocks
            .iter()
            .filter_map(Block::spans)
            .flatten()
            .filter_map(|span| match span {
                Span::Link(link) => Some(link),
                Span::Text { .. } => None,
            })
    }

    pub fn for_each_link_mut(&mut self, mut f: impl FnMut(&mut LinkReference)) {
        for spans in self.blocks.iter_mut().filter_map(Block::spans_mut) {
            for span in spans.iter_mut() {
                if let Span::Link(link) = span {
                    f(link);
                }
            }
        }
    }
}

fn normalize_spans(spans: Vec<Span>, single_line: bool) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());

    for span in spans {
        match span {
            Span::Text { text, marks } => {
                let text = if single_line {
                    text.replace(['\n', '\r'], " ")
                } else {
                    PADDED_NEWLINE.replace_all(&text, "\n").into_owned()
                };
                if text.is_empty() {
                    continue;
                }
                if let Some(Span::Text {
                    text: last,
                    marks: last_marks,
                }) = out.last_mut()
                    && *last_marks == marks
                {
                    last.push_str(&text);
                    continue;
                }
                out.push(Span::Text { text, marks });
            }
            Span::Link(mut link) => {
                // Links cannot be rendered inside code
                link.marks.code = false;
                out.push(Span::Link(link));
            }
        }
    }

    trim_edges(&mut out);
    out
}

fn trim_edges(spans: &mut Vec<Span>) {
    while let Some(Span::Text { text, .. }) = spans.first_mut() {
        let trimmed = text.trim_start();
        if trimmed.is_empty() {
            spans.remove(0);
            continue;
        }
        if trimmed.len() != text.len() {
            *text = trimmed.to_string();
        }
        break;
    }
    while let Some(Span::Text { text, .. }) = spans.last_mut() {
        let trimmed = text.trim_end();
        if trimmed.is_empty() {
            spans.pop();
            continue;
        }
        if trimmed.len() != text.len() {
            *text = trimmed.to_string();
        }
        break;
    }
}
