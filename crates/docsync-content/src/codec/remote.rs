//! Remote pages: Notion-style block and property JSON
//!
//! Blocks are `{"type": kind, kind: {...}}` objects. List items nest
//! through `children`; everything the neutral tree cannot express is
//! carried as an unmapped block and written back verbatim.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Codec, link_url};
use crate::document::{ConversionNote, Decoded, Document};
use crate::id::{CLAIM_KEY, StableId};
use crate::property::PropertyValue;
use crate::tree::{Block, ContentTree, EmbedKind, LinkReference, LinkTarget, ListKind, Marks, Span, Unmapped};

/// Remote levels stop at 3; deeper headings ride on `heading_3` with this field
const LEVEL_FIELD: &str = "docsync_level";
/// Marks a code block that carries local unmapped content
const UNMAPPED_FIELD: &str = "docsync_unmapped";
const PLAIN_LANGUAGE: &str = "plain text";

/// Native remote document body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemotePage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Codec for remote pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteCodec;

impl Codec for RemoteCodec {
    type Native = RemotePage;

    fn decode(&self, native: &RemotePage) -> Decoded {
        decode(native)
    }

    fn encode(&self, document: &Document, claim: Option<StableId>, previous: Option<&RemotePage>) -> RemotePage {
        encode(document, claim, previous)
    }
}

pub fn decode(page: &RemotePage) -> Decoded {
    let mut notes = Vec::new();
    let mut blocks = Vec::new();
    for (idx, block) in page.blocks.iter().enumerate() {
        decode_block(block, 0, &format!("block {idx}"), &mut blocks, &mut notes);
    }

    let mut decoded = Decoded::default();
    for (name, value) in &page.properties {
        if name == CLAIM_KEY {
            match plain_text_of_property(value).map(|s| s.parse::<StableId>()) {
                Some(Ok(id)) => decoded.claim = Some(id),
                _ => notes.push(ConversionNote::new(
                    format!("property {CLAIM_KEY}"),
                    "ignored malformed identity claim",
                )),
            }
            continue;
        }
        let value = decode_property(name, value, &mut notes);
        decoded.document.properties.insert(name.clone(), value);
    }

    decoded.document.tree = ContentTree::new(blocks).normalize();
    decoded.notes = notes;
    decoded
}

fn unmapped(block: &Value, location: &str, reason: &str, out: &mut Vec<Block>, notes: &mut Vec<ConversionNote>) {
    notes.push(ConversionNote::new(location, reason));
    out.push(Block::Unmapped(Unmapped::RemoteBlock(block.clone())));
}

fn decode_block(block: &Value, depth: u8, location: &str, out: &mut Vec<Block>, notes: &mut Vec<ConversionNote>) {
    let Some(kind) = block.get("type").and_then(Value::as_str) else {
        return unmapped(block, location, "block without a type", out, notes);
    };
    let Some(body) = block.get(kind).and_then(Value::as_object) else {
        return unmapped(block, location, &format!("{kind} block without a body"), out, notes);
    };

    let children = body
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let list_kind = match kind {
        "bulleted_list_item" => Some(ListKind::Bulleted),
        "numbered_list_item" => Some(ListKind::Numbered),
        "to_do" => Some(ListKind::Todo {
            checked: body.get("checked").and_then(Value::as_bool).unwrap_or(false),
        }),
        _ => None,
    };

    if !children.is_empty() {
        let nestable = list_kind.is_some() && children.iter().all(is_list_block);
        if !nestable {
            return unmapped(block, location, &format!("{kind} with nested children"), out, notes);
        }
    }

    let rich_text = || body.get("rich_text").and_then(Value::as_array).map(Vec::as_slice);

    let decoded = match kind {
        "paragraph" | "quote" | "heading_1" | "heading_2" | "heading_3" => {
            let Some(items) = rich_text() else {
                return unmapped(block, location, &format!("{kind} without rich_text"), out, notes);
            };
            let spans = decode_rich_text(items, location, notes);
            match kind {
                "paragraph" => Block::Paragraph { spans },
                "quote" => Block::Quote { spans },
                _ => {
                    let base: u8 = kind[kind.len() - 1..].parse().unwrap_or(1);
                    let level = body
                        .get(LEVEL_FIELD)
                        .and_then(Value::as_u64)
                        .filter(|l| base == 3 && (4..=6).contains(l))
                        .map_or(base, |l| l as u8);
                    Block::Heading { level, spans }
                }
            }
        }
        _ if list_kind.is_some() => {
            let Some(items) = rich_text() else {
                return unmapped(block, location, &format!("{kind} without rich_text"), out, notes);
            };
            let item = Block::ListItem {
                kind: list_kind.unwrap_or(ListKind::Bulleted),
                depth,
                spans: decode_rich_text(items, location, notes),
            };
            out.push(item);
            for (idx, child) in children.iter().enumerate() {
                decode_block(child, depth.saturating_add(1), &format!("{location}.{idx}"), out, notes);
            }
            return;
        }
        "code" => {
            let text = rich_text().map(plain_text).unwrap_or_default();
            let language = body
                .get("language")
                .and_then(Value::as_str)
                .filter(|l| *l != PLAIN_LANGUAGE)
                .unwrap_or_default()
                .to_string();
            match body.get(UNMAPPED_FIELD).and_then(Value::as_str) {
                Some("markdown") => Block::Unmapped(Unmapped::Markdown(text)),
                Some("frontmatter") => Block::Unmapped(Unmapped::Frontmatter(text)),
                _ => Block::Code { language, text },
            }
        }
        "divider" => Block::Divider,
        "embed" | "bookmark" | "image" => {
            let url = if kind == "image" {
                match body.get("type").and_then(Value::as_str) {
                    Some("external") => body.get("external").and_then(|e| e.get("url")).and_then(Value::as_str),
                    _ => None,
                }
            } else {
                body.get("url").and_then(Value::as_str)
            };
            let Some(url) = url else {
                return unmapped(block, location, &format!("{kind} without an external url"), out, notes);
            };
            let caption = body
                .get("caption")
                .and_then(Value::as_array)
                .map(|items| plain_text(items))
                .unwrap_or_default();
            let kind = match kind {
                "image" => EmbedKind::Image,
                "bookmark" => EmbedKind::Bookmark,
                _ => EmbedKind::Embed,
            };
            Block::Embed {
                kind,
                url: url.to_string(),
                caption,
            }
        }
        other => {
            return unmapped(block, location, &format!("unsupported block type {other}"), out, notes);
        }
    };
    out.push(decoded);
}

fn is_list_block(block: &Value) -> bool {
    matches!(
        block.get("type").and_then(Value::as_str),
        Some("bulleted_list_item" | "numbered_list_item" | "to_do")
    )
}

fn plain_text(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| {
            item.get("plain_text")
                .or_else(|| item.pointer("/text/content"))
                .and_then(Value::as_str)
        })
        .collect()
}

fn decode_marks(item: &Value) -> Marks {
    let flag = |name: &str| {
        item.pointer(&format!("/annotations/{name}"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    Marks {
        bold: flag("bold"),
        italic: flag("italic"),
        strikethrough: flag("strikethrough"),
        code: flag("code"),
    }
}

fn decode_rich_text(items: &[Value], location: &str, notes: &mut Vec<ConversionNote>) -> Vec<Span> {
    let mut spans = Vec::with_capacity(items.len());
    for item in items {
        let marks = decode_marks(item);
        let plain = item.get("plain_text").and_then(Value::as_str);

        match item.get("type").and_then(Value::as_str) {
            Some("text") => {
                let content = item
                    .pointer("/text/content")
                    .and_then(Value::as_str)
                    .or(plain)
                    .unwrap_or_default();
                match item.pointer("/text/link/url").and_then(Value::as_str) {
                    Some(url) => spans.push(Span::Link(LinkReference {
                        display: content.to_string(),
                        target: link_url::url_to_target(url),
                        marks,
                    })),
                    None => spans.push(Span::marked(content, marks)),
                }
            }
            Some("mention") => {
                let mention_kind = item.pointer("/mention/type").and_then(Value::as_str);
                let target = match mention_kind {
                    Some(kind @ ("page" | "database")) => item
                        .pointer(&format!("/mention/{kind}/id"))
                        .and_then(Value::as_str),
                    _ => None,
                };
                match target {
                    Some(id) => spans.push(Span::Link(LinkReference {
                        display: plain.unwrap_or_default().to_string(),
                        target: LinkTarget::Remote(id.to_string()),
                        marks,
                    })),
                    None => {
                        notes.push(ConversionNote::new(
                            location,
                            format!("{} mention kept as text", mention_kind.unwrap_or("unknown")),
                        ));
                        spans.push(Span::marked(plain.unwrap_or_default(), marks));
                    }
                }
            }
            other => {
                notes.push(ConversionNote::new(
                    location,
                    format!("{} rich text kept as plain text", other.unwrap_or("untyped")),
                ));
                spans.push(Span::marked(plain.unwrap_or_default(), marks));
            }
        }
    }
    spans
}

fn decode_property(name: &str, value: &Value, notes: &mut Vec<ConversionNote>) -> PropertyValue {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    let inner = value.get(kind);
    let keep = || PropertyValue::Unmapped(value.clone());

    match (kind, inner) {
        ("title" | "rich_text", Some(Value::Array(items))) => {
            let location = format!("property {name}");
            let spans = decode_rich_text(items, &location, notes);
            match spans.as_slice() {
                [Span::Link(link)] if link.marks.is_plain() => PropertyValue::Reference(link.clone()),
                _ => PropertyValue::Text(spans.iter().map(Span::text).collect()),
            }
        }
        ("select" | "status", Some(Value::Object(option))) => match option.get("name").and_then(Value::as_str) {
            Some(name) => PropertyValue::text(name),
            None => keep(),
        },
        ("url" | "email" | "phone_number", Some(Value::String(s))) => PropertyValue::text(s.as_str()),
        ("number", Some(Value::Number(n))) => n.as_f64().map_or_else(keep, PropertyValue::Number),
        ("checkbox", Some(Value::Bool(b))) => PropertyValue::Bool(*b),
        ("date", Some(Value::Object(date))) => {
            let single_day = date.get("end").is_none_or(Value::is_null);
            match date.get("start").and_then(Value::as_str) {
                Some(start) if single_day => NaiveDate::parse_from_str(start, "%Y-%m-%d")
                    .map_or_else(|_| keep(), PropertyValue::Date),
                _ => keep(),
            }
        }
        ("multi_select", Some(Value::Array(options))) => {
            let names: Option<Vec<&str>> = options
                .iter()
                .map(|o| o.get("name").and_then(Value::as_str))
                .collect();
            names.map_or_else(keep, PropertyValue::tags)
        }
        ("relation", Some(Value::Array(related))) => match related.as_slice() {
            [single] => match single.get("id").and_then(Value::as_str) {
                Some(id) => PropertyValue::Reference(LinkReference::new("", LinkTarget::Remote(id.to_string()))),
                None => keep(),
            },
            _ => keep(),
        },
        _ => keep(),
    }
}

fn plain_text_of_property(value: &Value) -> Option<String> {
    let kind = value.get("type").and_then(Value::as_str)?;
    match value.get(kind)? {
        Value::Array(items) => Some(plain_text(items)),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Render a document as a remote page.
///
/// The title and each property's remote type are taken from `previous`
/// when the page already exists, so a `select` column stays a `select`.
pub fn encode(document: &Document, claim: Option<StableId>, previous: Option<&RemotePage>) -> RemotePage {
    let mut properties = Map::new();
    if let Some(id) = claim {
        properties.insert(CLAIM_KEY.to_string(), rich_text_property(&id.to_string()));
    }
    for (name, value) in document.properties.iter() {
        let existing_kind = previous
            .and_then(|p| p.properties.get(name))
            .and_then(|v| v.get("type"))
            .and_then(Value::as_str);
        properties.insert(name.to_string(), encode_property(value, existing_kind));
    }

    RemotePage {
        title: previous.map(|p| p.title.clone()).unwrap_or_default(),
        blocks: encode_blocks(&document.tree.blocks),
        properties,
    }
}

fn encode_blocks(blocks: &[Block]) -> Vec<Value> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut i = 0;
    while i < blocks.len() {
        let block = &blocks[i];
        i += 1;
        let Block::ListItem { kind, depth, spans } = block else {
            out.push(encode_block(block));
            continue;
        };

        // Deeper items that follow belong to this one
        let start = i;
        while let Some(Block::ListItem { depth: d, .. }) = blocks.get(i)
            && d > depth
        {
            i += 1;
        }
        let children = encode_blocks(&blocks[start..i]);

        let (type_name, mut body) = match kind {
            ListKind::Bulleted => ("bulleted_list_item", Map::new()),
            ListKind::Numbered => ("numbered_list_item", Map::new()),
            ListKind::Todo { checked } => {
                let mut body = Map::new();
                body.insert("checked".into(), Value::Bool(*checked));
                ("to_do", body)
            }
        };
        body.insert("rich_text".into(), Value::Array(encode_rich_text(spans)));
        if !children.is_empty() {
            body.insert("children".into(), Value::Array(children));
        }
        out.push(json!({ "type": type_name, type_name: body }));
    }
    out
}

fn encode_block(block: &Block) -> Value {
    match block {
        Block::Paragraph { spans } => json!({
            "type": "paragraph",
            "paragraph": { "rich_text": encode_rich_text(spans) }
        }),
        Block::Heading { level, spans } => {
            let level = (*level).clamp(1, 6);
            let kind = format!("heading_{}", level.min(3));
            let mut body = Map::new();
            body.insert("rich_text".into(), Value::Array(encode_rich_text(spans)));
            if level > 3 {
                body.insert(LEVEL_FIELD.into(), Value::from(level));
            }
            json!({ "type": kind, kind: body })
        }
        Block::Quote { spans } => json!({
            "type": "quote",
            "quote": { "rich_text": encode_rich_text(spans) }
        }),
        Block::Code { language, text } => code_block(
            if language.is_empty() { PLAIN_LANGUAGE } else { language.as_str() },
            text,
            None,
        ),
        Block::Divider => json!({ "type": "divider", "divider": {} }),
        Block::Embed { kind, url, caption } => {
            let caption = if caption.is_empty() {
                Vec::new()
            } else {
                vec![text_item(caption, None, Marks::PLAIN)]
            };
            match kind {
                EmbedKind::Image => json!({
                    "type": "image",
                    "image": { "type": "external", "external": { "url": url }, "caption": caption }
                }),
                EmbedKind::Bookmark => json!({
                    "type": "bookmark",
                    "bookmark": { "url": url, "caption": caption }
                }),
                EmbedKind::Embed => json!({
                    "type": "embed",
                    "embed": { "url": url, "caption": caption }
                }),
            }
        }
        Block::ListItem { .. } => encode_blocks(std::slice::from_ref(block))
            .pop()
            .unwrap_or(Value::Null),
        Block::Unmapped(Unmapped::RemoteBlock(value)) => value.clone(),
        Block::Unmapped(Unmapped::Markdown(text)) => code_block("markdown", text, Some("markdown")),
        Block::Unmapped(Unmapped::Frontmatter(text)) => code_block("yaml", text, Some("frontmatter")),
    }
}

fn code_block(language: &str, text: &str, unmapped: Option<&str>) -> Value {
    let mut body = Map::new();
    body.insert("language".into(), Value::from(language));
    body.insert("rich_text".into(), json!([text_item(text, None, Marks::PLAIN)]));
    if let Some(origin) = unmapped {
        body.insert(UNMAPPED_FIELD.into(), Value::from(origin));
    }
    json!({ "type": "code", "code": body })
}

fn annotations(marks: Marks) -> Value {
    json!({
        "bold": marks.bold,
        "italic": marks.italic,
        "strikethrough": marks.strikethrough,
        "underline": false,
        "code": marks.code,
        "color": "default"
    })
}

fn text_item(content: &str, url: Option<&str>, marks: Marks) -> Value {
    let link = url.map_or(Value::Null, |url| json!({ "url": url }));
    json!({
        "type": "text",
        "text": { "content": content, "link": link },
        "annotations": annotations(marks),
        "plain_text": content
    })
}

fn encode_rich_text(spans: &[Span]) -> Vec<Value> {
    spans
        .iter()
        .map(|span| match span {
            Span::Text { text, marks } => text_item(text, None, *marks),
            Span::Link(link) => match &link.target {
                LinkTarget::Remote(id) => json!({
                    "type": "mention",
                    "mention": { "type": "page", "page": { "id": id } },
                    "annotations": annotations(link.marks),
                    "plain_text": link.display
                }),
                target => {
                    let url = link_url::target_to_url(target);
                    text_item(&link.display, Some(&url), link.marks)
                }
            },
        })
        .collect()
}

fn rich_text_property(text: &str) -> Value {
    json!({ "type": "rich_text", "rich_text": [text_item(text, None, Marks::PLAIN)] })
}

fn encode_property(value: &PropertyValue, existing_kind: Option<&str>) -> Value {
    match value {
        PropertyValue::Text(s) => match existing_kind {
            Some("title") => json!({ "type": "title", "title": [text_item(s, None, Marks::PLAIN)] }),
            Some(kind @ ("select" | "status")) => json!({ "type": kind, kind: { "name": s } }),
            Some(kind @ ("url" | "email" | "phone_number")) => json!({ "type": kind, kind: s }),
            _ => rich_text_property(s),
        },
        PropertyValue::Number(n) => json!({ "type": "number", "number": n }),
        PropertyValue::Bool(b) => json!({ "type": "checkbox", "checkbox": b }),
        PropertyValue::Date(date) => json!({
            "type": "date",
            "date": { "start": date.format("%Y-%m-%d").to_string(), "end": null }
        }),
        PropertyValue::Tags(tags) => {
            let options: Vec<Value> = tags.iter().map(|t| json!({ "name": t })).collect();
            json!({ "type": "multi_select", "multi_select": options })
        }
        PropertyValue::Reference(link) => match &link.target {
            LinkTarget::Remote(id) => json!({ "type": "relation", "relation": [{ "id": id }] }),
            _ => json!({
                "type": "rich_text",
                "rich_text": encode_rich_text(std::slice::from_ref(&Span::Link(link.clone())))
            }),
        },
        PropertyValue::Unmapped(value) => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertySet;
    use pretty_assertions::assert_eq;

    fn page(blocks: Vec<Value>, properties: Value) -> RemotePage {
        RemotePage {
            title: "R1".into(),
            blocks,
            properties: properties.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn decodes_paragraph_with_annotations_and_mention() {
        let remote = page(
            vec![json!({
                "type": "paragraph",
                "paragraph": { "rich_text": [
                    { "type": "text", "text": { "content": "Hello " }, "plain_text": "Hello " },
                    { "type": "text", "text": { "content": "world" }, "annotations": { "bold": true }, "plain_text": "world" },
                    { "type": "mention", "mention": { "type": "page", "page": { "id": "p-2" } }, "plain_text": "Other" }
                ]}
            })],
            json!({}),
        );

        let decoded = decode(&remote);

        assert!(decoded.notes.is_empty());
        assert_eq!(
            decoded.document.tree.blocks,
            vec![Block::Paragraph {
                spans: vec![
                    Span::plain("Hello "),
                    Span::marked("world", Marks::bold()),
                    Span::Link(LinkReference::new("Other", LinkTarget::Remote("p-2".into()))),
                ]
            }]
        );
    }

    #[test]
    fn nested_list_children_become_depth() {
        let remote = page(
            vec![json!({
                "type": "bulleted_list_item",
                "bulleted_list_item": {
                    "rich_text": [{ "type": "text", "text": { "content": "parent" } }],
                    "children": [{
                        "type": "to_do",
                        "to_do": { "checked": true, "rich_text": [{ "type": "text", "text": { "content": "child" } }] }
                    }]
                }
            })],
            json!({}),
        );

        let decoded = decode(&remote);
        let reencoded = encode(&decoded.document, None, None);

        assert_eq!(
            decoded.document.tree.blocks[1],
            Block::ListItem {
                kind: ListKind::Todo { checked: true },
                depth: 1,
                spans: vec![Span::plain("child")]
            }
        );
        assert_eq!(reencoded.blocks.len(), 1);
        assert_eq!(decode(&reencoded).document, decoded.document);
    }

    #[test]
    fn unknown_blocks_are_kept_verbatim() {
        let unknown = json!({ "type": "synced_block", "synced_block": { "synced_from": null } });
        let remote = page(vec![unknown.clone()], json!({}));

        let decoded = decode(&remote);
        let reencoded = encode(&decoded.document, None, None);

        assert_eq!(decoded.notes.len(), 1);
        assert_eq!(reencoded.blocks, vec![unknown]);
    }

    #[test]
    fn deep_headings_use_level_field() {
        let document = Document::new(ContentTree::new(vec![Block::heading(5, "Deep")]), PropertySet::new());

        let encoded = encode(&document, None, None);

        assert_eq!(encoded.blocks[0]["type"], "heading_3");
        assert_eq!(encoded.blocks[0]["heading_3"][LEVEL_FIELD], 5);
        assert_eq!(decode(&encoded).document, document);
    }

    #[test]
    fn decodes_property_types() {
        let remote = page(
            Vec::new(),
            json!({
                "tags": { "type": "multi_select", "multi_select": [{ "name": "b" }, { "name": "a" }] },
                "count": { "type": "number", "number": 3 },
                "done": { "type": "checkbox", "checkbox": false },
                "due": { "type": "date", "date": { "start": "2024-05-01", "end": null } },
                "span": { "type": "date", "date": { "start": "2024-05-01", "end": "2024-05-03" } },
                "stage": { "type": "select", "select": { "name": "Draft" } },
                "parent": { "type": "relation", "relation": [{ "id": "p-9" }] },
                "owner": { "type": "people", "people": [] }
            }),
        );

        let props = decode(&remote).document.properties;

        assert_eq!(props.get("tags"), Some(&PropertyValue::tags(["a", "b"])));
        assert_eq!(props.get("count"), Some(&PropertyValue::Number(3.0)));
        assert_eq!(props.get("done"), Some(&PropertyValue::Bool(false)));
        assert_eq!(
            props.get("due"),
            Some(&PropertyValue::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()))
        );
        assert!(matches!(props.get("span"), Some(PropertyValue::Unmapped(_))));
        assert_eq!(props.get("stage"), Some(&PropertyValue::text("Draft")));
        assert_eq!(
            props.get("parent"),
            Some(&PropertyValue::Reference(LinkReference::new("", LinkTarget::Remote("p-9".into()))))
        );
        assert!(matches!(props.get("owner"), Some(PropertyValue::Unmapped(_))));
    }

    #[test]
    fn encode_keeps_existing_property_types_and_title() {
        let previous = page(
            Vec::new(),
            json!({ "stage": { "type": "select", "select": { "name": "Draft" } } }),
        );
        let document = Document::new(
            ContentTree::default(),
            PropertySet::new().with("stage", PropertyValue::text("Done")),
        );

        let encoded = encode(&document, None, Some(&previous));

        assert_eq!(encoded.title, "R1");
        assert_eq!(encoded.properties["stage"], json!({ "type": "select", "select": { "name": "Done" } }));
    }

    #[test]
    fn claim_roundtrips_through_properties() {
        let id = StableId::generate();
        let encoded = encode(&Document::default(), Some(id), None);

        let decoded = decode(&encoded);

        assert_eq!(decoded.claim, Some(id));
        assert!(decoded.document.properties.is_empty());
    }

    #[test]
    fn local_unmapped_content_travels_as_tagged_code() {
        let document = Document::new(
            ContentTree::new(vec![Block::Unmapped(Unmapped::Markdown("| a |\n|---|".into()))]),
            PropertySet::new(),
        );

        let encoded = encode(&document, None, None);

        assert_eq!(encoded.blocks[0]["code"][UNMAPPED_FIELD], "markdown");
        assert_eq!(decode(&encoded).document, document);
    }
}
