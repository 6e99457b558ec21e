//! Conversions between the two native formats through the shared tree

use docsync_content::codec::{markdown, remote};
use docsync_content::{
    Block, Codec, ContentTree, Document, LinkReference, LinkTarget, ListKind, MarkdownCodec, PropertySet,
    PropertyValue, RemoteCodec, RemotePage, Span, StableId, Unmapped,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};

fn text(content: &str) -> Value {
    json!({ "type": "text", "text": { "content": content }, "plain_text": content })
}

fn remote_page(blocks: Vec<Value>, properties: Value) -> RemotePage {
    RemotePage {
        title: "R1".into(),
        blocks,
        properties: properties.as_object().cloned().unwrap_or_default(),
    }
}

/// Decode with one codec and re-encode with another, as the engine does.
fn convert<A: Codec, B: Codec>(from: &A, to: &B, native: &A::Native) -> B::Native {
    let decoded = from.decode(native);
    to.encode(&decoded.document, decoded.claim, None)
}

#[test]
fn remote_page_becomes_note_with_frontmatter() {
    let page = remote_page(
        vec![json!({ "type": "paragraph", "paragraph": { "rich_text": [text("Hello")] } })],
        json!({ "tags": { "type": "multi_select", "multi_select": [{ "name": "a" }] } }),
    );

    let note = convert(&RemoteCodec, &MarkdownCodec, &page);

    assert_eq!(note, "---\ntags:\n- a\n---\n\nHello\n");
}

#[test]
fn note_becomes_remote_page() {
    let note = "---\nstatus: done\n---\n\n# Plan\n\n- [x] ship it\n- [ ] tell [[Team]]\n";

    let page = convert(&MarkdownCodec, &RemoteCodec, &note.to_string());
    let back = remote::decode(&page).document;

    assert_eq!(back.properties.get("status"), Some(&PropertyValue::text("done")));
    assert_eq!(
        back.tree.blocks,
        vec![
            Block::heading(1, "Plan"),
            Block::ListItem {
                kind: ListKind::Todo { checked: true },
                depth: 0,
                spans: vec![Span::plain("ship it")],
            },
            Block::ListItem {
                kind: ListKind::Todo { checked: false },
                depth: 0,
                spans: vec![
                    Span::plain("tell "),
                    Span::Link(LinkReference::new("Team", LinkTarget::Local("Team".into()))),
                ],
            },
        ]
    );
}

#[test]
fn local_only_constructs_survive_a_remote_round_trip() {
    let note = "| a | b |\n|---|---|\n| 1 | 2 |\n\n<details>open</details>\n";

    let decoded = markdown::decode(note);
    assert!(decoded.is_degraded());
    assert!(decoded.document.tree.blocks.iter().all(Block::is_unmapped));

    let page = remote::encode(&decoded.document, None, None);
    let back = remote::decode(&page);

    assert_eq!(markdown::encode(&back.document, None), note);
}

#[test]
fn remote_only_blocks_survive_a_local_round_trip() {
    let callout = json!({
        "type": "callout",
        "callout": { "icon": { "emoji": "!" }, "rich_text": [text("careful")] }
    });
    let page = remote_page(vec![callout.clone()], json!({}));

    let note = convert(&RemoteCodec, &MarkdownCodec, &page);
    assert!(note.contains("<!-- docsync:unmapped"), "{note}");

    let back = convert(&MarkdownCodec, &RemoteCodec, &note);
    assert_eq!(back.blocks, vec![callout]);
}

#[test]
fn claim_travels_in_both_directions() {
    let id = StableId::generate();
    let doc = Document::new(ContentTree::new(vec![Block::paragraph("body")]), PropertySet::default());

    let note = markdown::encode(&doc, Some(id));
    assert!(note.starts_with(&format!("---\ndocsync_id: {id}\n---\n")), "{note}");

    let page = convert(&MarkdownCodec, &RemoteCodec, &note);
    assert_eq!(remote::decode(&page).claim, Some(id));
    assert!(remote::decode(&page).document.properties.get("docsync_id").is_none());
}

#[rstest]
#[case::bold("**loud**")]
#[case::nested("~~**_all_**~~")]
#[case::code("use `cargo` here")]
#[case::wikilink_with_alias("see [[Other Note|the other one]]")]
#[case::url("read [the docs](https://example.com/docs)")]
#[case::escaped("1\\. not a list \\*nor emphasis\\*")]
fn paragraph_formatting_is_stable_across_codecs(#[case] line: &str) {
    let note = format!("{line}\n");

    let page = convert(&MarkdownCodec, &RemoteCodec, &note);
    let back = convert(&RemoteCodec, &MarkdownCodec, &page);

    assert_eq!(back, note);
}

#[rstest]
#[case::date("due: 2024-03-01\n", PropertyValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))]
#[case::number("count: 3\n", PropertyValue::Number(3.0))]
#[case::flag("draft: true\n", PropertyValue::Bool(true))]
#[case::tags("tags:\n- b\n- a\n", PropertyValue::tags(["a", "b"]))]
#[case::reference(
    "parent: '[[Index]]'\n",
    PropertyValue::Reference(LinkReference::new("Index", LinkTarget::Local("Index".into())))
)]
fn frontmatter_values_keep_their_type_remotely(#[case] yaml: &str, #[case] expected: PropertyValue) {
    let note = format!("---\n{yaml}---\n");
    let name = yaml.split(':').next().unwrap_or_default();

    let page = convert(&MarkdownCodec, &RemoteCodec, &note);
    let decoded = remote::decode(&page);

    assert_eq!(decoded.document.properties.get(name), Some(&expected));
}

#[test]
fn existing_remote_property_types_are_reused() {
    let previous = remote_page(
        vec![],
        json!({ "stage": { "type": "select", "select": { "name": "draft" } } }),
    );
    let doc = Document::new(
        ContentTree::default(),
        PropertySet::default().with("stage", PropertyValue::text("review")),
    );

    let page = RemoteCodec.encode(&doc, None, Some(&previous));

    assert_eq!(page.title, "R1");
    assert_eq!(page.properties["stage"]["type"], "select");
    assert_eq!(page.properties["stage"]["select"]["name"], "review");
}

#[test]
fn unmapped_frontmatter_is_preserved() {
    let note = "---\n- not\n- a mapping\n---\n\nbody\n";

    let decoded = markdown::decode(note);

    assert!(decoded.is_degraded());
    assert!(matches!(
        decoded.document.tree.blocks.first(),
        Some(Block::Unmapped(Unmapped::Frontmatter(_)))
    ));
    assert_eq!(markdown::encode(&decoded.document, None), note);
}
