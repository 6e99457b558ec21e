//! Basic usage example for docsync-content

use docsync_content::codec::{markdown, remote};
use docsync_content::{DocumentDiff, StableId};

fn main() {
    let note = r#"---
status: draft
tags: [planning, q3]
---

# Roadmap

- [ ] Ship the importer
- [x] Write the design doc

See [[Meeting Notes]] and [the tracker](https://example.com/tracker).
"#;

    // Decode a vault note into the neutral document
    let decoded = markdown::decode(note);
    println!("Blocks: {}", decoded.document.tree.blocks.len());
    println!("Properties: {}", decoded.document.properties.len());
    println!("Fingerprint: {}", decoded.document.fingerprint());
    for note in &decoded.notes {
        println!("Conversion note: {note}");
    }

    // Encode it as a remote page claiming a stable id
    let id = StableId::generate();
    let page = remote::encode(&decoded.document, Some(id), None);
    println!("Remote blocks: {}", page.blocks.len());

    // Decoding the page again gives the same content back
    let back = remote::decode(&page);
    assert_eq!(back.claim, Some(id));
    println!("Same fingerprint after round trip: {}", back.document.fingerprint() == decoded.document.fingerprint());

    // Render both sides as markdown and diff them
    let mut edited = back.document.clone();
    edited.tree.blocks.truncate(2);
    let diff = DocumentDiff::between("before", &decoded.document, "after", &edited);
    println!("{}", diff.unified);
}
