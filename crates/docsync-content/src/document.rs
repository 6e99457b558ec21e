//! Documents as the engine sees them: tree, properties, and fingerprint

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::StableId;
use crate::property::{Property, PropertySet};
use crate::tree::{Block, ContentTree};

/// Body and properties of one document, independent of either side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub tree: ContentTree,
    #[serde(default)]
    pub properties: PropertySet,
}

impl Document {
    pub fn new(tree: ContentTree, properties: PropertySet) -> Self {
        Self { tree, properties }
    }

    pub fn normalize(self) -> Self {
        Self {
            tree: self.tree.normalize(),
            properties: self.properties,
        }
    }

    /// Digest of the normalized tree and the name-sorted properties.
    pub fn fingerprint(&self) -> Fingerprint {
        #[derive(Serialize)]
        struct Canonical<'a> {
            blocks: &'a [Block],
            properties: Vec<&'a Property>,
        }

        let tree = self.tree.clone().normalize();
        let canonical = Canonical {
            blocks: &tree.blocks,
            properties: self.properties.sorted(),
        };
        // Serializing plain data into a Vec cannot fail
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Fingerprint(docsync_fs::compute_bytes_checksum(&bytes))
    }
}

/// Deterministic content digest, `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First hex characters, for display.
    pub fn short(&self) -> &str {
        let hex = self.0.strip_prefix(docsync_fs::checksum::PREFIX).unwrap_or(&self.0);
        &hex[..hex.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something a codec could not map and preserved opaquely instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionNote {
    pub location: String,
    pub message: String,
}

impl ConversionNote {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConversionNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Output of decoding one native document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub document: Document,
    /// Stable id claimed by the native document, if any.
    pub claim: Option<StableId>,
    pub notes: Vec<ConversionNote>,
}

impl Decoded {
    pub fn is_degraded(&self) -> bool {
        !self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyValue;
    use crate::tree::{Marks, Span};

    #[test]
    fn fingerprint_ignores_property_order() {
        let tree = ContentTree::new(vec![Block::paragraph("Hello")]);
        let a = Document::new(
            tree.clone(),
            PropertySet::new()
                .with("a", PropertyValue::Bool(true))
                .with("b", PropertyValue::Number(2.0)),
        );
        let b = Document::new(
            tree,
            PropertySet::new()
                .with("b", PropertyValue::Number(2.0))
                .with("a", PropertyValue::Bool(true)),
        );
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_span_fragmentation() {
        let whole = Document::new(ContentTree::new(vec![Block::paragraph("Hello")]), PropertySet::new());
        let split = Document::new(
            ContentTree::new(vec![Block::Paragraph {
                spans: vec![Span::plain("Hel"), Span::plain("lo")],
            }]),
            PropertySet::new(),
        );
        assert_eq!(whole.fingerprint(), split.fingerprint());
    }

    #[test]
    fn fingerprint_sees_marks() {
        let plain = Document::new(ContentTree::new(vec![Block::paragraph("x")]), PropertySet::new());
        let bold = Document::new(
            ContentTree::new(vec![Block::Paragraph {
                spans: vec![Span::marked("x", Marks::bold())],
            }]),
            PropertySet::new(),
        );
        assert_ne!(plain.fingerprint(), bold.fingerprint());
        assert!(plain.fingerprint().as_str().starts_with("sha256:"));
        assert_eq!(plain.fingerprint().short().len(), 12);
    }
}
