//! Human-readable diffs between two documents

use similar::TextDiff;

use crate::codec::markdown;
use crate::document::Document;

/// Line diff of two documents rendered as markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDiff {
    /// Unified diff text, empty when the renderings are identical.
    pub unified: String,
    /// Similarity ratio in `0.0..=1.0`.
    pub similarity: f32,
}

impl DocumentDiff {
    pub fn between(old_label: &str, old: &Document, new_label: &str, new: &Document) -> Self {
        let old_text = markdown::encode(old, None);
        let new_text = markdown::encode(new, None);
        Self::between_text(old_label, &old_text, new_label, &new_text)
    }

    pub fn between_text(old_label: &str, old: &str, new_label: &str, new: &str) -> Self {
        let diff = TextDiff::from_lines(old, new);
        let unified = if old == new {
            String::new()
        } else {
            diff.unified_diff()
                .context_radius(3)
                .header(old_label, new_label)
                .to_string()
        };
        Self {
            unified,
            similarity: diff.ratio(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertySet;
    use crate::tree::{Block, ContentTree};

    #[test]
    fn identical_documents_have_empty_diff() {
        let doc = Document::new(ContentTree::new(vec![Block::paragraph("same")]), PropertySet::new());
        let diff = DocumentDiff::between("remote", &doc, "local", &doc);
        assert!(diff.is_empty());
        assert_eq!(diff.similarity, 1.0);
    }

    #[test]
    fn diff_shows_both_versions() {
        let remote = Document::new(ContentTree::new(vec![Block::paragraph("Hello remote")]), PropertySet::new());
        let local = Document::new(ContentTree::new(vec![Block::paragraph("Hello local")]), PropertySet::new());

        let diff = DocumentDiff::between("remote", &remote, "local", &local);

        assert!(diff.unified.contains("--- remote"));
        assert!(diff.unified.contains("+++ local"));
        assert!(diff.unified.contains("-Hello remote"));
        assert!(diff.unified.contains("+Hello local"));
        assert!(diff.similarity < 1.0);
    }
}
