//! Neutral content model and converters for docsync
//!
//! Both the remote page store and the local markdown vault are decoded
//! into a [`Document`] (a [`ContentTree`] plus a [`PropertySet`]) and
//! encoded back out of it. Change detection works on the document's
//! [`Fingerprint`], never on native bytes or timestamps.

pub mod codec;
pub mod diff;
pub mod document;
pub mod error;
pub mod id;
pub mod property;
pub mod tree;

pub use codec::{Codec, MarkdownCodec, RemoteCodec, RemotePage};
pub use diff::DocumentDiff;
pub use document::{ConversionNote, Decoded, Document, Fingerprint};
pub use error::{Error, Result};
pub use id::{CLAIM_KEY, StableId};
pub use property::{Property, PropertySet, PropertyValue};
pub use tree::{Block, ContentTree, EmbedKind, LinkReference, LinkTarget, ListKind, Marks, Span, Unmapped};
