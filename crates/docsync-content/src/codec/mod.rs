//! Converters between native documents and the neutral [`Document`]
//!
//! Each direction is a near-inverse: `decode(encode(doc))` gives back a
//! document equal to `doc` after normalization, even when the native text
//! differs byte for byte.

pub mod frontmatter;
pub mod inline;
pub mod link_url;
pub mod markdown;
pub mod remote;

pub use markdown::MarkdownCodec;
pub use remote::{RemoteCodec, RemotePage};

use crate::document::{Decoded, Document};
use crate::id::StableId;

/// Converter contract for one side's native format.
pub trait Codec: Send + Sync {
    type Native;

    /// Decode native content. Never fails: unsupported or malformed input
    /// becomes unmapped blocks plus conversion notes.
    fn decode(&self, native: &Self::Native) -> Decoded;

    /// Encode a document, writing `claim` into the native form.
    ///
    /// `previous` is the current native version, if any, for details the
    /// neutral model does not carry (remote titles and property types).
    fn encode(&self, document: &Document, claim: Option<StableId>, previous: Option<&Self::Native>)
    -> Self::Native;
}
