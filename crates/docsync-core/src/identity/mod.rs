//! Identity & link resolution
//!
//! Every pair is addressed by a [`StableId`](docsync_content::StableId)
//! that neither side owns. The [`IdentityMap`] answers "which pair is this
//! native reference?" for one cycle; the [`ReferenceRegistry`] remembers
//! references that could not be answered yet and targets that are gone.

mod map;
mod registry;
mod resolver;

pub use map::{Binding, IdentityMap};
pub use registry::{NativeRef, PendingReference, ReferenceRegistry, Tombstone};
pub use resolver::{Direction, LinkResolver, Resolution};
