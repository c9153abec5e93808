//! Deferred text emission for code generators.
//!
//! A generator often has to decide "does this helper get emitted?" long
//! after it has started writing the function body that consumes it. This
//! crate provides an append-only text [`Node`] whose content is a list of
//! literal spans interleaved with links to child nodes; children can be
//! filled in at any later time, and a node can be reserved as a lazy
//! callback whose content is only rendered if the flush walk reaches it.
//!
//! Flushing is a pre-order depth-first walk of the node tree. Literal text
//! is streamed through an [`IndentWriter`] that re-indents `{`/`}`
//! delimited blocks, so emitters write everything flush-left.
//!
//! # Ordering
//!
//! Text written to a node before an [`Arena::attach_new`] call appears in
//! the output before any text written to the returned child, and the
//! child's text appears before text written to the parent afterwards:
//!
//! ```
//! use emit::Arena;
//!
//! let mut tree: Arena<()> = Arena::new();
//! let root = tree.node();
//! tree.push_str(root, "a");
//! let child = tree.attach_new(root);
//! tree.push_str(root, "c");
//! tree.push_str(child, "b"); // late write, early position
//!
//! let mut out = String::new();
//! tree.flush(&(), root, &mut out).unwrap();
//! assert_eq!(out, "abc");
//! ```

#![no_std]

extern crate alloc;

mod indent;
#[cfg(test)]
mod proptests;
mod tree;

pub use indent::IndentWriter;
pub use tree::{Arena, LazyFn, Node, NodeId};
