//! Append-only text nodes with deferred children.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write as _};

use crate::indent::IndentWriter;

/// Handle to a node owned by an [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodeId(usize);

/// Renders a lazily reserved node at flush time.
///
/// The callback receives the flush context and a fresh node to populate.
/// It runs at most once, and only if the flush walk reaches its position.
pub type LazyFn<C> = Box<dyn FnOnce(&C, &mut Node<C>)>;

enum Piece<C> {
  Text(String),
  Child(NodeId),
  Lazy(LazyFn<C>),
}

/// An append-only text node: literal spans interleaved with child links.
pub struct Node<C> {
  pieces: Vec<Piece<C>>,
}

impl<C> Node<C> {
  fn new() -> Self {
    Self { pieces: Vec::new() }
  }

  fn text_mut(&mut self) -> &mut String {
    if !matches!(self.pieces.last(), Some(Piece::Text(_))) {
      self.pieces.push(Piece::Text(String::new()));
    }
    let Some(Piece::Text(text)) = self.pieces.last_mut() else {
      unreachable!()
    };
    text
  }

  /// Append literal text.
  pub fn push_str(&mut self, text: &str) {
    self.text_mut().push_str(text);
  }

  /// Append formatted text.
  pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) {
    self
      .text_mut()
      .write_fmt(args)
      .expect("formatting into a String cannot fail");
  }

  /// Append a link to an existing node.
  ///
  /// Used by lazy render callbacks, which cannot allocate new nodes but may
  /// splice in nodes reserved earlier.
  pub fn push_child(&mut self, child: NodeId) {
    self.pieces.push(Piece::Child(child));
  }
}

/// Owns every node of one emission tree.
///
/// Nodes are created detached and become part of the output once attached
/// under the root (directly or transitively). Each node may be attached at
/// most one position.
pub struct Arena<C> {
  nodes: Vec<Node<C>>,
  attached: Vec<bool>,
}

impl<C> Default for Arena<C> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C> Arena<C> {
  #[must_use]
  pub fn new() -> Self {
    Self {
      nodes: Vec::new(),
      attached: Vec::new(),
    }
  }

  /// Allocate a new detached node.
  pub fn node(&mut self) -> NodeId {
    let id = NodeId(self.nodes.len());
    self.nodes.push(Node::new());
    self.attached.push(false);
    id
  }

  /// Append literal text to `node`.
  pub fn push_str(&mut self, node: NodeId, text: &str) {
    self.nodes[node.0].push_str(text);
  }

  /// Append formatted text to `node`.
  pub fn push_fmt(&mut self, node: NodeId, args: fmt::Arguments<'_>) {
    self.nodes[node.0].push_fmt(args);
  }

  /// Splice `child` into `parent` at the current append position.
  ///
  /// Text pushed to `child` later still appears at this position. Panics if
  /// `child` is already attached somewhere.
  pub fn attach(&mut self, parent: NodeId, child: NodeId) {
    assert!(parent != child, "node attached to itself");
    assert!(!self.attached[child.0], "node attached twice");
    self.attached[child.0] = true;
    self.nodes[parent.0].push_child(child);
  }

  /// Allocate a new node and splice it into `parent`.
  pub fn attach_new(&mut self, parent: NodeId) -> NodeId {
    let child = self.node();
    self.attach(parent, child);
    child
  }

  /// Reserve a position in `parent` for content rendered at flush time.
  pub fn attach_lazy(&mut self, parent: NodeId, render: LazyFn<C>) {
    self.nodes[parent.0].pieces.push(Piece::Lazy(render));
  }

  /// Walk the tree under `root` in order, streaming text through an
  /// [`IndentWriter`] into `out`.
  ///
  /// Lazy nodes are rendered as the walk reaches them and may themselves
  /// contain child links. Flushing is a one-shot operation: lazy callbacks
  /// are consumed.
  pub fn flush<W: fmt::Write>(&mut self, ctx: &C, root: NodeId, out: &mut W) -> fmt::Result {
    let mut writer = IndentWriter::new(out);
    // Explicit (node, piece index) stack; depth is bounded by tree shape,
    // not by the indent writer's brace limit.
    let mut stack = alloc::vec![(root.0, 0usize)];
    while let Some((node, idx)) = stack.pop() {
      if idx >= self.nodes[node].pieces.len() {
        continue;
      }
      stack.push((node, idx + 1));
      let piece = core::mem::replace(&mut self.nodes[node].pieces[idx], Piece::Text(String::new()));
      match piece {
        Piece::Text(text) => {
          writer.write(&text)?;
          self.nodes[node].pieces[idx] = Piece::Text(text);
        }
        Piece::Child(child) => {
          self.nodes[node].pieces[idx] = Piece::Child(child);
          stack.push((child.0, 0));
        }
        Piece::Lazy(render) => {
          let mut rendered = Node::new();
          render(ctx, &mut rendered);
          let child = NodeId(self.nodes.len());
          self.nodes.push(rendered);
          self.attached.push(true);
          self.nodes[node].pieces[idx] = Piece::Child(child);
          stack.push((child.0, 0));
        }
      }
    }
    writer.finish()
  }
}

#[cfg(test)]
mod tests {
  extern crate std;

  use alloc::boxed::Box;
  use alloc::string::String;

  use super::*;

  fn flushed(tree: &mut Arena<u32>, root: NodeId) -> String {
    let mut out = String::new();
    tree.flush(&0, root, &mut out).unwrap();
    out
  }

  #[test]
  fn plain_text_in_order() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    tree.push_str(root, "one ");
    tree.push_fmt(root, format_args!("{}", 2));
    tree.push_str(root, " three");
    assert_eq!(flushed(&mut tree, root), "one 2 three");
  }

  #[test]
  fn children_flush_depth_first() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    tree.push_str(root, "a");
    let mid = tree.attach_new(root);
    tree.push_str(root, "e");
    tree.push_str(mid, "b");
    let inner = tree.attach_new(mid);
    tree.push_str(mid, "d");
    tree.push_str(inner, "c");
    assert_eq!(flushed(&mut tree, root), "abcde");
  }

  #[test]
  fn detached_node_attached_late() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    let cond = tree.node();
    tree.push_str(cond, "while (len)");
    tree.push_str(root, "do {\n}");
    tree.push_str(root, " ");
    tree.attach(root, cond);
    tree.push_str(root, ";\n");
    assert_eq!(flushed(&mut tree, root), "do {\n} while (len);\n");
  }

  #[test]
  fn empty_child_is_invisible() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    tree.push_str(root, "x");
    let _empty = tree.attach_new(root);
    tree.push_str(root, "y");
    assert_eq!(flushed(&mut tree, root), "xy");
  }

  #[test]
  fn lazy_node_rendered_at_flush_with_context() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    tree.push_str(root, "[");
    tree.attach_lazy(
      root,
      Box::new(|ctx, node| node.push_fmt(format_args!("{}", ctx))),
    );
    tree.push_str(root, "]");
    let mut out = String::new();
    tree.flush(&7, root, &mut out).unwrap();
    assert_eq!(out, "[7]");
  }

  #[test]
  fn lazy_node_may_splice_reserved_children() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    let extra = tree.node();
    tree.push_str(extra, "mid");
    tree.attach_lazy(
      root,
      Box::new(move |_, node| {
        node.push_str("<");
        node.push_child(extra);
        node.push_str(">");
      }),
    );
    assert_eq!(flushed(&mut tree, root), "<mid>");
  }

  #[test]
  fn indentation_applied_across_nodes() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    tree.push_str(root, "f() {\n");
    let body = tree.attach_new(root);
    tree.push_str(root, "}\n");
    tree.push_str(body, "g();\n");
    assert_eq!(flushed(&mut tree, root), "f() {\n  g();\n}\n");
  }

  #[test]
  #[should_panic(expected = "attached twice")]
  fn double_attach_panics() {
    let mut tree: Arena<u32> = Arena::new();
    let root = tree.node();
    let child = tree.node();
    tree.attach(root, child);
    tree.attach(root, child);
  }
}
