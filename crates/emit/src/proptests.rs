extern crate std;

use alloc::string::String;
use alloc::vec::Vec;

use proptest::prelude::*;

use crate::{Arena, NodeId};

/// Mirror of the arena used to compute the expected flush order.
enum MirrorPiece {
  Text(String),
  Child(usize),
}

#[derive(Default)]
struct Mirror {
  nodes: Vec<Vec<MirrorPiece>>,
}

impl Mirror {
  fn expected(&self, node: usize, out: &mut String) {
    for piece in &self.nodes[node] {
      match piece {
        MirrorPiece::Text(text) => out.push_str(text),
        MirrorPiece::Child(child) => self.expected(*child, out),
      }
    }
  }
}

#[derive(Clone, Debug)]
enum Op {
  Push(usize, String),
  AttachNew(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
  prop_oneof![
    (any::<usize>(), "[a-z ]{0,12}").prop_map(|(t, s)| Op::Push(t, s)),
    any::<usize>().prop_map(Op::AttachNew),
  ]
}

proptest! {
  // Any interleaving of appends and child splices flushes to the
  // depth-first concatenation, regardless of write order.
  #[test]
  fn flush_matches_depth_first_order(ops in proptest::collection::vec(op_strategy(), 0..64)) {
    let mut tree: Arena<()> = Arena::new();
    let root = tree.node();
    let mut ids: Vec<NodeId> = alloc::vec![root];
    let mut mirror = Mirror::default();
    mirror.nodes.push(Vec::new());

    for op in ops {
      match op {
        Op::Push(target, text) => {
          let target = target % ids.len();
          tree.push_str(ids[target], &text);
          mirror.nodes[target].push(MirrorPiece::Text(text));
        }
        Op::AttachNew(target) => {
          let target = target % ids.len();
          let child = tree.attach_new(ids[target]);
          ids.push(child);
          let index = mirror.nodes.len();
          mirror.nodes.push(Vec::new());
          mirror.nodes[target].push(MirrorPiece::Child(index));
        }
      }
    }

    let mut out = String::new();
    tree.flush(&(), root, &mut out).unwrap();
    let mut expected = String::new();
    mirror.expected(0, &mut expected);
    prop_assert_eq!(out, expected);
  }
}
