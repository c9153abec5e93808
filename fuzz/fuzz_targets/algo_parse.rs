//! Fuzz target for the algorithm-string parser.
//!
//! Tests that:
//! - No panics on arbitrary input
//! - Accepted phases satisfy the documented invariants
//! - Parsing is deterministic

#![no_main]

use codegen::{algo, Isa};
use libfuzzer_sys::fuzz_target;

const ISAS: [Isa; 6] = [
  Isa::None,
  Isa::Neon,
  Isa::NeonEor3,
  Isa::Sse,
  Isa::Avx512,
  Isa::Avx512Vpclmulqdq,
];

fuzz_target!(|text: &str| {
  for isa in ISAS {
    let first = algo::parse(text, isa);
    let second = algo::parse(text, isa);
    assert_eq!(first, second, "parse must be deterministic");

    let Ok(phases) = first else { continue };
    assert!(!phases.is_empty(), "accepted input must yield a phase");
    for phase in phases {
      assert!(phase.s_acc != 0 || phase.v_acc != 0, "empty phase not defaulted");
      if phase.s_acc != 0 {
        assert_eq!(phase.s_load % phase.s_acc, 0, "scalar divisibility");
      }
      if phase.v_acc != 0 {
        assert_eq!(phase.v_load % phase.v_acc, 0, "vector divisibility");
      }
      if isa == Isa::None {
        assert_eq!(phase.v_load, 0, "vectors accepted without an ISA");
        assert!(phase.s_acc <= 1, "multiple scalars accepted without an ISA");
      }
    }
  }
});
