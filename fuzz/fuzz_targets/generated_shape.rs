//! Fuzz target for whole-file generation.
//!
//! Builds valid phase lists from arbitrary parameters and checks structural
//! invariants of the emitted C: balanced braces and at most one definition
//! of each helper.

#![no_main]

use arbitrary::Arbitrary;
use codegen::{generate, AlgoPhase, Isa};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct PhaseParams {
  v_acc: u8,
  v_mult: u8,
  s_acc: u8,
  s_mult: u8,
  kernel: u16,
  use_end_ptr: bool,
}

#[derive(Arbitrary, Debug)]
struct Input {
  isa: u8,
  poly_index: u8,
  phases: Vec<PhaseParams>,
}

const POLYS: [u32; 5] = [
  codegen::poly::CRC32,
  codegen::poly::CRC32C,
  codegen::poly::CRC32K,
  codegen::poly::CRC32K2,
  codegen::poly::CRC32Q,
];

fuzz_target!(|input: Input| {
  let isa = match input.isa % 5 {
    0 => Isa::Neon,
    1 => Isa::NeonEor3,
    2 => Isa::Sse,
    3 => Isa::Avx512,
    _ => Isa::Avx512Vpclmulqdq,
  };
  let poly = POLYS[usize::from(input.poly_index) % POLYS.len()];

  let mut phases = Vec::new();
  for p in input.phases.iter().take(3) {
    let v_acc = u32::from(p.v_acc % 12);
    let s_acc = u32::from(p.s_acc % 8);
    let mut phase = AlgoPhase {
      v_acc,
      v_load: v_acc * u32::from(p.v_mult % 3 + 1),
      s_acc,
      s_load: s_acc * u32::from(p.s_mult % 3 + 1),
      kernel_size: u32::from(p.kernel),
      use_end_ptr: p.use_end_ptr,
    };
    if phase.v_acc == 0 && phase.s_acc == 0 {
      phase.s_acc = 1;
      phase.s_load = 1;
    }
    phases.push(phase);
  }

  let source = generate(isa, poly, &phases, "/* fuzz */\n");

  let mut depth: i64 = 0;
  for c in source.chars() {
    match c {
      '{' => depth += 1,
      '}' => depth -= 1,
      _ => {}
    }
    assert!(depth >= 0, "closing brace before opening");
  }
  assert_eq!(depth, 0, "unbalanced braces");

  for needle in ["uint32_t crc32_impl", "clmul_lo_e(", "static uint32_t xnmodp"] {
    let definitions = source
      .lines()
      .filter(|line| line.starts_with("CRC_AINLINE") || line.starts_with("static"))
      .filter(|line| line.contains(needle))
      .count();
    assert!(definitions <= 1, "{needle} defined more than once");
  }
});
