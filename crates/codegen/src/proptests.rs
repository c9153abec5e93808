extern crate std;

use alloc::format;

use proptest::prelude::*;

use crate::{algo, generate, gf2, poly, AlgoPhase, Isa};

fn isa_strategy() -> impl Strategy<Value = Isa> {
  prop_oneof![
    Just(Isa::Neon),
    Just(Isa::NeonEor3),
    Just(Isa::Sse),
    Just(Isa::Avx512),
    Just(Isa::Avx512Vpclmulqdq),
  ]
}

fn poly_strategy() -> impl Strategy<Value = u32> {
  prop_oneof![
    Just(poly::CRC32),
    Just(poly::CRC32C),
    Just(poly::CRC32K),
    Just(poly::CRC32K2),
    Just(poly::CRC32Q),
  ]
}

fn phase_strategy() -> impl Strategy<Value = AlgoPhase> {
  (
    0u32..8,
    1u32..4,
    0u32..6,
    1u32..4,
    prop_oneof![Just(0u32), 64u32..16384],
    any::<bool>(),
  )
    .prop_map(|(v_acc, v_mult, s_acc, s_mult, kernel_size, use_end_ptr)| {
      let mut phase = AlgoPhase {
        v_acc,
        v_load: v_acc * v_mult,
        s_acc,
        s_load: s_acc * s_mult,
        kernel_size,
        use_end_ptr,
      };
      if phase.v_acc == 0 && phase.s_acc == 0 {
        phase.s_acc = 1;
        phase.s_load = 1;
      }
      phase
    })
}

fn balanced(source: &str) -> bool {
  let mut depth: i64 = 0;
  for c in source.chars() {
    match c {
      '{' => depth += 1,
      '}' => depth -= 1,
      _ => {}
    }
    if depth < 0 {
      return false;
    }
  }
  depth == 0
}

proptest! {
  // Emission is total over validated input: any phase list the parser could
  // accept generates brace-balanced C with exactly one exported function.
  #[test]
  fn generation_is_total_and_balanced(
    isa in isa_strategy(),
    poly in poly_strategy(),
    phases in proptest::collection::vec(phase_strategy(), 0..4),
  ) {
    let source = generate(isa, poly, &phases, "");
    prop_assert!(balanced(&source));
    prop_assert_eq!(
      source.matches("CRC_EXPORT uint32_t crc32_impl(").count(),
      1
    );
    let expected_suffix = "return ~crc0;\n}\n";
    prop_assert!(source.ends_with(expected_suffix));
    prop_assert_eq!(&generate(isa, poly, &phases, ""), &source);
  }

  // A phase written as single v/s terms round-trips through the parser.
  #[test]
  fn algo_text_round_trips(
    v_acc in 1u32..20,
    v_mult in 1u32..5,
    s_acc in 1u32..20,
    s_mult in 1u32..5,
    kernel in 0u32..65536,
    end_ptr in any::<bool>(),
  ) {
    let mut text = format!("v{v_acc}x{v_mult}s{s_acc}x{s_mult}");
    if kernel != 0 {
      text.push_str(&format!("k{kernel}"));
    }
    if end_ptr {
      text.push('e');
    }
    let phases = algo::parse(&text, Isa::Sse).unwrap();
    prop_assert_eq!(phases.len(), 1);
    prop_assert_eq!(
      phases[0],
      AlgoPhase {
        v_acc,
        v_load: v_acc * v_mult,
        s_acc,
        s_load: s_acc * s_mult,
        kernel_size: kernel,
        use_end_ptr: end_ptr,
      }
    );
  }

  // Underscores split phases; junk characters never panic the parser.
  #[test]
  fn parser_never_panics(text in "[vskxe_0-9q ]{0,40}") {
    let _ = algo::parse(&text, Isa::Sse);
    let _ = algo::parse(&text, Isa::None);
  }

  // The log-time exponentiation agrees with the linear reference at
  // arbitrary exponents, not just small ones.
  #[test]
  fn x_n_mod_p_matches_reference_at_random_exponents(
    poly in poly_strategy(),
    n in 0u64..100_000,
  ) {
    let mut reference: u32 = 0x8000_0000;
    let mut i = 0;
    while i < n {
      reference = (reference >> 1) ^ ((reference & 1) * poly);
      i += 1;
    }
    prop_assert_eq!(gf2::x_n_mod_p(poly, n), reference);
  }
}
