//! Structural and golden tests over generated C source.

use codegen::{algo, generate, poly, Isa};

fn gen(isa: Isa, polynomial: u32, algorithm: &str) -> String {
  let phases = if algorithm.is_empty() {
    Vec::new()
  } else {
    algo::parse(algorithm, isa).unwrap()
  };
  generate(isa, polynomial, &phases, "")
}

const SIMD_ISAS: [Isa; 5] = [
  Isa::Neon,
  Isa::NeonEor3,
  Isa::Sse,
  Isa::Avx512,
  Isa::Avx512Vpclmulqdq,
];

fn config_matrix() -> Vec<(Isa, u32, &'static str)> {
  let mut configs = Vec::new();
  for isa in SIMD_ISAS {
    for polynomial in [poly::CRC32, poly::CRC32C, poly::CRC32K] {
      for algorithm in ["s1", "s3", "v4e", "v1s1", "v3_s1", "v9s3x2e_s3", "v4s3x3k4096e_s1", "s3k4096"] {
        configs.push((isa, polynomial, algorithm));
      }
    }
  }
  for algorithm in ["", "s1", "s1x4"] {
    configs.push((Isa::None, poly::CRC32, algorithm));
    configs.push((Isa::None, poly::CRC32K, algorithm));
  }
  configs
}

fn assert_balanced_braces(source: &str, context: &str) {
  let mut depth: i64 = 0;
  for c in source.chars() {
    match c {
      '{' => depth += 1,
      '}' => depth -= 1,
      _ => {}
    }
    assert!(depth >= 0, "stray closing brace in {context}");
  }
  assert_eq!(depth, 0, "unbalanced braces in {context}");
}

#[test]
fn braces_balanced_across_configs() {
  for (isa, polynomial, algorithm) in config_matrix() {
    let source = gen(isa, polynomial, algorithm);
    assert_balanced_braces(&source, &format!("{isa:?}/{polynomial:#x}/{algorithm}"));
  }
}

#[test]
fn no_identifier_defined_twice() {
  for (isa, polynomial, algorithm) in config_matrix() {
    let source = gen(isa, polynomial, algorithm);
    let context = format!("{isa:?}/{polynomial:#x}/{algorithm}");
    for needle in [
      "uint32_t crc32_impl(",
      " clmul_lo(",
      " clmul_hi(",
      " clmul_lo_e(",
      " clmul_hi_e(",
      " clmul_scalar(",
      "static uint32_t xnmodp(",
      " crc_shift(",
      " crc_u8(",
      " crc_u32(",
      " crc_u64(",
      "static const uint32_t g_crc_table",
    ] {
      let definitions = source
        .lines()
        .filter(|line| {
          line.starts_with("CRC_AINLINE")
            || line.starts_with("CRC_EXPORT")
            || line.starts_with("static")
        })
        .filter(|line| line.contains(needle))
        .count();
      assert!(definitions <= 1, "{needle} defined {definitions} times in {context}");
    }
    for needle in ["#define clmul_lo(", "#define clmul_hi("] {
      let defines = source.lines().filter(|line| line.starts_with(needle)).count();
      assert!(defines <= 1, "{needle} repeated in {context}");
    }
  }
}

#[test]
fn every_emitted_header_is_used() {
  let witnesses: [(&str, &[&str]); 5] = [
    ("#include <arm_acle.h>", &["__crc32"]),
    (
      "#include <arm_neon.h>",
      &["vld1q_u64", "vmovq_n_u64", "vmull_p8", "veorq_u64", "veor3q_u64", "vmov_n_u64"],
    ),
    (
      "#include <nmmintrin.h>",
      &["_mm_crc32_", "_mm_extract_epi32", "_mm_extract_epi64"],
    ),
    ("#include <wmmintrin.h>", &["_mm_clmulepi64_si128"]),
    (
      "#include <immintrin.h>",
      &["_mm_ternarylogic_epi64", "_mm512_"],
    ),
  ];
  for (isa, polynomial, algorithm) in config_matrix() {
    let source = gen(isa, polynomial, algorithm);
    let context = format!("{isa:?}/{polynomial:#x}/{algorithm}");
    for (header, tokens) in witnesses {
      if source.contains(header) {
        assert!(
          tokens.iter().any(|token| source.contains(token)),
          "{header} emitted but unused in {context}"
        );
      }
    }
  }
}

#[test]
fn banner_is_emitted_verbatim_first() {
  let source = generate(Isa::Sse, poly::CRC32C, &[], "/* invocation */\n");
  assert!(source.starts_with("/* invocation */\n#include <stddef.h>\n"));
}

#[test]
fn table_grows_to_widest_request() {
  let source = gen(Isa::None, poly::CRC32, "");
  // crc_u8 needs one plane, the 4-byte tail loop widens it to four.
  assert!(source.contains("static const uint32_t g_crc_table[4][256] = {"));
  // First plane, entry 1 of the CRC-32 byte table.
  assert!(source.contains("0x77073096"));
  // Table-driven helpers, not hardware ones.
  assert!(source.contains("CRC_AINLINE uint32_t crc_u8(uint32_t crc, uint8_t val) {"));
  assert!(source.contains("return (crc >> 8) ^ g_crc_table[0][(crc & 0xFF) ^ val];"));
}

#[test]
fn non_hardware_polynomial_takes_table_path() {
  let source = gen(Isa::None, poly::CRC32K, "s1");
  assert!(source.contains("g_crc_table"));
  assert!(!source.contains("__crc32"));
  assert!(!source.contains("_mm_crc32"));
}

#[test]
fn hardware_crc_binding_suppresses_helpers() {
  let source = gen(Isa::Sse, poly::CRC32C, "v4e");
  assert!(source.contains("#include <nmmintrin.h>"));
  assert!(source.contains("_mm_crc32_u64"));
  assert!(!source.contains("g_crc_table"));
  assert!(!source.contains("crc_u8"));

  // The same ISA without hardware support for the polynomial falls back to
  // Barrett reduction helpers.
  let barrett = gen(Isa::Sse, poly::CRC32K, "v4e");
  assert!(barrett.contains("CRC_AINLINE uint32_t crc_u8"));
  assert!(barrett.contains("_mm_clmulepi64_si128(b, k, 0x10);"));
  assert!(barrett.contains("g_crc_table"));
}

#[test]
fn end_pointer_controls_loop_shape() {
  let with_end = gen(Isa::Sse, poly::CRC32C, "v4e");
  assert!(with_end.contains("const char* end = buf + len;"));
  assert!(with_end.contains("while (buf <= limit) {"));

  let without_end = gen(Isa::Sse, poly::CRC32C, "s3");
  assert!(without_end.contains("do {"));
  assert!(without_end.contains("} while (len >= 32);"));
}

#[test]
fn fixed_kernel_uses_iteration_counter() {
  let source = gen(Isa::Sse, poly::CRC32C, "s3k4096");
  // 170 iterations of 24 bytes plus an 8-byte merge tail.
  assert!(source.contains("while (len >= 4088) {"));
  assert!(source.contains("uint32_t kitrs = 170;"));
  assert!(source.contains("} while (--kitrs);"));
  assert!(source.contains("const size_t klen = 1360;"));
  // Fixed spans merge through precomputed constants, not runtime shifts.
  assert!(source.contains("vc0 = clmul_scalar(crc0, 0x"));
  assert!(!source.contains("crc_shift"));
  assert!(source.contains("len -= 4088;"));
}

#[test]
fn initial_crc_lands_on_vector_or_scalar_chain() {
  // Vector-only phase: the incoming CRC folds into x0.
  let vectors_only = gen(Isa::Sse, poly::CRC32C, "v4e");
  assert!(vectors_only.contains("x0 = _mm_xor_si128(_mm_cvtsi32_si128(crc0), x0);"));
  assert!(!vectors_only.contains("crc0 = 0;"));

  // Mixed phase with a scalar tail: the CRC folds into x0 and the scalar
  // chain restarts from zero.
  let with_tail = gen(Isa::Sse, poly::CRC32C, "v1s1");
  assert!(with_tail.contains("x0 = _mm_xor_si128(_mm_cvtsi32_si128(crc0), x0);"));
  assert!(with_tail.contains("crc0 = 0;"));
  // One scalar accumulator covered by the tail merges nothing.
  assert!(with_tail.contains("vc = 0;"));

  // Mixed phase without a tail: the CRC stays on the scalar chain.
  let no_tail = gen(Isa::NeonEor3, poly::CRC32, "v9s3x2e");
  assert!(!no_tail.contains("veorq_u64((uint64x2_t){crc0, 0}, x0)"));
}

#[test]
fn avx512_vpclmulqdq_reduces_512_to_128() {
  let source = gen(Isa::Avx512Vpclmulqdq, poly::CRC32C, "v4e");
  assert!(source.contains("#include <immintrin.h>"));
  assert!(source.contains("_mm512_loadu_si512"));
  assert!(source.contains("/* Reduce 512 bits to 128 bits. */"));
  assert!(source.contains("_mm512_broadcast_i32x4"));
  assert!(source.contains("z0 = _mm_xor_si128(z0, _mm512_extracti32x4_epi32(x0, 3));"));
  assert!(source.contains("#define clmul_lo(a, b) (_mm512_clmulepi64_epi128((a), (b), 0))"));
}

#[test]
fn no_phases_emits_only_alignment_and_tail_loops() {
  let source = gen(Isa::None, poly::CRC32, "");
  assert!(!source.contains("/* Main loop. */"));
  assert!(source.contains("for (; len >= 4; buf += 4, len -= 4) {"));
  assert!(source.contains("for (; len; --len) {"));
  assert!(source.contains("return ~crc0;"));
}

#[test]
fn neon_uses_fused_multiply_xor() {
  let source = gen(Isa::Neon, poly::CRC32, "v4e");
  assert!(source.contains("CRC_AINLINE uint64x2_t clmul_lo_e(uint64x2_t a, uint64x2_t b, uint64x2_t c) {"));
  assert!(source.contains("y0 = clmul_lo_e(x0, k, "));
  assert!(source.contains("x0 = clmul_hi_e(x0, k, y0);"));
  // The plain (unfused) helpers belong to the eor3 flavour only.
  assert!(!source.contains("clmul_lo(x0, k)"));
}
