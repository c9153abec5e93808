//! Per-ISA emission primitives: headers, carry-less multiply helpers,
//! vector loads, fold constants, and XOR reduction trees.

use emit::NodeId;

use super::{put, Generator};
use crate::gf2;
use crate::isa::Isa;

/// Intrinsic headers the emitted file may need.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Header {
  ArmAcle,
  ArmNeon,
  Nmmintrin,
  Immintrin,
  Wmmintrin,
}

impl Header {
  const fn name(self) -> &'static str {
    match self {
      Self::ArmAcle => "arm_acle",
      Self::ArmNeon => "arm_neon",
      Self::Nmmintrin => "nmmintrin",
      Self::Immintrin => "immintrin",
      Self::Wmmintrin => "wmmintrin",
    }
  }

  const fn bit(self) -> u32 {
    1 << self as u32
  }
}

/// Which half of the 128-bit carry-less product a helper computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClmulHalf {
  Lo,
  Hi,
}

impl ClmulHalf {
  const fn name(self) -> &'static str {
    match self {
      Self::Lo => "lo",
      Self::Hi => "hi",
    }
  }

  const fn is_lo(self) -> u32 {
    matches!(self, Self::Lo) as u32
  }
}

/// Third operand of a vector fold step.
pub(crate) enum Addend<'a> {
  /// A vector load from `base + offset`.
  Load { base: &'a str, offset: u32 },
  /// Another accumulator register, `x{index}`.
  Acc(u32),
}

impl Generator {
  pub(crate) fn require_header(&mut self, header: Header) {
    if self.once.headers & header.bit() != 0 {
      return;
    }
    self.once.headers |= header.bit();
    let includes = self.includes;
    put!(self, includes, "#include <{}.h>\n", header.name());
  }

  /// Emit the `clmul_lo`/`clmul_hi` helper for `isa`, once per pair.
  ///
  /// On plain NEON the helpers are the fused `_e` variants that fold a
  /// trailing XOR into the same asm block.
  pub(crate) fn require_clmul(&mut self, half: ClmulHalf, isa: Isa) {
    let flag = 1u32 << (half.is_lo() + 2 * isa as u32);
    if self.once.clmul & flag != 0 {
      return;
    }
    self.once.clmul |= flag;
    let which = half.name();
    let suffix = if half.is_lo() != 0 { "" } else { "2" };
    let lanes = 2 - half.is_lo();
    let b = self.out;
    match isa {
      Isa::Neon => {
        self.require_header(Header::ArmNeon);
        let vt = self.cfg.vector_type;
        put!(
          self,
          b,
          "CRC_AINLINE {vt} clmul_{which}_e({vt} a, {vt} b, {vt} c) {{\n"
        );
        put!(self, b, "{vt} r;\n");
        put!(
          self,
          b,
          "__asm(\"pmull{suffix} %0.1q, %2.{lanes}d, %3.{lanes}d\\neor %0.16b, %0.16b, %1.16b\\n\" : \"=w\"(r), \"+w\"(c) : \"w\"(a), \"w\"(b));\n"
        );
        self.tree.push_str(b, "return r;\n}\n\n");
      }
      Isa::NeonEor3 => {
        self.require_header(Header::ArmNeon);
        let vt = self.cfg.vector_type;
        put!(self, b, "CRC_AINLINE {vt} clmul_{which}({vt} a, {vt} b) {{\n");
        put!(self, b, "{vt} r;\n");
        put!(
          self,
          b,
          "__asm(\"pmull{suffix} %0.1q, %1.{lanes}d, %2.{lanes}d\\n\" : \"=w\"(r) : \"w\"(a), \"w\"(b));\n"
        );
        self.tree.push_str(b, "return r;\n}\n\n");
      }
      Isa::Sse | Isa::Avx512 => {
        self.require_header(Header::Wmmintrin);
        put!(
          self,
          b,
          "#define clmul_{which}(a, b) (_mm_clmulepi64_si128((a), (b), {})){}",
          0x11 * (1 - half.is_lo()),
          if half.is_lo() != 0 { "\n" } else { "\n\n" }
        );
      }
      Isa::Avx512Vpclmulqdq => {
        self.require_header(Header::Immintrin);
        put!(
          self,
          b,
          "#define clmul_{which}(a, b) (_mm512_clmulepi64_epi128((a), (b), {})){}",
          0x11 * (1 - half.is_lo()),
          if half.is_lo() != 0 { "\n" } else { "\n\n" }
        );
      }
      Isa::None => panic!("clmul helper requested for scalar-only ISA"),
    }
  }

  /// Emit the 32x32 carry-less multiply used to shift scalar CRCs.
  pub(crate) fn require_clmul_scalar(&mut self) {
    if self.once.clmul_scalar {
      return;
    }
    self.once.clmul_scalar = true;
    let b = self.out;
    let vt = self.cfg.vec16_type;
    put!(self, b, "CRC_AINLINE {vt} clmul_scalar(uint32_t a, uint32_t b) {{\n");
    if self.cfg.isa.is_neon() {
      self.require_header(Header::ArmNeon);
      self.tree.push_str(
        b,
        "uint64x2_t r;\n\
         __asm(\"pmull %0.1q, %1.1d, %2.1d\\n\" : \"=w\"(r) : \"w\"(vmovq_n_u64(a)), \"w\"(vmovq_n_u64(b)));\n\
         return r;\n",
      );
    } else {
      self.require_header(Header::Wmmintrin);
      self.tree.push_str(
        b,
        "return _mm_clmulepi64_si128(_mm_cvtsi32_si128(a), _mm_cvtsi32_si128(b), 0);\n",
      );
    }
    self.tree.push_str(b, "}\n\n");
  }

  /// Write an unaligned vector load expression, e.g.
  /// `vld1q_u64((const uint64_t*)(buf + 16))`.
  pub(crate) fn push_vector_load(&mut self, b: NodeId, base: &str, offset: u32) {
    let open = match self.cfg.isa {
      Isa::Neon | Isa::NeonEor3 => "vld1q_u64((const uint64_t*)",
      Isa::Sse | Isa::Avx512 => "_mm_loadu_si128((const __m128i*)",
      Isa::Avx512Vpclmulqdq => "_mm512_loadu_si512((const void*)",
      Isa::None => panic!("vector load requested for scalar-only ISA"),
    };
    self.tree.push_str(b, open);
    if offset != 0 {
      put!(self, b, "({base} + {offset}))");
    } else {
      put!(self, b, "{base})");
    }
  }

  /// Write `lhs * rhs` with the trivial factors folded away.
  pub(crate) fn push_product(&mut self, b: NodeId, lhs: &str, rhs: u32) {
    if rhs == 0 {
      self.tree.push_str(b, "0");
    } else {
      self.tree.push_str(b, lhs);
      if rhs > 1 {
        put!(self, b, " * {rhs}");
      }
    }
  }

  /// Write an XOR reduction of `vc{lo}` .. `vc{hi - 1}`.
  ///
  /// Three-way nodes are used where the ISA has a fused ternary XOR,
  /// two-way otherwise.
  pub(crate) fn push_xor_tree(&mut self, b: NodeId, lo: u32, hi: u32) {
    let range = hi - lo;
    if range == 1 {
      put!(self, b, "vc{lo}");
    } else if range >= 3
      && matches!(
        self.cfg.isa,
        Isa::NeonEor3 | Isa::Avx512 | Isa::Avx512Vpclmulqdq
      )
    {
      let m1 = lo + range / 3;
      let m2 = hi - range / 3;
      if self.cfg.isa == Isa::NeonEor3 {
        self.tree.push_str(b, "veor3q_u64(");
      } else {
        self.require_header(Header::Immintrin);
        self.tree.push_str(b, "_mm_ternarylogic_epi64(");
      }
      self.push_xor_tree(b, lo, m1);
      self.tree.push_str(b, ", ");
      self.push_xor_tree(b, m1, m2);
      self.tree.push_str(b, ", ");
      self.push_xor_tree(b, m2, hi);
      if self.cfg.isa != Isa::NeonEor3 {
        self.tree.push_str(b, ", 0x96");
      }
      self.tree.push_str(b, ")");
    } else {
      let mid = lo + range / 2;
      if self.cfg.isa.is_neon() {
        self.tree.push_str(b, "veorq_u64(");
      } else {
        self.tree.push_str(b, "_mm_xor_si128(");
      }
      self.push_xor_tree(b, lo, mid);
      self.tree.push_str(b, ", ");
      self.push_xor_tree(b, mid, hi);
      self.tree.push_str(b, ")");
    }
  }

  /// Load the fold multiplier for an accumulator span of `span` vector
  /// registers into `k`: the pair `(x^(n+31) mod P, x^(n-33) mod P)` for
  /// `n = span * vector_bits`.
  pub(crate) fn push_fold_constant(&mut self, b: NodeId, span: u32) {
    let bits = u64::from(span) * u64::from(self.cfg.vector_bytes) * 8;
    let k1 = gf2::x_n_mod_p(self.cfg.poly, bits + 31);
    let k2 = gf2::x_n_mod_p(self.cfg.poly, bits - 33);
    if self.cfg.isa.is_neon() {
      put!(
        self,
        b,
        "{{ static const uint64_t CRC_ALIGN(16) k_[] = {{0x{k1:08x}, 0x{k2:08x}}}; "
      );
      self.tree.push_str(b, "k = vld1q_u64(k_); }\n");
    } else {
      self.tree.push_str(b, "k = ");
      if self.cfg.vector_bytes > 16 {
        self.tree.push_str(b, "_mm512_broadcast_i32x4(");
      }
      put!(self, b, "_mm_setr_epi32(0x{k1:08x}, 0, 0x{k2:08x}, 0)");
      if self.cfg.vector_bytes > 16 {
        self.tree.push_str(b, ")");
      }
      self.tree.push_str(b, ";\n");
    }
  }

  /// XOR a 32-bit scalar into the low lane of a vector accumulator.
  pub(crate) fn push_crc_into_vector(&mut self, b: NodeId, scalar: &str, vector: &str) {
    match self.cfg.isa {
      Isa::Neon | Isa::NeonEor3 => {
        put!(
          self,
          b,
          "{vector} = veorq_u64((uint64x2_t){{{scalar}, 0}}, {vector});\n"
        );
      }
      Isa::Sse | Isa::Avx512 => {
        put!(
          self,
          b,
          "{vector} = _mm_xor_si128(_mm_cvtsi32_si128({scalar}), {vector});\n"
        );
      }
      Isa::Avx512Vpclmulqdq => {
        put!(
          self,
          b,
          "{vector} = _mm512_xor_si512(_mm512_castsi128_si512(_mm_cvtsi32_si128({scalar})), {vector});\n"
        );
      }
      Isa::None => panic!("vector accumulator requested for scalar-only ISA"),
    }
  }

  /// Write one fold step `x{reg} = x{reg} * k + addend` in two parts.
  ///
  /// The multiply half goes to `muls` and the XOR half to `tail`; callers
  /// splice `muls` ahead of `tail` so the downstream compiler sees all
  /// multiplies grouped before all XORs.
  pub(crate) fn push_fold_step(&mut self, muls: NodeId, tail: NodeId, reg: u32, addend: Addend<'_>) {
    self.require_clmul(ClmulHalf::Lo, self.cfg.isa);
    self.require_clmul(ClmulHalf::Hi, self.cfg.isa);
    if self.cfg.isa != Isa::Neon {
      put!(
        self,
        muls,
        "y{reg} = clmul_lo(x{reg}, k), x{reg} = clmul_hi(x{reg}, k);\n"
      );
    }
    match self.cfg.isa {
      Isa::Neon => put!(self, tail, "y{reg} = clmul_lo_e(x{reg}, k, "),
      Isa::NeonEor3 => put!(self, tail, "x{reg} = veor3q_u64(x{reg}, y{reg}, "),
      Isa::Sse => put!(self, tail, "y{reg} = _mm_xor_si128(y{reg}, "),
      Isa::Avx512 => put!(self, tail, "x{reg} = _mm_ternarylogic_epi64(x{reg}, y{reg}, "),
      Isa::Avx512Vpclmulqdq => {
        put!(self, tail, "x{reg} = _mm512_ternarylogic_epi64(x{reg}, y{reg}, ");
      }
      Isa::None => panic!("vector fold requested for scalar-only ISA"),
    }
    match addend {
      Addend::Load { base, offset } => self.push_vector_load(tail, base, offset),
      Addend::Acc(index) => put!(self, tail, "x{index}"),
    }
    match self.cfg.isa {
      Isa::Neon => put!(self, tail, "), x{reg} = clmul_hi_e(x{reg}, k, y{reg});\n"),
      Isa::NeonEor3 => self.tree.push_str(tail, ");\n"),
      Isa::Sse => put!(self, tail, "), x{reg} = _mm_xor_si128(x{reg}, y{reg});\n"),
      Isa::Avx512 | Isa::Avx512Vpclmulqdq => {
        self.tree.push_str(tail, ", 0x96);\n");
        self.require_header(Header::Immintrin);
      }
      Isa::None => unreachable!(),
    }
  }

  /// Collapse vector accumulators `x0` .. `x{count - 1}` down to `x0` by
  /// pairwise folds, doubling the fold distance each round.
  pub(crate) fn push_reduce_tree(&mut self, b: NodeId, count: u32) {
    let mut n = count;
    let mut d = 1;
    while n > 1 {
      self.push_fold_constant(b, d);
      if n & 1 != 0 {
        // Odd count: merge the first pair, then renumber the rest down.
        self.push_fold_step(b, b, 0, Addend::Acc(d));
        n -= 1;
        for i in 1..n {
          put!(
            self,
            b,
            "{}x{} = x{}",
            if i == 1 { "" } else { ", " },
            i * d,
            i * d + d
          );
        }
        self.tree.push_str(b, ";\n");
      }
      let muls = self.tree.attach_new(b);
      let mut i = 0;
      while i < n {
        self.push_fold_step(muls, b, i * d, Addend::Acc(i * d + d));
        i += 2;
      }
      n >>= 1;
      d <<= 1;
    }
  }
}
