//! Scalar CRC helpers: the per-width `crc_u8`/`crc_u32`/`crc_u64`
//! bindings, the byte lookup table, and the runtime shift helpers.

use alloc::boxed::Box;

use emit::{Node, NodeId};

use super::{put, ClmulHalf, GenConfig, Generator, Header};
use crate::gf2;
use crate::isa::Isa;

const TABLE_VAR: &str = "g_crc_table";

/// Render the lookup table at flush time, once the final plane count is
/// known. Plane `i` advances a CRC by `i + 1` zero bytes.
fn write_table(cfg: &GenConfig, node: &mut Node<GenConfig>) {
  node.push_fmt(format_args!("[{}][256] = {{", cfg.table_planes));
  let mut plane = 0;
  while plane < cfg.table_planes {
    node.push_str("{\n");
    for entry in 0..256u32 {
      let mut crc = entry;
      let mut bit = (plane + 1) * 8;
      while bit > 0 {
        crc = (crc >> 1) ^ ((crc & 1) * cfg.poly);
        bit -= 1;
      }
      let sep = if entry + 1 >= 256 {
        ""
      } else if (entry + 1) % 6 != 0 {
        ", "
      } else {
        ",\n"
      };
      node.push_fmt(format_args!("0x{crc:08x}{sep}"));
    }
    plane += 1;
    if plane < cfg.table_planes {
      node.push_str("},");
    } else {
      node.push_str("\n}};\n\n");
    }
  }
}

impl Generator {
  /// Reserve the lookup table (on first request) and widen it to at least
  /// `planes` planes. Returns the table identifier.
  pub(crate) fn require_table(&mut self, planes: u32) -> &'static str {
    if planes > self.cfg.table_planes {
      if self.cfg.table_planes == 0 {
        let out = self.out;
        put!(self, out, "static const uint32_t {TABLE_VAR}");
        self.tree.attach_lazy(out, Box::new(write_table));
      }
      self.cfg.table_planes = planes;
    }
    TABLE_VAR
  }

  /// Emit the scalar CRC helper for `width` bytes, once.
  ///
  /// Each width binds to hardware CRC instructions when
  /// [`Generator::bind_scalar_helpers`] marked them available, to a
  /// CLMUL-based Barrett reduction when the ISA has carry-less multiply,
  /// and to the lookup table otherwise.
  pub(crate) fn require_scalar_crc(&mut self, width: u32) {
    if self.once.scalar & width != 0 {
      return;
    }
    self.once.scalar |= width;
    if width > 8 {
      return;
    }
    let b = self.tree.node();
    if width == 1 {
      let table = self.require_table(1);
      let name = self.cfg.scalar1_fn;
      put!(self, b, "CRC_AINLINE uint32_t {name}(uint32_t crc, uint8_t val) {{\n");
      put!(self, b, "return (crc >> 8) ^ {table}[0][(crc & 0xFF) ^ val];\n");
      self.tree.push_str(b, "}\n\n");
    } else if width == 4 {
      let name = self.cfg.scalar4_fn;
      put!(self, b, "CRC_AINLINE uint32_t {name}(uint32_t crc, uint32_t val) {{\n");
      if self.cfg.isa == Isa::None {
        let table = self.require_table(4);
        self.tree.push_str(b, "crc ^= val;\n");
        put!(
          self,
          b,
          "return {table}[0][crc >>  24] ^ {table}[1][(crc >> 16) & 0xFF] ^\n"
        );
        put!(
          self,
          b,
          "       {table}[3][crc & 0xFF] ^ {table}[2][(crc >>  8) & 0xFF];\n"
        );
      } else {
        self.push_barrett_body(b, 63, "_mm_cvtsi32_si128(crc ^ val)");
      }
      self.tree.push_str(b, "}\n\n");
    } else if width == 8 {
      let name = self.cfg.scalar8_fn;
      put!(self, b, "CRC_AINLINE uint32_t {name}(uint32_t crc, uint64_t val) {{\n");
      if self.cfg.isa == Isa::None {
        self.require_scalar_crc(4);
        let narrow = self.cfg.scalar4_fn;
        put!(self, b, "crc = {narrow}(crc, (uint32_t)val);\n");
        put!(self, b, "return {narrow}(crc, (uint32_t)(val >> 32));\n");
      } else {
        self.push_barrett_body(b, 95, "_mm_cvtsi64_si128(crc ^ val)");
      }
      self.tree.push_str(b, "}\n\n");
    }
    self.tree.attach(self.out, b);
  }

  /// Barrett reduction body shared by the 4- and 8-byte helpers: fold
  /// `crc ^ val` through `x^n div P`, then through the packed polynomial,
  /// and extract the 32-bit remainder.
  fn push_barrett_body(&mut self, b: NodeId, n: u32, seed: &str) {
    let q = gf2::x_n_div_p(self.cfg.poly, n);
    let packed_lo = self.cfg.poly.wrapping_mul(2).wrapping_add(1);
    let packed_hi = self.cfg.poly >> 31;
    if self.cfg.isa.is_neon() {
      self.require_clmul(ClmulHalf::Lo, Isa::NeonEor3);
      self.tree.push_str(b, "uint64x2_t a = vmovq_n_u64(crc ^ val);\n");
      put!(
        self,
        b,
        "a = clmul_lo(a, vmovq_n_u64(0x{:08x}{:08x}ull));\n",
        (q >> 32) as u32,
        q as u32
      );
      put!(
        self,
        b,
        "a = clmul_lo(a, vmovq_n_u64(0x{packed_hi:08x}{packed_lo:08x}ull));\n"
      );
      self
        .tree
        .push_str(b, "return vgetq_lane_u32(vreinterpretq_u32_u64(a), 2);\n");
    } else {
      self.require_header(Header::Nmmintrin);
      self.require_header(Header::Wmmintrin);
      put!(
        self,
        b,
        "__m128i k = _mm_setr_epi32(0x{:08x}, 0x{:08x}, 0x{packed_lo:08x}, {packed_hi});\n",
        q as u32,
        (q >> 32) as u32
      );
      put!(self, b, "__m128i a = {seed};\n");
      self.tree.push_str(
        b,
        "__m128i b = _mm_clmulepi64_si128(a, k, 0x00);\n\
         __m128i c = _mm_clmulepi64_si128(b, k, 0x10);\n\
         return _mm_extract_epi32(c, 2);\n",
      );
    }
  }

  /// Emit the runtime `xnmodp` helper and the `crc_shift` wrapper that
  /// multiplies a scalar CRC by `x^(8*nbytes - 33)` for a span only known
  /// at run time.
  pub(crate) fn require_crc_shift(&mut self) {
    if self.once.crc_shift {
      return;
    }
    self.once.crc_shift = true;
    self.require_clmul_scalar();
    self.require_scalar_crc(4);
    self.require_scalar_crc(8);

    let b = self.out;
    let narrow = self.cfg.scalar4_fn;
    let wide = self.cfg.scalar8_fn;
    self.tree.push_str(
      b,
      "static uint32_t xnmodp(uint64_t n) /* x^n mod P, in log(n) time */ {\n\
       uint64_t stack = ~(uint64_t)1;\n\
       uint32_t acc, low;\n\
       for (; n > 191; n = (n >> 1) - 16) {\n\
       stack = (stack << 1) + (n & 1);\n\
       }\n\
       stack = ~stack;\n\
       acc = ((uint32_t)0x80000000) >> (n & 31);\n\
       for (n >>= 5; n; --n) {\n",
    );
    put!(self, b, "acc = {narrow}(acc, 0);\n");
    self.tree.push_str(
      b,
      "}\n\
       while ((low = stack & 1), stack >>= 1) {\n",
    );
    if self.cfg.isa.is_neon() {
      self.tree.push_str(
        b,
        "poly8x8_t x = vreinterpret_p8_u64(vmov_n_u64(acc));\n\
         uint64_t y = vgetq_lane_u64(vreinterpretq_u64_p16(vmull_p8(x, x)), 0);\n",
      );
    } else {
      self.tree.push_str(
        b,
        "__m128i x = _mm_cvtsi32_si128(acc);\n\
         uint64_t y = _mm_cvtsi128_si64(_mm_clmulepi64_si128(x, x, 0));\n",
      );
    }
    put!(self, b, "acc = {wide}(0, y << low);\n");
    self.tree.push_str(b, "}\nreturn acc;\n}\n\n");

    let vt = self.cfg.vec16_type;
    put!(self, b, "CRC_AINLINE {vt} crc_shift(uint32_t crc, size_t nbytes) {{\n");
    self
      .tree
      .push_str(b, "return clmul_scalar(crc, xnmodp(nbytes * 8 - 33));\n}\n\n");
  }

  /// Open a scalar CRC update: `crc{acc} = crc_uN(crc{acc}, *(const uintN_t*)`.
  ///
  /// The caller completes the address expression and closes the call.
  pub(crate) fn push_scalar_update_open(&mut self, b: NodeId, acc: u32, width: u32) {
    self.require_scalar_crc(width);
    let (name, ty) = match width {
      8 => (self.cfg.scalar8_fn, "uint64_t"),
      4 => (self.cfg.scalar4_fn, "uint32_t"),
      1 => (self.cfg.scalar1_fn, "uint8_t"),
      _ => panic!("bad scalar width {width}"),
    };
    put!(self, b, "crc{acc} = {name}(crc{acc}, *(const {ty}*)");
  }
}
