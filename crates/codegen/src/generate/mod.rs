//! C source emission.
//!
//! The generator threads a single context through every emitter: the
//! selected ISA and polynomial, the resolved names of the scalar helpers,
//! vector widths, and the once-flags that keep each helper from being
//! emitted twice. Emitters write into an [`emit::Arena`] so that headers,
//! helper functions, and lookup tables materialise out of source order but
//! assemble in the right textual order at flush time.

use alloc::string::String;

use emit::{Arena, NodeId};

use crate::algo::AlgoPhase;
use crate::isa::Isa;
use crate::poly;

macro_rules! put {
  ($g:expr, $node:expr, $($fmt:tt)*) => {
    $g.tree.push_fmt($node, core::format_args!($($fmt)*))
  };
}
pub(crate) use put;

mod main_fn;
mod primitives;
mod scalar;

pub(crate) use primitives::{Addend, ClmulHalf, Header};

/// Immutable-ish generation parameters plus the state the lazy table
/// renderer reads at flush time.
pub(crate) struct GenConfig {
  pub isa: Isa,
  /// Reversed polynomial.
  pub poly: u32,
  pub scalar1_fn: &'static str,
  pub scalar4_fn: &'static str,
  pub scalar8_fn: &'static str,
  /// C type of a 128-bit vector on this ISA.
  pub vec16_type: &'static str,
  /// Intrinsic extracting a 64-bit lane from a 128-bit vector.
  pub vec16_lane8_fn: &'static str,
  /// C type of the full-width vector (may be 512-bit).
  pub vector_type: &'static str,
  pub scalar_bytes: u32,
  pub vector_bytes: u32,
  /// Lookup table planes requested so far; the widest request wins.
  pub table_planes: u32,
}

/// One bit per already-emitted helper.
#[derive(Default)]
pub(crate) struct OnceFlags {
  pub headers: u32,
  pub clmul: u32,
  pub scalar: u32,
  pub clmul_scalar: bool,
  pub crc_shift: bool,
}

pub(crate) struct Generator {
  pub cfg: GenConfig,
  pub once: OnceFlags,
  pub tree: Arena<GenConfig>,
  /// `#include` lines and the leading comment banner.
  pub includes: NodeId,
  /// Root of the whole output.
  pub out: NodeId,
}

impl Generator {
  pub fn new(isa: Isa, poly: u32) -> Self {
    let mut tree = Arena::new();
    let out = tree.node();
    let includes = tree.attach_new(out);
    Self {
      cfg: GenConfig {
        isa,
        poly,
        scalar1_fn: "crc_u8",
        scalar4_fn: "crc_u32",
        scalar8_fn: "crc_u64",
        vec16_type: "",
        vec16_lane8_fn: "",
        vector_type: "",
        scalar_bytes: isa.scalar_bytes(),
        vector_bytes: isa.vector_bytes(),
        table_planes: 0,
      },
      once: OnceFlags::default(),
      tree,
      includes,
      out,
    }
  }

  /// Emit the standard library includes and the portability macro block.
  fn emit_prelude(&mut self) {
    let includes = self.includes;
    self
      .tree
      .push_str(includes, "#include <stddef.h>\n#include <stdint.h>\n");
    let out = self.out;
    self.tree.push_str(
      out,
      "\n#if defined(_MSC_VER)\n\
       #define CRC_AINLINE static __forceinline\n\
       #define CRC_ALIGN(n) __declspec(align(n))\n\
       #else\n\
       #define CRC_AINLINE static __inline __attribute__((always_inline))\n\
       #define CRC_ALIGN(n) __attribute__((aligned(n)))\n\
       #endif\n\
       #define CRC_EXPORT extern\n\n",
    );
  }

  /// Resolve vector type names and bind the scalar helper names to
  /// hardware CRC instructions where the `(isa, poly)` pair has them.
  fn bind_scalar_helpers(&mut self) {
    match self.cfg.isa {
      Isa::Neon | Isa::NeonEor3 => {
        self.cfg.vec16_type = "uint64x2_t";
        self.cfg.vec16_lane8_fn = "vgetq_lane_u64";
      }
      Isa::Sse | Isa::Avx512 | Isa::Avx512Vpclmulqdq => {
        self.cfg.vec16_type = "__m128i";
        self.cfg.vec16_lane8_fn = "_mm_extract_epi64";
      }
      Isa::None => {}
    }
    self.cfg.vector_type = if self.cfg.vector_bytes > 16 {
      "__m512i"
    } else {
      self.cfg.vec16_type
    };

    if self.cfg.poly == poly::CRC32 {
      if self.cfg.isa.is_neon() {
        self.require_header(Header::ArmAcle);
        self.cfg.scalar1_fn = "__crc32b";
        self.cfg.scalar4_fn = "__crc32w";
        self.cfg.scalar8_fn = "__crc32d";
        self.require_scalar_crc(15);
      }
    } else if self.cfg.poly == poly::CRC32C {
      if self.cfg.isa.is_neon() {
        self.require_header(Header::ArmAcle);
        self.cfg.scalar1_fn = "__crc32cb";
        self.cfg.scalar4_fn = "__crc32cw";
        self.cfg.scalar8_fn = "__crc32cd";
        self.require_scalar_crc(15);
      } else if self.cfg.isa != Isa::None {
        self.require_header(Header::Nmmintrin);
        self.cfg.scalar1_fn = "_mm_crc32_u8";
        self.cfg.scalar4_fn = "_mm_crc32_u32";
        self.cfg.scalar8_fn = "_mm_crc32_u64";
        self.require_scalar_crc(15);
      }
    }
  }

  fn render(mut self) -> String {
    let mut rendered = String::new();
    self
      .tree
      .flush(&self.cfg, self.out, &mut rendered)
      .expect("rendering into a String cannot fail");
    rendered
  }
}

/// Generate a standalone C source file for `(isa, poly, phases)`.
///
/// `banner` is emitted verbatim at the very top; the command-line front-end
/// passes a comment reproducing the invocation. `phases` may be empty, in
/// which case only the alignment and tail loops are produced.
#[must_use]
pub fn generate(isa: Isa, poly: u32, phases: &[AlgoPhase], banner: &str) -> String {
  let mut g = Generator::new(isa, poly);
  let includes = g.includes;
  g.tree.push_str(includes, banner);
  g.emit_prelude();
  g.bind_scalar_helpers();
  g.emit_crc_fn(phases);
  g.render()
}
