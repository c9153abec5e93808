//! Instruction-set selection.

use alloc::string::ToString;

use crate::error::Error;

/// Target instruction set for the emitted kernel.
///
/// `Sse` covers SSE through AVX2, which share the same 128-bit intrinsics.
/// The two NEON variants differ only in whether `eor3` is available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Isa {
  /// Scalar only, table driven.
  #[default]
  None,
  /// aarch64 NEON, tuned for pmull+eor fusion.
  Neon,
  /// aarch64 NEON using pmull and eor3.
  NeonEor3,
  /// x86_64 pclmulqdq.
  Sse,
  /// x86_64 pclmulqdq and vpternlogq.
  Avx512,
  /// x86_64 vpclmulqdq on 512-bit vectors.
  Avx512Vpclmulqdq,
}

impl Isa {
  /// Resolve a command-line ISA name.
  pub fn parse(name: &str) -> Result<Self, Error> {
    match name {
      "none" => Ok(Self::None),
      "neon" => Ok(Self::Neon),
      "neon_eor3" => Ok(Self::NeonEor3),
      "sse" | "avx" | "avx2" => Ok(Self::Sse),
      "avx512" => Ok(Self::Avx512),
      "avx512_vpclmulqdq" => Ok(Self::Avx512Vpclmulqdq),
      _ => Err(Error::UnknownIsa(name.to_string())),
    }
  }

  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Neon => "neon",
      Self::NeonEor3 => "neon_eor3",
      Self::Sse => "sse",
      Self::Avx512 => "avx512",
      Self::Avx512Vpclmulqdq => "avx512_vpclmulqdq",
    }
  }

  /// True for both NEON variants.
  #[must_use]
  pub const fn is_neon(self) -> bool {
    matches!(self, Self::Neon | Self::NeonEor3)
  }

  /// Natural scalar chunk width in bytes.
  #[must_use]
  pub const fn scalar_bytes(self) -> u32 {
    if matches!(self, Self::None) { 4 } else { 8 }
  }

  /// Vector register width in bytes.
  #[must_use]
  pub const fn vector_bytes(self) -> u32 {
    if matches!(self, Self::Avx512Vpclmulqdq) { 64 } else { 16 }
  }
}

#[cfg(test)]
mod tests {
  extern crate std;

  use super::*;

  #[test]
  fn parse_names() {
    assert_eq!(Isa::parse("none").unwrap(), Isa::None);
    assert_eq!(Isa::parse("neon").unwrap(), Isa::Neon);
    assert_eq!(Isa::parse("neon_eor3").unwrap(), Isa::NeonEor3);
    assert_eq!(Isa::parse("avx512").unwrap(), Isa::Avx512);
    assert_eq!(Isa::parse("avx512_vpclmulqdq").unwrap(), Isa::Avx512Vpclmulqdq);
  }

  #[test]
  fn sse_aliases() {
    for name in ["sse", "avx", "avx2"] {
      assert_eq!(Isa::parse(name).unwrap(), Isa::Sse);
    }
  }

  #[test]
  fn names_round_trip() {
    for isa in [
      Isa::None,
      Isa::Neon,
      Isa::NeonEor3,
      Isa::Sse,
      Isa::Avx512,
      Isa::Avx512Vpclmulqdq,
    ] {
      assert_eq!(Isa::parse(isa.as_str()).unwrap(), isa);
    }
  }

  #[test]
  fn unknown_name_rejected() {
    assert!(matches!(Isa::parse("sve2"), Err(Error::UnknownIsa(_))));
    assert!(Isa::parse("NEON").is_err());
  }

  #[test]
  fn widths() {
    assert_eq!(Isa::None.scalar_bytes(), 4);
    assert_eq!(Isa::Sse.scalar_bytes(), 8);
    assert_eq!(Isa::Neon.vector_bytes(), 16);
    assert_eq!(Isa::Avx512Vpclmulqdq.vector_bytes(), 64);
  }
}
