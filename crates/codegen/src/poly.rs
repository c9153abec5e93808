//! CRC-32 polynomial resolution.
//!
//! All polynomials are carried in the reversed-bit representation (see
//! [`crate::gf2`]): canonical names map straight to reversed constants, and
//! hexadecimal literals are taken in conventional forward form and reversed
//! on the way in.

use alloc::string::ToString;

use crate::error::Error;
use crate::gf2;

/// CRC-32 (ISO-HDLC), forward form 0x04C11DB7. Hardware accelerated on
/// aarch64.
pub const CRC32: u32 = 0xedb8_8320;
/// CRC-32C (Castagnoli), forward form 0x1EDC6F41. Hardware accelerated on
/// aarch64 and x86_64.
pub const CRC32C: u32 = 0x82f6_3b78;
/// CRC-32K (Koopman), forward form 0x741B8CD7.
pub const CRC32K: u32 = 0xeb31_d82e;
/// CRC-32K2 (Koopman), forward form 0x32583499.
pub const CRC32K2: u32 = 0x992c_1a4c;
/// CRC-32Q, forward form 0x814141AB.
pub const CRC32Q: u32 = 0xd582_8281;

/// Resolve a polynomial name or hexadecimal literal to its reversed form.
///
/// Literals take 8 hex digits, or 9 when led by the implicit `1` of the
/// `x^32` term, with an optional `0x` prefix.
pub fn parse(value: &str) -> Result<u32, Error> {
  for (name, poly) in [
    ("crc32", CRC32),
    ("crc32c", CRC32C),
    ("crc32k", CRC32K),
    ("crc32k2", CRC32K2),
    ("crc32q", CRC32Q),
  ] {
    if value.eq_ignore_ascii_case(name) {
      return Ok(poly);
    }
  }

  let digits = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
    Some(rest) if !rest.is_empty() => rest,
    _ => value,
  };
  let max_digits = 8 + usize::from(digits.as_bytes().first() == Some(&b'1'));
  let mut poly: u32 = 0;
  let mut count = 0usize;
  for c in digits.bytes() {
    let nibble = match c {
      b'0'..=b'9' => c - b'0',
      b'a'..=b'f' => c - b'a' + 10,
      b'A'..=b'F' => c - b'A' + 10,
      _ => return Err(Error::InvalidPolynomial(value.to_string())),
    };
    count += 1;
    if count > max_digits {
      return Err(Error::PolynomialTooLong(value.to_string()));
    }
    // A 9-digit literal shifts its leading 1 (the x^32 term) back out.
    poly = (poly << 4) | u32::from(nibble);
  }
  if count < 8 {
    return Err(Error::PolynomialTooShort(value.to_string()));
  }
  Ok(gf2::reverse32(poly))
}
