//! GF(2) polynomial arithmetic in the reversed-bit domain.
//!
//! CRC folding works on polynomials encoded as reversed bit strings: the
//! coefficient of `x^0` sits in the most significant bit, and the `x^32`
//! term of the generator polynomial is implicit. These helpers compute, at
//! generation time, the `x^n mod P` and `x^n div P` constants that
//! parameterise carry-less-multiply fold steps and Barrett reduction in the
//! emitted code.

/// Reverse the bit order of a 32-bit word.
///
/// Converts a conventional (forward) polynomial into the reversed
/// representation used everywhere else.
#[inline]
#[must_use]
pub const fn reverse32(poly: u32) -> u32 {
  poly.reverse_bits()
}

/// Compute `x^n mod P` in O(log n) time, for the reversed polynomial `poly`.
///
/// The exponent is unwound onto a bit stack until it drops below 32, where
/// `x^n` is a single (reflected) bit. Replaying the stack doubles the
/// exponent each step: squaring in GF(2) spreads each bit of `r` to the even
/// positions, an optional extra shift restores the low stack bit, and 32
/// single-bit steps reduce the 64-bit square back below `P`.
#[must_use]
pub const fn x_n_mod_p(poly: u32, n: u64) -> u32 {
  let mut stack: u64 = !1;
  let mut n = n;
  while n > 31 {
    stack = (stack << 1) + (n & 1);
    n >>= 1;
  }
  stack = !stack;
  let mut r: u64 = (0x8000_0000u32 >> n) as u64;
  loop {
    let low = stack & 1;
    stack >>= 1;
    if stack == 0 {
      break;
    }
    // r = r^2, widened from 32 to 64 bits. The product of two 32-bit
    // polynomials is 63 bits; widening to 64 in the reversed domain
    // multiplies by x, which `low` conditionally undoes.
    r ^= r << 16;
    r &= 0x0000_ffff_0000_ffff;
    r ^= r << 8;
    r &= 0x00ff_00ff_00ff_00ff;
    r ^= r << 4;
    r &= 0x0f0f_0f0f_0f0f_0f0f;
    r ^= r << 2;
    r &= 0x3333_3333_3333_3333;
    r ^= r << 1;
    r &= 0x5555_5555_5555_5555;
    r <<= low;
    let mut i = 0;
    while i < 32 {
      r = (r >> 1) ^ ((r & 1) * poly as u64);
      i += 1;
    }
  }
  r as u32
}

/// Compute `x^n div P` for `n <= 95` as a 64-bit quotient.
///
/// Direct polynomial long division; the quotient parameterises the Barrett
/// reduction steps of the emitted scalar helpers.
#[must_use]
pub const fn x_n_div_p(poly: u32, n: u32) -> u64 {
  debug_assert!(n <= 95);
  let mut q: u64 = 0;
  let mut r: u32 = 1;
  let mut i = 95 - n;
  while i < 64 {
    q ^= ((r & 1) as u64) << i;
    r = (r >> 1) ^ ((r & 1) * poly);
    i += 1;
  }
  q
}
