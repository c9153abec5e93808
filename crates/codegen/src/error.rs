//! Fatal input-validation errors.
//!
//! The generator validates its inputs up front; emission itself is total
//! (validated input always produces an output). Every error here is
//! terminal: the front-end reports it on one line and exits.

use alloc::string::String;
use core::fmt;

/// A user-facing input validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
  /// The requested instruction set is not recognised.
  UnknownIsa(String),
  /// A polynomial literal contains a non-hex character.
  InvalidPolynomial(String),
  /// A polynomial literal has too many hex digits.
  PolynomialTooLong(String),
  /// A polynomial literal has too few hex digits.
  PolynomialTooShort(String),
  /// `v`, `s`, `k`, or `x` in an algorithm string without a following
  /// digit sequence.
  ExpectedDigits { term: char, algo: String },
  /// A character outside the algorithm grammar.
  UnrecognisedCharacter { found: char, algo: String },
  /// A load count that is not an integer multiple of the matching
  /// accumulator count.
  LoadNotMultiple {
    kind: char,
    load: u32,
    acc: u32,
    algo: String,
  },
  /// Vector accumulators requested without an ISA.
  VectorsNeedIsa,
  /// More than one scalar accumulator requested without an ISA.
  MultipleScalarsNeedIsa,
  /// A command-line option without its required value.
  MissingValue(String),
  /// A command-line option that is not part of the interface.
  UnknownOption(String),
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::UnknownIsa(name) => write!(f, "unknown ISA {name}"),
      Self::InvalidPolynomial(value) => write!(f, "invalid polynomial {value}"),
      Self::PolynomialTooLong(value) => write!(f, "polynomial {value} too long"),
      Self::PolynomialTooShort(value) => write!(f, "polynomial {value} too short"),
      Self::ExpectedDigits { term, algo } => {
        write!(
          f,
          "expected digit sequence after character {term} in algorithm string {algo}"
        )
      }
      Self::UnrecognisedCharacter { found, algo } => {
        write!(f, "unrecognised character {found} in algorithm string {algo}")
      }
      Self::LoadNotMultiple {
        kind,
        load,
        acc,
        algo,
      } => {
        write!(
          f,
          "algorithm {algo} has {kind} load count ({load}) not an integer multiple of {kind} acc count ({acc})"
        )
      }
      Self::VectorsNeedIsa => f.write_str("need to specify an ISA to use vector accumulators"),
      Self::MultipleScalarsNeedIsa => {
        f.write_str("need to specify an ISA to use more than one scalar accumulator")
      }
      Self::MissingValue(option) => write!(f, "missing value for option {option}"),
      Self::UnknownOption(option) => write!(f, "unknown option {option}"),
    }
  }
}

impl core::error::Error for Error {}
