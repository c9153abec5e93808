//! Specialising code generator for CRC-32 inner loops.
//!
//! Given a target instruction set, a 32-bit CRC polynomial, and a terse
//! algorithm string describing how to decompose a buffer into parallel
//! accumulator chains, this crate emits a self-contained C source file
//! exporting one function:
//!
//! ```c
//! CRC_EXPORT uint32_t crc32_impl(uint32_t crc, const char* buf, size_t len);
//! ```
//!
//! The emitted function computes the reflected CRC-32 of its input under
//! the chosen polynomial, with the conventional pre- and post-complement.
//! The generator does not compute a CRC itself and does not detect host
//! CPU features; it is a batch compiler from `(isa, poly, algo)` to C.
//!
//! # Example
//!
//! ```
//! use codegen::{algo, generate, poly, Isa};
//!
//! let isa = Isa::Sse;
//! let phases = algo::parse("v4e", isa).unwrap();
//! let source = generate(isa, poly::CRC32C, &phases, "/* demo */\n");
//! assert!(source.contains("crc32_impl"));
//! ```
//!
//! Supported shapes are described by the algorithm grammar in [`algo`];
//! the five ISA flavours and their primitive mappings live in [`isa`] and
//! the emission machinery.

#![no_std]

extern crate alloc;

pub mod algo;
pub mod error;
mod generate;
pub mod gf2;
pub mod isa;
pub mod poly;
#[cfg(test)]
mod proptests;

pub use algo::AlgoPhase;
pub use error::Error;
pub use generate::generate;
pub use isa::Isa;
