//! Architecture-specific decoding.
//!
//! AMOS targets the Motorola 68000 only; the decoder covers the baseline
//! instruction set the AMOS compiler and its libraries use.

pub mod m68k;
