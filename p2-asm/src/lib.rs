//! Propeller2 instruction encoding: condition codes,
//! the 128-slot primary mnemonic table, and the canonical 32-bit
//! instruction word's bitfields.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

mod condition;
mod error;
mod instruction;
mod mnemonic;

pub use condition::Condition;
pub use error::EncodeError;
pub use instruction::{decode_any, encode_augment, DecodedWord, Instruction};
pub use mnemonic::{Mnemonic, OperandShape};
