//! Building blocks for two-party secure computation protocols.
//!
//! This crate provides the low-level substrate that oblivious transfer extension and
//! garbled circuit protocols are built on:
//!
//! * [`bitvec`]: A byte-aligned [`BitVector`](bitvec::BitVector) with bit- and byte-level
//!   bulk operations and a fast bit-matrix transposition.
//! * [`crypto`]: The [`Crypto`](crypto::Crypto) facade for AES counter-mode randomness,
//!   AES encryption, SHA hashing and fixed-key AES hashing at a chosen security level.
//! * [`transport`]: Ordered multi-channel messaging between two parties over TCP with
//!   dedicated send and receive threads per channel.
//!
//! ## Example
//!
//! ```
//! use polytune_primitives::{bitvec::BitVector, crypto::Crypto};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let crypto = Crypto::new(128, Some(&[42; 16][..]))?;
//! // 256 x 128 random bit matrix
//! let mut matrix = BitVector::random(256 * 128, &crypto);
//! let original = matrix.clone();
//! matrix.transpose(256, 128)?;
//! matrix.transpose(128, 256)?;
//! assert!(matrix.is_equal(&original));
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod bitvec;
mod block;
pub mod crypto;
pub mod transport;
pub mod transpose;

mod utils;
