//! Pseudorandom generation, symmetric encryption and hashing.
//!
//! [`Crypto`] bundles these primitives for one [`SecLevel`]. Its PRF is AES in counter
//! mode, see [`PrfState`].
use thiserror::Error;

use crate::transport::TransportError;

mod aes_hash;
mod cipher;
mod facade;
mod hash;
mod prf;
mod seclvl;

pub use cipher::{BlockMode, SymmetricCipher};
pub use facade::Crypto;
pub use hash::HashFunction;
pub use prf::{AES_PAR_BLOCKS, PrfState};
pub use seclvl::SecLevel;

/// Errors of the cryptographic primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No predefined security level has this symmetric bit strength.
    #[error("unsupported symmetric security level of {0} bits")]
    UnsupportedSecurityLevel(u32),
    /// AES keys are 16 or 32 bytes long.
    #[error("AES keys must be 16 or 32 bytes, got {actual}")]
    InvalidKeyLength {
        /// Length of the rejected key.
        actual: usize,
    },
    /// The seed does not match the key length of the security level.
    #[error("seed must be {expected} bytes, got {actual}")]
    SeedLength {
        /// Key length of the security level.
        expected: usize,
        /// Length of the rejected seed.
        actual: usize,
    },
    /// Block cipher input that is not a whole number of blocks.
    #[error("data of {len} bytes is not a multiple of the {block} byte block size")]
    UnalignedLength {
        /// Length of the data.
        len: usize,
        /// Block size.
        block: usize,
    },
    /// Encryption was requested before a key was set.
    #[error("no encryption key, call seed_aes_enc first")]
    MissingEncryptionKey,
    /// Exchanging seeds with the peer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
