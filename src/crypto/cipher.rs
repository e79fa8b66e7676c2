//! AES-128/AES-256 over whole blocks in ECB or zero-IV CBC mode.
use aes::{
    Aes128, Aes256,
    cipher::{BlockCipherDecrypt, BlockCipherEncrypt, KeyInit},
};
use serde::{Deserialize, Serialize};

use super::CryptoError;
use crate::utils::{AES_BYTES, xor_inplace};

/// Chaining mode used by [`Crypto::encrypt`](super::Crypto::encrypt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockMode {
    /// Every block is encrypted independently.
    #[default]
    Ecb,
    /// Cipher block chaining with an all-zero IV.
    Cbc,
}

/// An AES key schedule, the variant is chosen by key length.
#[derive(Clone)]
pub enum SymmetricCipher {
    /// 16 byte key.
    Aes128(Aes128),
    /// 32 byte key.
    Aes256(Aes256),
}

impl std::fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Aes128(_) => write!(f, "SymmetricCipher::Aes128 {{}}"),
            Self::Aes256(_) => write!(f, "SymmetricCipher::Aes256 {{}}"),
        }
    }
}

impl SymmetricCipher {
    /// Key schedule for a 16 or 32 byte key.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let invalid = |_| CryptoError::InvalidKeyLength { actual: key.len() };
        match key.len() {
            16 => Ok(Self::Aes128(Aes128::new_from_slice(key).map_err(invalid)?)),
            32 => Ok(Self::Aes256(Aes256::new_from_slice(key).map_err(invalid)?)),
            actual => Err(CryptoError::InvalidKeyLength { actual }),
        }
    }

    /// Length of the key in bytes.
    pub fn key_bytes(&self) -> usize {
        match self {
            Self::Aes128(_) => 16,
            Self::Aes256(_) => 32,
        }
    }

    #[inline]
    pub(crate) fn encrypt_blocks(&self, blocks: &mut [aes::Block]) {
        match self {
            Self::Aes128(aes) => aes.encrypt_blocks(blocks),
            Self::Aes256(aes) => aes.encrypt_blocks(blocks),
        }
    }

    #[inline]
    pub(crate) fn decrypt_blocks(&self, blocks: &mut [aes::Block]) {
        match self {
            Self::Aes128(aes) => aes.decrypt_blocks(blocks),
            Self::Aes256(aes) => aes.decrypt_blocks(blocks),
        }
    }

    /// Encrypt `data` in place. `data.len()` must be a multiple of 16.
    pub fn encrypt(&self, mode: BlockMode, data: &mut [u8]) -> Result<(), CryptoError> {
        let blocks = as_blocks(data)?;
        match mode {
            BlockMode::Ecb => self.encrypt_blocks(blocks),
            BlockMode::Cbc => {
                let mut prev = aes::Block::default();
                for block in blocks.iter_mut() {
                    xor_inplace(&mut block[..], &prev[..]);
                    self.encrypt_blocks(std::slice::from_mut(block));
                    prev = *block;
                }
            }
        }
        Ok(())
    }

    /// Decrypt `data` in place. `data.len()` must be a multiple of 16.
    pub fn decrypt(&self, mode: BlockMode, data: &mut [u8]) -> Result<(), CryptoError> {
        let blocks = as_blocks(data)?;
        match mode {
            BlockMode::Ecb => self.decrypt_blocks(blocks),
            BlockMode::Cbc => {
                let mut prev = aes::Block::default();
                for block in blocks.iter_mut() {
                    let ciphertext = *block;
                    self.decrypt_blocks(std::slice::from_mut(block));
                    xor_inplace(&mut block[..], &prev[..]);
                    prev = ciphertext;
                }
            }
        }
        Ok(())
    }
}

fn as_blocks(data: &mut [u8]) -> Result<&mut [aes::Block], CryptoError> {
    if data.len() % AES_BYTES != 0 {
        return Err(CryptoError::UnalignedLength {
            len: data.len(),
            block: AES_BYTES,
        });
    }
    Ok(bytemuck::cast_slice_mut(data))
}
