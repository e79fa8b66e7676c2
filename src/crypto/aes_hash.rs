//! Correlation robust fixed-key AES hash.
//!
//! This implementation of a correlation robust AES hash function
//! is based on the findings of <https://eprint.iacr.org/2019/074>.
use std::sync::LazyLock;

use aes::{
    Aes128,
    cipher::{BlockCipherEncrypt, Key, KeyInit},
};

use super::AES_PAR_BLOCKS;
use crate::block::Block;

/// AES accelerated hashing of [`Block`]s.
#[derive(Clone)]
pub(crate) struct AesHash {
    aes: Aes128,
}

impl AesHash {
    /// Create a new `AesHash` with the given key.
    pub(crate) fn new(key: &Key<Aes128>) -> Self {
        Self {
            aes: Aes128::new(key),
        }
    }

    /// Compute the correlation robust hash of a block.
    ///
    /// Calculates `π(x) ^ x`.
    #[cfg(test)]
    pub(crate) fn cr_hash_block(&self, x: Block) -> Block {
        let mut x_enc = x.into();
        self.aes.encrypt_block(&mut x_enc);
        x ^ x_enc.into()
    }

    /// Correlation robust hash of a slice of blocks.
    ///
    /// Calculates `π(x) ^ x` in-place.
    ///
    /// Warning: only secure in semi-honest setting!
    /// See <https://eprint.iacr.org/2019/074> for details.
    pub(crate) fn cr_hash_slice_mut(&self, x: &mut [Block]) {
        let mut tmp = [aes::Block::default(); AES_PAR_BLOCKS];

        for chunk in x.chunks_mut(AES_PAR_BLOCKS) {
            self.aes
                .encrypt_blocks_b2b(bytemuck::cast_slice(chunk), &mut tmp[..chunk.len()])
                .expect("in and out always have same length");
            chunk
                .iter_mut()
                .zip(tmp)
                .for_each(|(x, x_enc)| *x ^= x_enc.into());
        }
    }

    /// Hash `input`, zero-padded to whole blocks, and write the first `out.len()` bytes
    /// of the result to `out`.
    ///
    /// # Panics
    /// If `out` is longer than the padded input.
    pub(crate) fn hash_padded(&self, out: &mut [u8], input: &[u8]) {
        let mut blocks: Vec<Block> = input.chunks(Block::BYTES).map(Block::from_padded).collect();
        let hashed_len = blocks.len() * Block::BYTES;
        assert!(
            out.len() <= hashed_len,
            "output of {} bytes exceeds the padded input of {hashed_len} bytes",
            out.len()
        );
        self.cr_hash_slice_mut(&mut blocks);
        out.copy_from_slice(&bytemuck::cast_slice::<Block, u8>(&blocks)[..out.len()]);
    }
}

/// An `AesHash` with a fixed, public key.
pub(crate) static FIXED_KEY_HASH: LazyLock<AesHash> = LazyLock::new(|| {
    let key = 0xFFEE_DDCC_BBAA_9988_7766_5544_3322_1100_u128
        .to_le_bytes()
        .into();
    AesHash::new(&key)
});
