//! PRF based on AES in counter mode.
//!
//! Output block `i` is `E_k(i)` where the counter `i` is encoded as a little-endian 128-bit
//! integer. On platforms with hardware accelerated AES instructions, the blocks are
//! encrypted in batches of [`AES_PAR_BLOCKS`] to make use of instruction-level parallelism.
use rand::{CryptoRng, RngCore};

use super::{CryptoError, SymmetricCipher};
use crate::utils::AES_BYTES;

/// A keyed AES counter-mode PRF.
///
/// Every request for `n` bytes consumes `ceil(n / 16)` counter values, the unused tail of
/// the last block is discarded.
#[derive(Clone, Debug)]
pub struct PrfState {
    cipher: SymmetricCipher,
    ctr: u64,
}

impl PrfState {
    /// PRF keyed with `seed`, which must be a 16 or 32 byte AES key.
    pub fn new(seed: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            cipher: SymmetricCipher::new(seed)?,
            ctr: 0,
        })
    }

    /// Fill `buf` with the next `ceil(buf.len() / 16)` output blocks.
    pub fn fill(&mut self, buf: &mut [u8]) {
        let mut tmp = [aes::Block::default(); AES_PAR_BLOCKS];
        for chunk in buf.chunks_mut(AES_PAR_BLOCKS * AES_BYTES) {
            let blocks = &mut tmp[..chunk.len().div_ceil(AES_BYTES)];
            for block in blocks.iter_mut() {
                // aes::Block is a type alias to Array, but type aliases can't be used as
                // constructors
                *block = aes::cipher::Array(u128::from(self.ctr).to_le_bytes());
                self.ctr = self.ctr.wrapping_add(1);
            }
            self.cipher.encrypt_blocks(blocks);
            let bytes = bytemuck::cast_slice::<aes::Block, u8>(blocks);
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    /// Number of blocks generated so far.
    pub fn counter(&self) -> u64 {
        self.ctr
    }
}

impl RngCore for PrfState {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0; 4];
        self.fill(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0; 8];
        self.fill(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.fill(dest);
    }
}

impl CryptoRng for PrfState {}

/// Number of Blocks for which hardware accelerated AES can make use of ILP.
///
/// This corresponds to `ParBlocksSize` in [`aes::cipher::ParBlocksSizeUser`]
/// for the SIMD backend on the target architecture. Its value only influences
/// performance, never the generated output.
// https://github.com/RustCrypto/block-ciphers/blob/4da9b802de52a3326fdc74d559caddd57042fed2/aes/src/ni.rs#L43
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub const AES_PAR_BLOCKS: usize = 9;
#[cfg(target_arch = "aarch64")]
// https://github.com/RustCrypto/block-ciphers/blob/4da9b802de52a3326fdc74d559caddd57042fed2/aes/src/armv8.rs#L32
pub const AES_PAR_BLOCKS: usize = 21;
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub const AES_PAR_BLOCKS: usize = 4;
