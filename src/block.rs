//! 128-bit blocks as processed by the fixed-key hash.
use std::ops::{BitXor, BitXorAssign};

use aes::cipher::{self, array::sizes};
use bytemuck::{Pod, Zeroable};
use subtle::ConstantTimeEq;
use wide::u8x16;

/// A 128-bit block, XORed with SIMD instructions where available.
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
#[repr(transparent)]
pub(crate) struct Block(u8x16);

impl Block {
    pub(crate) const ZERO: Self = Self(u8x16::ZERO);
    pub(crate) const BYTES: usize = 16;

    #[inline]
    pub(crate) const fn new(bytes: [u8; 16]) -> Self {
        Self(u8x16::new(bytes))
    }

    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_array_ref()
    }

    /// A block holding `bytes` followed by zeros.
    ///
    /// # Panics
    /// If `bytes` is longer than a block.
    #[inline]
    pub(crate) fn from_padded(bytes: &[u8]) -> Self {
        let mut padded = Self::ZERO;
        padded.0.as_array_mut()[..bytes.len()].copy_from_slice(bytes);
        padded
    }
}

impl BitXor for Block {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 = self.0 ^ rhs.0;
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes()[..].ct_eq(&other.as_bytes()[..]).into()
    }
}

impl Eq for Block {}

impl From<Block> for cipher::Array<u8, sizes::U16> {
    #[inline]
    fn from(value: Block) -> Self {
        Self(*value.as_bytes())
    }
}

impl From<cipher::Array<u8, sizes::U16>> for Block {
    #[inline]
    fn from(value: cipher::Array<u8, sizes::U16>) -> Self {
        Self::new(value.0)
    }
}

impl From<u128> for Block {
    #[inline]
    fn from(value: u128) -> Self {
        Self::new(value.to_le_bytes())
    }
}
