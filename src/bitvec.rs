//! A byte-aligned, heap-allocated bit vector.
//!
//! Bits are numbered MSB-first within each byte: bit 0 is the most significant bit of byte
//! 0, bit 7 the least significant bit of byte 0, bit 8 the most significant bit of byte 1
//! and so on. Bit ranges handed to or read from byte slices use the same order.
//!
//! Indices are not validated beyond Rust's slice bounds checks, i.e. accessing a bit or byte
//! outside of the allocated buffer panics.
use std::fmt;

use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::{
    crypto::Crypto,
    transpose::{TILE_BITS, simple_transpose_bitmatrix, transpose_bitmatrix},
    utils::{and_inplace, bits_in_bytes, block_aligned_bytes, or_inplace, xor_inplace},
};

/// `MASK_BIT[i]` selects bit `i` of a byte.
const MASK_BIT: [u8; 8] = [0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01];
/// `CMASK_BIT[i]` selects every bit of a byte except bit `i`.
const CMASK_BIT: [u8; 8] = [0x7F, 0xBF, 0xDF, 0xEF, 0xF7, 0xFB, 0xFD, 0xFE];
/// `TOP_MASK[n]` selects the first `n` bits of a byte.
const TOP_MASK: [u8; 9] = [0x00, 0x80, 0xC0, 0xE0, 0xF0, 0xF8, 0xFC, 0xFE, 0xFF];

/// Contract violations detected by [`BitVector`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitVectorError {
    /// The matrix dimensions are not supported by the requested transposition.
    #[error("bit matrix dimensions {rows}x{cols} must be non-zero multiples of {align}")]
    MisalignedDimensions {
        /// Rows of the matrix.
        rows: usize,
        /// Columns of the matrix.
        cols: usize,
        /// Required alignment of both dimensions.
        align: usize,
    },
    /// The vector is too small to hold the matrix.
    #[error("bit matrix needs {needed} bytes but the vector holds {available}")]
    TooSmall {
        /// Bytes needed by the matrix.
        needed: usize,
        /// Bytes allocated in the vector.
        available: usize,
    },
}

#[derive(Clone, Copy)]
enum BitOp {
    Set,
    Xor,
    And,
}

/// A dynamically sized bit vector that exclusively owns its byte buffer.
#[derive(Clone, Debug)]
pub struct BitVector {
    bits: Vec<u8>,
    element_length: usize,
}

impl Default for BitVector {
    fn default() -> Self {
        Self {
            bits: Vec::new(),
            element_length: 1,
        }
    }
}

impl BitVector {
    /// An empty vector without an allocated buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A zeroed vector holding at least `bits` bits, rounded up to whole AES blocks.
    pub fn with_bits(bits: usize) -> Self {
        Self::from_bytes(vec![0; block_aligned_bytes(bits)])
    }

    /// A zeroed vector of exactly `ceil(bits / 8)` bytes.
    pub fn with_exact_bits(bits: usize) -> Self {
        Self::from_bytes(vec![0; bits_in_bytes(bits)])
    }

    /// A zeroed vector holding at least `bytes` bytes, rounded up to whole AES blocks.
    pub fn with_bytes(bytes: usize) -> Self {
        Self::with_bits(bytes * 8)
    }

    /// A zeroed vector of `num` elements of `element_length` bits each.
    pub fn with_elements(num: usize, element_length: usize) -> Self {
        let mut v = Self::with_bits(num * element_length);
        v.element_length = element_length;
        v
    }

    /// A vector of at least `bits` bits (block aligned) filled from the PRF of `crypto`.
    pub fn random(bits: usize, crypto: &Crypto) -> Self {
        let mut v = Self::with_bits(bits);
        crypto.gen_rnd(&mut v.bits);
        v
    }

    /// Take ownership of an existing buffer.
    pub fn from_bytes(bits: Vec<u8>) -> Self {
        Self {
            bits,
            element_length: 1,
        }
    }

    /// Fill the whole buffer with PRF output, first growing it to hold `bits` bits
    /// (block aligned) if it is smaller.
    pub fn fill_rand(&mut self, bits: usize, crypto: &Crypto) {
        let needed = block_aligned_bytes(bits);
        if needed > self.bits.len() {
            self.bits.resize(needed, 0);
        }
        crypto.gen_rnd(&mut self.bits);
    }

    /// Resize to `bytes` bytes. The prefix is kept, new bytes are zero.
    pub fn resize_bytes(&mut self, bytes: usize) {
        self.bits.resize(bytes, 0);
    }

    /// Resize to `ceil(bits / 8)` bytes. The prefix is kept, new bytes are zero.
    pub fn resize_bits(&mut self, bits: usize) {
        self.resize_bytes(bits_in_bytes(bits));
    }

    /// Free the buffer.
    pub fn clear(&mut self) {
        self.bits = Vec::new();
    }

    /// Size of the buffer in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.bits.len()
    }

    /// Size of the buffer in bits.
    #[inline]
    pub fn bit_len(&self) -> usize {
        self.bits.len() * 8
    }

    /// `true` if no buffer is allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Length of a single element in bits.
    #[inline]
    pub fn element_length(&self) -> usize {
        self.element_length
    }

    /// Set the length of a single element in bits.
    pub fn set_element_length(&mut self, element_length: usize) {
        self.element_length = element_length;
    }

    /// The underlying bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// The underlying bytes, mutably.
    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bits
    }

    /// Consume the vector and return its buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bits
    }

    /// Bit `idx`.
    #[inline]
    pub fn get_bit(&self, idx: usize) -> bool {
        self.bits[idx >> 3] & MASK_BIT[idx & 7] != 0
    }

    /// Overwrite bit `idx`.
    #[inline]
    pub fn set_bit(&mut self, idx: usize, bit: bool) {
        let byte = &mut self.bits[idx >> 3];
        *byte = (*byte & CMASK_BIT[idx & 7]) | (u8::from(bit) << (7 - (idx & 7)));
    }

    /// Set bit `idx` by OR-ing `bit` into it.
    ///
    /// The bit at `idx` must currently be 0, otherwise the result is wrong. This is only
    /// checked in debug builds.
    #[inline]
    pub fn set_bit_no_mask(&mut self, idx: usize, bit: bool) {
        debug_assert!(!self.get_bit(idx), "bit {idx} must be 0 before set_bit_no_mask");
        self.bits[idx >> 3] |= u8::from(bit) << (7 - (idx & 7));
    }

    /// XOR `bit` into bit `idx`.
    #[inline]
    pub fn xor_bit(&mut self, idx: usize, bit: bool) {
        if bit {
            self.bits[idx >> 3] ^= MASK_BIT[idx & 7];
        }
    }

    /// XOR `bit` into bit `idx` without a table lookup.
    #[inline]
    pub fn xor_bit_no_mask(&mut self, idx: usize, bit: bool) {
        self.bits[idx >> 3] ^= u8::from(bit) << (7 - (idx & 7));
    }

    /// AND `bit` into bit `idx`.
    #[inline]
    pub fn and_bit(&mut self, idx: usize, bit: bool) {
        if !bit {
            self.bits[idx >> 3] &= CMASK_BIT[idx & 7];
        }
    }

    /// Copy the bits `[pos, pos + len)` into `dst`, starting at the first bit of `dst`.
    ///
    /// Unused trailing bits of the last written byte of `dst` are cleared.
    pub fn get_bits(&self, dst: &mut [u8], pos: usize, len: usize) {
        let nbytes = bits_in_bytes(len);
        let rem = len % 8;
        if pos % 8 == 0 {
            let start = pos / 8;
            dst[..nbytes].copy_from_slice(&self.bits[start..start + nbytes]);
            if rem != 0 {
                dst[nbytes - 1] &= TOP_MASK[rem];
            }
            return;
        }
        for (k, byte) in dst[..nbytes].iter_mut().enumerate() {
            let nbits = (len - 8 * k).min(8);
            *byte = read_bits(&self.bits, pos + 8 * k, nbits);
        }
    }

    /// Overwrite the bits `[pos, pos + len)` with the first `len` bits of `src`.
    pub fn set_bits(&mut self, src: &[u8], pos: usize, len: usize) {
        self.apply_bits(src, pos, len, BitOp::Set);
    }

    /// XOR the first `len` bits of `src` into the bits `[pos, pos + len)`.
    pub fn xor_bits(&mut self, src: &[u8], pos: usize, len: usize) {
        self.apply_bits(src, pos, len, BitOp::Xor);
    }

    /// AND the first `len` bits of `src` into the bits `[pos, pos + len)`.
    pub fn and_bits(&mut self, src: &[u8], pos: usize, len: usize) {
        self.apply_bits(src, pos, len, BitOp::And);
    }

    /// Overwrite the bits `[pos, pos + len)` with the bits `[src_pos, src_pos + len)` of
    /// `src`.
    pub fn set_bits_pos_offset(&mut self, src: &[u8], src_pos: usize, pos: usize, len: usize) {
        if src_pos % 8 == 0 {
            self.set_bits(&src[src_pos / 8..], pos, len);
            return;
        }
        for k in 0..bits_in_bytes(len) {
            let nbits = (len - 8 * k).min(8);
            let value = read_bits(src, src_pos + 8 * k, nbits);
            self.merge_bits(pos + 8 * k, value, nbits, BitOp::Set);
        }
    }

    /// Read `len <= 64` bits starting at `pos` as an integer. Bit `j` of the result is the
    /// bit at `pos + j`.
    ///
    /// # Panics
    /// If `len > 64`.
    pub fn get_int(&self, pos: usize, len: usize) -> u64 {
        assert!(len <= 64, "at most 64 bits fit into an integer");
        (0..len).fold(0, |acc, j| acc | (u64::from(self.get_bit(pos + j)) << j))
    }

    /// Write the low `len <= 64` bits of `value` starting at `pos`. Bit `j` of `value`
    /// is written to the bit at `pos + j`.
    ///
    /// # Panics
    /// If `len > 64`.
    pub fn set_int(&mut self, value: u64, pos: usize, len: usize) {
        assert!(len <= 64, "at most 64 bits fit into an integer");
        for j in 0..len {
            self.set_bit(pos + j, (value >> j) & 1 == 1);
        }
    }

    /// Element `idx` of [`BitVector::element_length`] bits.
    pub fn get_element(&self, idx: usize) -> u64 {
        self.get_int(idx * self.element_length, self.element_length)
    }

    /// Overwrite element `idx` of [`BitVector::element_length`] bits.
    pub fn set_element(&mut self, idx: usize, value: u64) {
        self.set_int(value, idx * self.element_length, self.element_length);
    }

    /// Byte `idx`.
    #[inline]
    pub fn get_byte(&self, idx: usize) -> u8 {
        self.bits[idx]
    }

    /// Overwrite byte `idx`.
    #[inline]
    pub fn set_byte(&mut self, idx: usize, value: u8) {
        self.bits[idx] = value;
    }

    /// XOR `value` into byte `idx`.
    #[inline]
    pub fn xor_byte(&mut self, idx: usize, value: u8) {
        self.bits[idx] ^= value;
    }

    /// AND `value` into byte `idx`.
    #[inline]
    pub fn and_byte(&mut self, idx: usize, value: u8) {
        self.bits[idx] &= value;
    }

    /// Overwrite `src.len()` bytes starting at byte `pos`.
    pub fn set_bytes(&mut self, src: &[u8], pos: usize) {
        self.bits[pos..pos + src.len()].copy_from_slice(src);
    }

    /// XOR `src` into the bytes starting at byte `pos`.
    pub fn xor_bytes(&mut self, src: &[u8], pos: usize) {
        xor_inplace(&mut self.bits[pos..pos + src.len()], src);
    }

    /// AND `src` into the bytes starting at byte `pos`.
    pub fn and_bytes(&mut self, src: &[u8], pos: usize) {
        and_inplace(&mut self.bits[pos..pos + src.len()], src);
    }

    /// XOR `other` into `self` over the bytes both vectors have.
    pub fn xor(&mut self, other: &BitVector) {
        xor_inplace(&mut self.bits, &other.bits);
    }

    /// AND `other` into `self` over the bytes both vectors have.
    pub fn and(&mut self, other: &BitVector) {
        and_inplace(&mut self.bits, &other.bits);
    }

    /// OR `other` into `self` over the bytes both vectors have.
    pub fn or(&mut self, other: &BitVector) {
        or_inplace(&mut self.bits, &other.bits);
    }

    /// Make `self` an exact copy of `other`.
    pub fn copy_from(&mut self, other: &BitVector) {
        self.bits.clone_from(&other.bits);
        self.element_length = other.element_length;
    }

    /// Copy the first `len` bytes of `src` into `self` starting at byte `pos`.
    ///
    /// `pos` is an offset into `self` only, `src` is always read from its beginning. To
    /// copy a window of `src`, slice it first and use [`BitVector::copy_bytes`]. The
    /// vector grows if `pos + len` exceeds its size.
    pub fn copy(&mut self, src: &BitVector, pos: usize, len: usize) {
        self.copy_bytes(&src.bits, pos, len);
    }

    /// Copy the first `len` bytes of `src` into `self` starting at byte `pos`.
    ///
    /// See [`BitVector::copy`].
    pub fn copy_bytes(&mut self, src: &[u8], pos: usize, len: usize) {
        if pos + len > self.bits.len() {
            self.bits.resize(pos + len, 0);
        }
        self.bits[pos..pos + len].copy_from_slice(&src[..len]);
    }

    /// Constant-time comparison of the bytes both vectors have.
    pub fn is_equal(&self, other: &BitVector) -> bool {
        let n = self.bits.len().min(other.bits.len());
        self.bits[..n].ct_eq(&other.bits[..n]).into()
    }

    /// Constant-time comparison of the bytes `[from, to)`.
    ///
    /// Returns `false` if the range is empty-reversed or exceeds either vector.
    pub fn is_equal_range(&self, other: &BitVector, from: usize, to: usize) -> bool {
        if from > to || to > self.bits.len() || to > other.bits.len() {
            return false;
        }
        self.bits[from..to].ct_eq(&other.bits[from..to]).into()
    }

    /// Comparison of the bits `[from, to)`.
    ///
    /// Returns `false` if the range is reversed or exceeds either vector.
    pub fn is_equal_bits(&self, other: &BitVector, from: usize, to: usize) -> bool {
        if from > to || to > self.bit_len() || to > other.bit_len() {
            return false;
        }
        let len = to - from;
        let mut a = vec![0; bits_in_bytes(len)];
        let mut b = vec![0; bits_in_bytes(len)];
        self.get_bits(&mut a, from, len);
        other.get_bits(&mut b, from, len);
        a.ct_eq(&b).into()
    }

    /// Set every bit to 0.
    pub fn reset(&mut self) {
        self.bits.fill(0);
    }

    /// Set the bytes `[from_byte, to_byte)` to 0.
    pub fn reset_from_to(&mut self, from_byte: usize, to_byte: usize) {
        self.bits[from_byte..to_byte].fill(0);
    }

    /// Set every bit to 1.
    pub fn set_to_one(&mut self) {
        self.bits.fill(0xFF);
    }

    /// Flip every bit.
    pub fn invert(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = !*b);
    }

    /// Transpose the row-major `rows x cols` bit matrix stored at the start of the vector.
    ///
    /// Both dimensions must be non-zero multiples of 128. Afterwards the vector holds the
    /// `cols x rows` transposed matrix. Bytes after the matrix are left untouched.
    pub fn transpose(&mut self, rows: usize, cols: usize) -> Result<(), BitVectorError> {
        let needed = self.check_matrix(rows, cols, TILE_BITS)?;
        let input = self.bits[..needed].to_vec();
        transpose_bitmatrix(&input, &mut self.bits[..needed], rows);
        Ok(())
    }

    /// Bit-by-bit transpose of the `rows x cols` bit matrix at the start of the vector.
    ///
    /// Slower than [`BitVector::transpose`], but only requires multiples of 8.
    pub fn simple_transpose(&mut self, rows: usize, cols: usize) -> Result<(), BitVectorError> {
        let needed = self.check_matrix(rows, cols, 8)?;
        let input = self.bits[..needed].to_vec();
        simple_transpose_bitmatrix(&input, &mut self.bits[..needed], rows, cols);
        Ok(())
    }

    fn check_matrix(&self, rows: usize, cols: usize, align: usize) -> Result<usize, BitVectorError> {
        if rows == 0 || cols == 0 || rows % align != 0 || cols % align != 0 {
            return Err(BitVectorError::MisalignedDimensions { rows, cols, align });
        }
        let needed = rows * cols / 8;
        if needed > self.bits.len() {
            return Err(BitVectorError::TooSmall {
                needed,
                available: self.bits.len(),
            });
        }
        Ok(needed)
    }

    fn apply_bits(&mut self, src: &[u8], pos: usize, len: usize, op: BitOp) {
        let full = len / 8;
        if pos % 8 == 0 {
            let start = pos / 8;
            let dst = &mut self.bits[start..start + full];
            match op {
                BitOp::Set => dst.copy_from_slice(&src[..full]),
                BitOp::Xor => xor_inplace(dst, &src[..full]),
                BitOp::And => and_inplace(dst, &src[..full]),
            }
        } else {
            for (k, value) in src[..full].iter().enumerate() {
                self.merge_bits(pos + 8 * k, *value, 8, op);
            }
        }
        let rem = len % 8;
        if rem != 0 {
            self.merge_bits(pos + 8 * full, src[full], rem, op);
        }
    }

    /// Combine the first `nbits` bits of `value` into the bits `[pos, pos + nbits)`,
    /// which may span two bytes.
    fn merge_bits(&mut self, pos: usize, value: u8, nbits: usize, op: BitOp) {
        debug_assert!((1..=8).contains(&nbits));
        let idx = pos / 8;
        let off = pos % 8;
        let mask = (u16::from(TOP_MASK[nbits]) << 8) >> off;
        let value = ((u16::from(value) << 8) >> off) & mask;
        apply_byte(&mut self.bits[idx], (mask >> 8) as u8, (value >> 8) as u8, op);
        if mask as u8 != 0 {
            apply_byte(&mut self.bits[idx + 1], mask as u8, value as u8, op);
        }
    }
}

#[inline]
fn apply_byte(byte: &mut u8, mask: u8, value: u8, op: BitOp) {
    match op {
        BitOp::Set => *byte = (*byte & !mask) | value,
        BitOp::Xor => *byte ^= value,
        BitOp::And => *byte &= value | !mask,
    }
}

/// Read `nbits <= 8` bits starting at bit `pos`, returned in the top bits of a byte.
#[inline]
fn read_bits(bytes: &[u8], pos: usize, nbits: usize) -> u8 {
    let idx = pos / 8;
    let off = pos % 8;
    let hi = u16::from(bytes[idx]) << 8;
    let lo = if off + nbits > 8 {
        u16::from(bytes[idx + 1])
    } else {
        0
    };
    (((hi | lo) << off) >> 8) as u8 & TOP_MASK[nbits]
}

impl fmt::LowerHex for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bits {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Binary for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bits {
            write!(f, "{byte:08b}")?;
        }
        Ok(())
    }
}
