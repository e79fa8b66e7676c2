use std::ops::{BitAndAssign, BitOrAssign, BitXorAssign};

/// Bits in a single AES block.
pub(crate) const AES_BITS: usize = 128;
/// Bytes in a single AES block.
pub(crate) const AES_BYTES: usize = AES_BITS / 8;

pub(crate) fn xor_inplace<T: Copy + BitXorAssign>(a: &mut [T], b: &[T]) {
    a.iter_mut().zip(b).for_each(|(a, b)| {
        *a ^= *b;
    });
}

pub(crate) fn and_inplace<T: Copy + BitAndAssign>(a: &mut [T], b: &[T]) {
    a.iter_mut().zip(b).for_each(|(a, b)| {
        *a &= *b;
    });
}

pub(crate) fn or_inplace<T: Copy + BitOrAssign>(a: &mut [T], b: &[T]) {
    a.iter_mut().zip(b).for_each(|(a, b)| {
        *a |= *b;
    });
}

/// `ceil(a / b)`.
#[inline]
pub(crate) const fn ceil_divide(a: usize, b: usize) -> usize {
    a.div_ceil(b)
}

/// Number of bytes needed to hold `bits`.
#[inline]
pub(crate) const fn bits_in_bytes(bits: usize) -> usize {
    ceil_divide(bits, 8)
}

/// `bits` rounded up to a whole number of AES blocks, in bytes.
#[inline]
pub(crate) const fn block_aligned_bytes(bits: usize) -> usize {
    ceil_divide(bits, AES_BITS) * AES_BYTES
}

/// Smallest `k` with `2^k >= x`. `ceil_log2(0) == ceil_log2(1) == 0`.
#[inline]
pub(crate) const fn ceil_log2(x: u64) -> u32 {
    if x <= 1 {
        0
    } else {
        u64::BITS - (x - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_log2() {
        assert_eq!(0, ceil_log2(1));
        assert_eq!(1, ceil_log2(2));
        assert_eq!(2, ceil_log2(3));
        assert_eq!(3, ceil_log2(7));
        assert_eq!(3, ceil_log2(8));
        assert_eq!(4, ceil_log2(9));
        assert_eq!(32, ceil_log2(u32::MAX as u64));
    }

    #[test]
    fn test_block_aligned_bytes() {
        assert_eq!(0, block_aligned_bytes(0));
        assert_eq!(16, block_aligned_bytes(1));
        assert_eq!(16, block_aligned_bytes(128));
        assert_eq!(32, block_aligned_bytes(129));
        assert_eq!(2, bits_in_bytes(9));
    }

    #[test]
    fn test_inplace_ops() {
        let mut a = [0b1100_u8, 0xFF];
        xor_inplace(&mut a, &[0b1010, 0x0F]);
        assert_eq!([0b0110, 0xF0], a);
        and_inplace(&mut a, &[0b0010, 0xFF]);
        assert_eq!([0b0010, 0xF0], a);
        or_inplace(&mut a, &[0b0001, 0x0F]);
        assert_eq!([0b0011, 0xFF], a);
    }
}
