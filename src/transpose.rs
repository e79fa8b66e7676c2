//! Transpose bit-matrices fast.
//!
//! Matrices are stored row-major with MSB-first bit order: bit `c` of row `r` is the bit
//! `7 - c % 8` of byte `r * cols / 8 + c / 8`. This is the layout used by
//! [`BitVector`](crate::bitvec::BitVector).
//!
//! The matrix is split into 128x128 tiles. Each tile is loaded as 128 big-endian `u128`
//! rows (so column 0 is the most significant bit) and transposed in place with Eklundh's
//! method: for strides 64, 32, .., 1 the upper-right and lower-left `stride x stride`
//! sub-blocks of every `2*stride` band are swapped with one masked XOR-swap per row pair.
//! This needs `128 * 7` word operations per tile instead of `128 * 128` bit moves.

/// Width and height of a transposition tile.
pub const TILE_BITS: usize = 128;

const TILE_BYTES: usize = TILE_BITS / 8;

/// `EKLUNDH_MASKS[i]` selects the low `stride` bits of every `2*stride` bit group, for
/// `stride = 64 >> i`.
const EKLUNDH_MASKS: [u128; 7] = [
    0x0000_0000_0000_0000_FFFF_FFFF_FFFF_FFFF,
    0x0000_0000_FFFF_FFFF_0000_0000_FFFF_FFFF,
    0x0000_FFFF_0000_FFFF_0000_FFFF_0000_FFFF,
    0x00FF_00FF_00FF_00FF_00FF_00FF_00FF_00FF,
    0x0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0F,
    0x3333_3333_3333_3333_3333_3333_3333_3333,
    0x5555_5555_5555_5555_5555_5555_5555_5555,
];

/// Transpose a single 128x128 bit tile in place.
///
/// `tile[r]` holds row `r`, with column 0 in the most significant bit.
pub fn transpose_tile(tile: &mut [u128; TILE_BITS]) {
    let mut stride = TILE_BITS / 2;
    for mask in EKLUNDH_MASKS {
        let mut band = 0;
        while band < TILE_BITS {
            for upper in band..band + stride {
                let lower = upper + stride;
                // swap the right half of the upper row with the left half of the lower row
                let t = (tile[upper] ^ (tile[lower] >> stride)) & mask;
                tile[upper] ^= t;
                tile[lower] ^= t << stride;
            }
            band += 2 * stride;
        }
        stride /= 2;
    }
}

/// Transpose a bit matrix with `rows` rows from `input` into `output`.
///
/// The number of columns is `input.len() * 8 / rows`. `output` receives the transposed
/// matrix with `cols` rows of `rows` bits each.
///
/// # Panics
/// - If `input.len() != output.len()`
/// - If `rows` is zero or not divisible by 128
/// - If `input.len()` is not divisible by `rows / 8`
/// - If the number of columns is zero or not divisible by 128
pub fn transpose_bitmatrix(input: &[u8], output: &mut [u8], rows: usize) {
    assert_eq!(input.len(), output.len());
    assert!(rows >= TILE_BITS, "Number of rows must be >= 128.");
    assert_eq!(0, rows % TILE_BITS, "Number of rows must be a multiple of 128.");
    assert_eq!(
        0,
        input.len() % (rows / 8),
        "input.len() must be divisible by rows / 8"
    );
    let cols = input.len() * 8 / rows;
    assert!(cols >= TILE_BITS, "columns must be at least 128. Columns {cols}");
    assert_eq!(
        0,
        cols % TILE_BITS,
        "Number of columns must be a multiple of 128. Columns {cols}"
    );

    let in_row_bytes = cols / 8;
    let out_row_bytes = rows / 8;
    let mut tile = [0_u128; TILE_BITS];
    for tile_row in 0..rows / TILE_BITS {
        for tile_col in 0..cols / TILE_BITS {
            for (i, row) in tile.iter_mut().enumerate() {
                let start = (tile_row * TILE_BITS + i) * in_row_bytes + tile_col * TILE_BYTES;
                *row = u128::from_be_bytes(load(&input[start..start + TILE_BYTES]));
            }
            transpose_tile(&mut tile);
            for (i, row) in tile.iter().enumerate() {
                let start = (tile_col * TILE_BITS + i) * out_row_bytes + tile_row * TILE_BYTES;
                output[start..start + TILE_BYTES].copy_from_slice(&row.to_be_bytes());
            }
        }
    }
}

/// Bit-by-bit transpose, usable for any dimensions divisible by 8.
///
/// # Panics
/// - If `input.len() != output.len()`
/// - If `rows` or `cols` is not divisible by 8
/// - If `input.len() != rows * cols / 8`
pub fn simple_transpose_bitmatrix(input: &[u8], output: &mut [u8], rows: usize, cols: usize) {
    assert_eq!(input.len(), output.len());
    assert_eq!(0, rows % 8, "rows must be divisible by 8");
    assert_eq!(0, cols % 8, "columns must be divisible by 8");
    assert_eq!(rows * cols / 8, input.len(), "input.len() must be rows * cols / 8");

    output.fill(0);
    for r in 0..rows {
        for c in 0..cols {
            let src = r * cols + c;
            if input[src / 8] & (0x80 >> (src % 8)) != 0 {
                let dst = c * rows + r;
                output[dst / 8] |= 0x80 >> (dst % 8);
            }
        }
    }
}

#[inline]
fn load(bytes: &[u8]) -> [u8; TILE_BYTES] {
    let mut arr = [0; TILE_BYTES];
    arr.copy_from_slice(bytes);
    arr
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn arbitrary_bitmat(max_tiles: usize) -> BoxedStrategy<(Vec<u8>, usize, usize)> {
        ((1..=max_tiles), (1..=max_tiles))
            .prop_flat_map(|(row_tiles, col_tiles)| {
                let rows = row_tiles * TILE_BITS;
                let cols = col_tiles * TILE_BITS;
                (vec![any::<u8>(); rows * cols / 8], Just(rows), Just(cols))
            })
            .boxed()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[cfg(not(miri))]
        #[test]
        fn test_double_transpose((v, rows, cols) in arbitrary_bitmat(3)) {
            let mut transposed = vec![0; v.len()];
            let mut double_transposed = vec![0; v.len()];
            transpose_bitmatrix(&v, &mut transposed, rows);
            transpose_bitmatrix(&transposed, &mut double_transposed, cols);

            prop_assert_eq!(v, double_transposed);
        }

        #[cfg(not(miri))]
        #[test]
        fn test_eklundh_matches_simple((v, rows, cols) in arbitrary_bitmat(2)) {
            let mut fast = vec![0; v.len()];
            let mut slow = vec![0; v.len()];
            transpose_bitmatrix(&v, &mut fast, rows);
            simple_transpose_bitmatrix(&v, &mut slow, rows, cols);

            prop_assert_eq!(fast, slow);
        }
    }

    #[test]
    fn test_masks() {
        for (i, mask) in EKLUNDH_MASKS.iter().enumerate() {
            let stride = 64 >> i;
            assert_eq!(u128::MAX / ((1_u128 << stride) + 1), *mask);
        }
    }

    #[test]
    fn test_single_bit_moves() {
        let rows = 128;
        let cols = 256;
        let mut input = vec![0_u8; rows * cols / 8];
        // row 3, column 200
        let pos = 3 * cols + 200;
        input[pos / 8] |= 0x80 >> (pos % 8);
        let mut output = vec![0_u8; input.len()];
        transpose_bitmatrix(&input, &mut output, rows);

        let expected = 200 * rows + 3;
        for (i, byte) in output.iter().enumerate() {
            if i == expected / 8 {
                assert_eq!(0x80 >> (expected % 8), *byte);
            } else {
                assert_eq!(0, *byte);
            }
        }
    }

    #[test]
    #[should_panic(expected = "multiple of 128")]
    fn test_misaligned_rows_panic() {
        let input = vec![0_u8; 192 * 128 / 8];
        let mut output = vec![0_u8; input.len()];
        transpose_bitmatrix(&input, &mut output, 192);
    }
}
