use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{
    Digest, Sha256, Sha512,
    digest::{Output, generic_array::GenericArray},
};

use super::SecLevel;

/// The hash function used by [`Crypto`](super::Crypto), chosen once per security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashFunction {
    /// SHA-1, 20 byte digests.
    Sha1,
    /// SHA-256, 32 byte digests.
    Sha256,
    /// SHA-512, 64 byte digests.
    Sha512,
}

impl HashFunction {
    /// SHA-1 for 80 bit, SHA-256 for 112 and 128 bit, SHA-512 above.
    pub fn for_seclvl(seclvl: &SecLevel) -> Self {
        match seclvl.symbits {
            0..=80 => Self::Sha1,
            81..=128 => Self::Sha256,
            _ => Self::Sha512,
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => <Sha1 as Digest>::output_size(),
            Self::Sha256 => <Sha256 as Digest>::output_size(),
            Self::Sha512 => <Sha512 as Digest>::output_size(),
        }
    }

    /// Hash the concatenation of `parts` into `scratch`, which must be exactly
    /// [`HashFunction::output_len`] bytes.
    pub(crate) fn digest_into(&self, parts: &[&[u8]], scratch: &mut [u8]) {
        match self {
            Self::Sha1 => digest_parts::<Sha1>(parts, scratch),
            Self::Sha256 => digest_parts::<Sha256>(parts, scratch),
            Self::Sha512 => digest_parts::<Sha512>(parts, scratch),
        }
    }
}

fn digest_parts<D: Digest>(parts: &[&[u8]], scratch: &mut [u8]) {
    assert_eq!(
        <D as Digest>::output_size(),
        scratch.len(),
        "scratch must be as long as the digest"
    );
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    let out: &mut Output<D> = GenericArray::from_mut_slice(scratch);
    hasher.finalize_into(out);
}
