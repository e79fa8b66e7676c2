use std::sync::Mutex;

use rand::RngCore;
use tracing::debug;

use super::{
    BlockMode, CryptoError, HashFunction, PrfState, SecLevel, SymmetricCipher,
    aes_hash::FIXED_KEY_HASH,
};
use crate::{
    transport::Socket,
    utils::{ceil_log2, xor_inplace},
};

/// Randomness, encryption and hashing at one security level.
///
/// The PRF state lives behind a mutex, so a `Crypto` can be shared between threads
/// (e.g. in an `Arc`) and every [`Crypto::gen_rnd`] call draws fresh counter blocks.
#[derive(Debug)]
pub struct Crypto {
    seclvl: SecLevel,
    hash_function: HashFunction,
    prf: Mutex<PrfState>,
    enc: Option<(SymmetricCipher, BlockMode)>,
    hash_scratch: Vec<u8>,
}

impl Crypto {
    /// Set up the primitives for `symbits` bit symmetric security.
    ///
    /// The PRF is keyed with `seed`, which must be [`SecLevel::aes_key_bytes`] long, or
    /// with a fresh key from the OS random number generator if no seed is given.
    pub fn new(symbits: u32, seed: Option<&[u8]>) -> Result<Self, CryptoError> {
        let seclvl = SecLevel::from_symbits(symbits)?;
        let key_bytes = seclvl.aes_key_bytes();
        let prf = match seed {
            Some(seed) if seed.len() != key_bytes => {
                return Err(CryptoError::SeedLength {
                    expected: key_bytes,
                    actual: seed.len(),
                });
            }
            Some(seed) => PrfState::new(seed)?,
            None => {
                let mut key = vec![0; key_bytes];
                rand::rng().fill_bytes(&mut key);
                PrfState::new(&key)?
            }
        };
        let hash_function = HashFunction::for_seclvl(&seclvl);
        debug!(
            symbits,
            ?hash_function,
            seeded = seed.is_some(),
            "initialized crypto"
        );
        Ok(Self {
            seclvl,
            hash_function,
            prf: Mutex::new(prf),
            enc: None,
            hash_scratch: vec![0; hash_function.output_len()],
        })
    }

    /// Fill `buf` with PRF output.
    pub fn gen_rnd(&self, buf: &mut [u8]) {
        self.prf.lock().expect("poison").fill(buf);
    }

    /// `len` bytes of PRF output.
    pub fn gen_rnd_vec(&self, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.gen_rnd(&mut buf);
        buf
    }

    /// Fill `buf` from a fresh PRF keyed with `seed`. The shared PRF is not touched.
    pub fn gen_rnd_from_seed(&self, buf: &mut [u8], seed: &[u8]) -> Result<(), CryptoError> {
        PrfState::new(seed)?.fill(buf);
        Ok(())
    }

    /// A value in `0..modulus` with a statistical distance to uniform below
    /// `2^-symbits`.
    ///
    /// # Panics
    /// If `modulus` is zero.
    pub fn gen_rnd_uniform(&self, modulus: u32) -> u32 {
        assert_ne!(0, modulus, "modulus must be non-zero");
        let words = (self.seclvl.symbits + ceil_log2(u64::from(modulus))).div_ceil(u32::BITS);
        let mut buf = vec![0; words as usize * 4];
        self.gen_rnd(&mut buf);
        let modulus = u64::from(modulus);
        let value = buf.chunks_exact(4).fold(0, |acc, word| {
            let word = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            ((acc << u32::BITS) | u64::from(word)) % modulus
        });
        // value < modulus <= u32::MAX
        value as u32
    }

    /// A uniformly random permutation of `0..n`.
    pub fn gen_rnd_perm(&self, n: u32) -> Vec<u32> {
        let mut perm: Vec<u32> = (0..n).collect();
        for i in (1..n).rev() {
            let j = self.gen_rnd_uniform(i + 1);
            perm.swap(i as usize, j as usize);
        }
        perm
    }

    /// A private PRF for one call site, keyed with `seed`.
    pub fn init_prf_state(&self, seed: &[u8]) -> Result<PrfState, CryptoError> {
        PrfState::new(seed)
    }

    /// Agree on a PRF with the peer at the other end of `socket`.
    ///
    /// Both parties send a fresh seed and key the PRF with the XOR of both seeds. Both
    /// parties must use the same security level.
    pub fn gen_common_seed(&self, socket: &mut Socket) -> Result<PrfState, CryptoError> {
        let mut seed = self.gen_rnd_vec(self.aes_key_bytes());
        socket.send(&seed)?;
        let mut peer_seed = vec![0; seed.len()];
        socket.receive(&mut peer_seed)?;
        xor_inplace(&mut seed, &peer_seed);
        PrfState::new(&seed)
    }

    /// Key the cipher used by [`Crypto::encrypt`] and [`Crypto::decrypt`].
    pub fn seed_aes_enc(&mut self, seed: &[u8], mode: BlockMode) -> Result<(), CryptoError> {
        let expected = self.aes_key_bytes();
        if seed.len() != expected {
            return Err(CryptoError::SeedLength {
                expected,
                actual: seed.len(),
            });
        }
        self.enc = Some((SymmetricCipher::new(seed)?, mode));
        Ok(())
    }

    /// Encrypt `data`, whose length must be a multiple of 16.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = data.to_vec();
        self.encrypt_in_place(&mut out)?;
        Ok(out)
    }

    /// Decrypt `data`, whose length must be a multiple of 16.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = data.to_vec();
        self.decrypt_in_place(&mut out)?;
        Ok(out)
    }

    /// Encrypt `data` in place.
    pub fn encrypt_in_place(&self, data: &mut [u8]) -> Result<(), CryptoError> {
        let (cipher, mode) = self.enc.as_ref().ok_or(CryptoError::MissingEncryptionKey)?;
        cipher.encrypt(*mode, data)
    }

    /// Decrypt `data` in place.
    pub fn decrypt_in_place(&self, data: &mut [u8]) -> Result<(), CryptoError> {
        let (cipher, mode) = self.enc.as_ref().ok_or(CryptoError::MissingEncryptionKey)?;
        cipher.decrypt(*mode, data)
    }

    /// Hash `input` and write the first `out.len()` bytes of the digest to `out`.
    ///
    /// # Panics
    /// If `out` is longer than [`Crypto::hash_bytes`].
    pub fn hash(&self, out: &mut [u8], input: &[u8]) {
        let mut scratch = vec![0; self.hash_bytes()];
        self.hash_buf(out, input, &mut scratch);
    }

    /// Like [`Crypto::hash`], but uses the caller's `scratch` of [`Crypto::hash_bytes`]
    /// bytes for the full digest.
    ///
    /// # Panics
    /// If `scratch.len() != self.hash_bytes()` or `out` is longer than the digest.
    pub fn hash_buf(&self, out: &mut [u8], input: &[u8], scratch: &mut [u8]) {
        self.digest_truncated(out, &[input], scratch);
    }

    /// Like [`Crypto::hash`], but reuses a scratch buffer owned by `self`.
    pub fn hash_non_threadsafe(&mut self, out: &mut [u8], input: &[u8]) {
        let mut scratch = std::mem::take(&mut self.hash_scratch);
        self.hash_buf(out, input, &mut scratch);
        self.hash_scratch = scratch;
    }

    /// Hash `ctr || input`, with `ctr` encoded as 8 little-endian bytes.
    pub fn hash_ctr(&self, out: &mut [u8], input: &[u8], ctr: u64) {
        let mut scratch = vec![0; self.hash_bytes()];
        self.digest_truncated(out, &[&ctr.to_le_bytes()[..], input], &mut scratch);
    }

    /// Fixed-key AES hash of `input`, zero-padded to whole 16 byte blocks.
    ///
    /// Every block `x` is mapped to `π(x) ^ x`, where `π` is AES-128 under a fixed public
    /// key. Only secure in the semi-honest setting.
    ///
    /// # Panics
    /// If `out` is longer than the padded input.
    pub fn fixed_key_aes_hash(&self, out: &mut [u8], input: &[u8]) {
        FIXED_KEY_HASH.hash_padded(out, input);
    }

    fn digest_truncated(&self, out: &mut [u8], parts: &[&[u8]], scratch: &mut [u8]) {
        assert!(
            out.len() <= self.hash_bytes(),
            "{:?} produces {} bytes, {} requested",
            self.hash_function,
            self.hash_bytes(),
            out.len()
        );
        self.hash_function.digest_into(parts, scratch);
        out.copy_from_slice(&scratch[..out.len()]);
    }

    /// Number of PRF blocks generated so far.
    pub fn prf_counter(&self) -> u64 {
        self.prf.lock().expect("poison").counter()
    }

    /// The security level.
    pub fn seclvl(&self) -> SecLevel {
        self.seclvl
    }

    /// Digest length of [`Crypto::hash_function`] in bytes.
    pub fn hash_bytes(&self) -> usize {
        self.hash_function.output_len()
    }

    /// Length of AES keys and seeds in bytes.
    pub fn aes_key_bytes(&self) -> usize {
        self.seclvl.aes_key_bytes()
    }

    /// The hash function used by [`Crypto::hash`].
    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_arguments() {
        assert!(matches!(
            Crypto::new(100, None),
            Err(CryptoError::UnsupportedSecurityLevel(100))
        ));
        assert!(matches!(
            Crypto::new(128, Some(&[0; 32][..])),
            Err(CryptoError::SeedLength {
                expected: 16,
                actual: 32
            })
        ));
        let crypto = Crypto::new(256, Some(&[0; 32][..])).unwrap();
        assert_eq!(32, crypto.aes_key_bytes());
        assert_eq!(64, crypto.hash_bytes());
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = Crypto::new(128, Some(&[5; 16][..])).unwrap();
        let b = Crypto::new(128, Some(&[5; 16][..])).unwrap();
        assert_eq!(a.gen_rnd_vec(100), b.gen_rnd_vec(100));
        assert_eq!(7, a.prf_counter());

        let mut from_seed = vec![0; 100];
        a.gen_rnd_from_seed(&mut from_seed, &[5; 16]).unwrap();
        let fresh = Crypto::new(128, Some(&[5; 16][..])).unwrap();
        assert_eq!(fresh.gen_rnd_vec(100), from_seed);
        assert_eq!(7, a.prf_counter());
    }

    #[test]
    fn test_gen_rnd_uniform_words() {
        // 128 + ceil_log2(7) = 131 bits -> 5 words -> 2 blocks
        let crypto = Crypto::new(128, Some(&[1; 16][..])).unwrap();
        for _ in 0..10 {
            assert!(crypto.gen_rnd_uniform(7) < 7);
        }
        assert_eq!(20, crypto.prf_counter());
        assert_eq!(0, crypto.gen_rnd_uniform(1));
    }

    #[test]
    #[should_panic(expected = "modulus must be non-zero")]
    fn test_gen_rnd_uniform_zero() {
        Crypto::new(80, None).unwrap().gen_rnd_uniform(0);
    }

    #[test]
    fn test_gen_rnd_perm() {
        let crypto = Crypto::new(128, None).unwrap();
        let mut perm = crypto.gen_rnd_perm(50);
        perm.sort_unstable();
        assert_eq!((0..50).collect::<Vec<_>>(), perm);
        assert!(crypto.gen_rnd_perm(0).is_empty());
    }

    #[test]
    fn test_encrypt_decrypt() {
        let mut crypto = Crypto::new(192, None).unwrap();
        assert!(matches!(
            crypto.encrypt(&[0; 16]),
            Err(CryptoError::MissingEncryptionKey)
        ));
        for mode in [BlockMode::Ecb, BlockMode::Cbc] {
            crypto.seed_aes_enc(&[3; 32], mode).unwrap();
            let plain: Vec<u8> = (0..64).collect();
            let cipher = crypto.encrypt(&plain).unwrap();
            assert_ne!(plain, cipher);
            assert_eq!(plain, crypto.decrypt(&cipher).unwrap());
        }
        assert!(matches!(
            crypto.encrypt(&[0; 33]),
            Err(CryptoError::UnalignedLength { len: 33, block: 16 })
        ));
    }

    #[test]
    fn test_hash_variants_agree() {
        let mut crypto = Crypto::new(128, None).unwrap();
        let mut a = [0; 16];
        let mut b = [0; 16];
        let mut c = [0; 16];
        let mut scratch = vec![0; crypto.hash_bytes()];
        crypto.hash(&mut a, b"input");
        crypto.hash_buf(&mut b, b"input", &mut scratch);
        crypto.hash_non_threadsafe(&mut c, b"input");
        assert_eq!(a, b);
        assert_eq!(a, c);

        let mut with_ctr = [0; 16];
        crypto.hash_ctr(&mut with_ctr, b"input", 0);
        assert_ne!(a, with_ctr);
        let mut prefixed = [0; 16];
        crypto.hash(&mut prefixed, b"\0\0\0\0\0\0\0\0input");
        assert_eq!(prefixed, with_ctr);
    }

    #[test]
    fn test_hash_ctr_prefixes_eight_bytes() {
        let crypto = Crypto::new(128, None).unwrap();
        let mut with_ctr = [0; 32];
        crypto.hash_ctr(&mut with_ctr, b"input", 1);
        let mut prefixed = [0; 32];
        crypto.hash(&mut prefixed, &[&1_u64.to_le_bytes()[..], &b"input"[..]].concat());
        assert_eq!(prefixed, with_ctr);
        let mut short_prefix = [0; 32];
        crypto.hash(&mut short_prefix, &[&1_u32.to_le_bytes()[..], &b"input"[..]].concat());
        assert_ne!(short_prefix, with_ctr);
    }

    #[test]
    #[should_panic(expected = "requested")]
    fn test_hash_too_long() {
        let crypto = Crypto::new(80, None).unwrap();
        crypto.hash(&mut [0; 21], b"input");
    }

    #[test]
    fn test_fixed_key_aes_hash_is_keyless() {
        let a = Crypto::new(128, None).unwrap();
        let b = Crypto::new(256, None).unwrap();
        let mut out_a = [0; 24];
        let mut out_b = [0; 24];
        a.fixed_key_aes_hash(&mut out_a, &[7; 30]);
        b.fixed_key_aes_hash(&mut out_b, &[7; 30]);
        assert_eq!(out_a, out_b);
    }
}
