use serde::{Deserialize, Serialize};

use super::CryptoError;

/// Bit strengths of the primitives used at one security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecLevel {
    /// Statistical security parameter.
    pub statbits: u32,
    /// Symmetric security parameter.
    pub symbits: u32,
    /// Modulus size for integer factorization cryptography.
    pub ifcbits: u32,
    /// Field size for prime field elliptic curves.
    pub eccpfbits: u32,
    /// Field size for Koblitz curves.
    pub ecckcbits: u32,
}

impl SecLevel {
    /// Short-term security.
    pub const ST: Self = Self::new(40, 80, 1024, 160, 163);
    /// Medium-term security.
    pub const MT: Self = Self::new(40, 112, 2048, 192, 233);
    /// Long-term security.
    pub const LT: Self = Self::new(40, 128, 3072, 256, 283);
    /// Extra long-term security.
    pub const XLT: Self = Self::new(40, 192, 7680, 384, 409);
    /// Extra extra long-term security.
    pub const XXLT: Self = Self::new(40, 256, 15360, 512, 571);

    const fn new(statbits: u32, symbits: u32, ifcbits: u32, eccpfbits: u32, ecckcbits: u32) -> Self {
        Self {
            statbits,
            symbits,
            ifcbits,
            eccpfbits,
            ecckcbits,
        }
    }

    /// The predefined level with the given symmetric security.
    pub fn from_symbits(symbits: u32) -> Result<Self, CryptoError> {
        match symbits {
            80 => Ok(Self::ST),
            112 => Ok(Self::MT),
            128 => Ok(Self::LT),
            192 => Ok(Self::XLT),
            256 => Ok(Self::XXLT),
            _ => Err(CryptoError::UnsupportedSecurityLevel(symbits)),
        }
    }

    /// Length of the AES key in bytes. AES-128 up to 128 bit security, AES-256 above.
    pub fn aes_key_bytes(&self) -> usize {
        if self.symbits <= 128 { 16 } else { 32 }
    }
}
