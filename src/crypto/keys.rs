//! Ephemeral Diffie-Hellman key material and the AKE key schedule.
//!
//! The key exchange runs over X25519. Everything secret here zeroizes on
//! drop, compares in constant time and never shows up in `Debug` output.
//!
//! 临时 Diffie-Hellman 密钥材料与 AKE 密钥派生。
//!
//! 密钥交换基于 X25519。这里所有秘密值在释放时清零，以常量时间比较，
//! 并且不会出现在 `Debug` 输出中。

use crate::error::{HandshakeError, Result};
use crate::protocol::framing::append_data;
use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::{Choice, ConstantTimeEq};
use x25519_dalek::{X25519_BASEPOINT_BYTES, x25519};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of an encoded DH public value or secret exponent.
pub const DH_KEY_LENGTH: usize = 32;

/// Length of the session identifier both peers derive.
pub const SSID_LENGTH: usize = 8;

/// Length of the AES-128 keys used inside the AKE.
pub const AES_KEY_LENGTH: usize = 16;

/// Length of the HMAC-SHA256 keys used inside the AKE.
pub const MAC_KEY_LENGTH: usize = 32;

/// An ephemeral DH keypair.
///
/// 临时 DH 密钥对。
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DhKeyPair {
    secret: [u8; DH_KEY_LENGTH],
    public: [u8; DH_KEY_LENGTH],
}

impl DhKeyPair {
    /// Draws a fresh secret exponent from `rng`.
    ///
    /// Entropy failure is reported as `RandomnessFailure`.
    pub fn generate(rng: &mut dyn CryptoRngCore) -> Result<Self> {
        let mut secret = [0u8; DH_KEY_LENGTH];
        rng.try_fill_bytes(&mut secret)?;
        let pair = Self::from_secret(secret);
        secret.zeroize();
        Ok(pair)
    }

    pub fn from_secret(secret: [u8; DH_KEY_LENGTH]) -> Self {
        let public = x25519(secret, X25519_BASEPOINT_BYTES);
        Self { secret, public }
    }

    pub fn public(&self) -> &[u8; DH_KEY_LENGTH] {
        &self.public
    }

    /// Computes the shared secret with the peer's public value.
    ///
    /// Rejects encodings of the wrong length and public values that do not
    /// contribute to the result (small-order points yield all zeroes).
    ///
    /// 与对方公钥计算共享密钥。
    ///
    /// 拒绝长度错误的编码以及对结果没有贡献的公钥（小阶点会得到全零）。
    pub fn shared_secret(&self, their_public: &[u8]) -> Result<SharedSecret> {
        let their_public = public_value_from_slice(their_public)?;
        let shared = SharedSecret(x25519(self.secret, their_public));
        if bool::from(shared.0.as_slice().ct_eq(&[0u8; DH_KEY_LENGTH][..])) {
            return Err(HandshakeError::InvalidPublicValue);
        }
        Ok(shared)
    }
}

impl ConstantTimeEq for DhKeyPair {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.secret.as_slice().ct_eq(other.secret.as_slice())
            & self.public.as_slice().ct_eq(other.public.as_slice())
    }
}

impl PartialEq for DhKeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for DhKeyPair {}

impl fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Checks that `bytes` has the length of a DH public value.
pub fn public_value_from_slice(bytes: &[u8]) -> Result<[u8; DH_KEY_LENGTH]> {
    bytes
        .try_into()
        .map_err(|_| HandshakeError::InvalidPublicValue)
}

/// The raw output of a DH computation.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; DH_KEY_LENGTH]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; DH_KEY_LENGTH] {
        &self.0
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Keys derived from the AKE shared secret.
///
/// `c`/`m1`/`m2` protect the initiator's signed identity (Reveal-Signature),
/// the primed variants protect the responder's (Signature).
///
/// 从 AKE 共享密钥派生出的密钥。
///
/// `c`/`m1`/`m2` 保护发起方的签名身份（Reveal-Signature），
/// 带撇号的变体保护响应方的签名身份（Signature）。
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AkeKeys {
    pub ssid: [u8; SSID_LENGTH],
    pub c: [u8; AES_KEY_LENGTH],
    pub c_prime: [u8; AES_KEY_LENGTH],
    pub m1: [u8; MAC_KEY_LENGTH],
    pub m2: [u8; MAC_KEY_LENGTH],
    pub m1_prime: [u8; MAC_KEY_LENGTH],
    pub m2_prime: [u8; MAC_KEY_LENGTH],
}

impl AkeKeys {
    /// Runs the key schedule: `h2(b) = SHA-256(b || DATA(s))`.
    pub fn derive(shared: &SharedSecret) -> Self {
        let mut secbytes = Vec::with_capacity(4 + DH_KEY_LENGTH);
        append_data(&mut secbytes, shared.as_bytes());

        let h2 = |b: u8| -> [u8; 32] {
            Sha256::new()
                .chain_update([b])
                .chain_update(&secbytes)
                .finalize()
                .into()
        };

        let mut ssid = [0u8; SSID_LENGTH];
        let mut c = [0u8; AES_KEY_LENGTH];
        let mut c_prime = [0u8; AES_KEY_LENGTH];
        let mut encryption = h2(0x01);
        let mut ssid_block = h2(0x00);
        ssid.copy_from_slice(&ssid_block[..SSID_LENGTH]);
        c.copy_from_slice(&encryption[..AES_KEY_LENGTH]);
        c_prime.copy_from_slice(&encryption[AES_KEY_LENGTH..]);
        encryption.zeroize();
        ssid_block.zeroize();

        let keys = Self {
            ssid,
            c,
            c_prime,
            m1: h2(0x02),
            m2: h2(0x03),
            m1_prime: h2(0x04),
            m2_prime: h2(0x05),
        };
        secbytes.zeroize();
        keys
    }
}

impl ConstantTimeEq for AkeKeys {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.ssid.as_slice().ct_eq(other.ssid.as_slice())
            & self.c.as_slice().ct_eq(other.c.as_slice())
            & self.c_prime.as_slice().ct_eq(other.c_prime.as_slice())
            & self.m1.as_slice().ct_eq(other.m1.as_slice())
            & self.m2.as_slice().ct_eq(other.m2.as_slice())
            & self.m1_prime.as_slice().ct_eq(other.m1_prime.as_slice())
            & self.m2_prime.as_slice().ct_eq(other.m2_prime.as_slice())
    }
}

impl PartialEq for AkeKeys {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for AkeKeys {}

impl fmt::Debug for AkeKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AkeKeys(..)")
    }
}
