//! The commit-then-reveal step that opens every key exchange.
//!
//! The initiator sends its DH public value encrypted under a random key `r`
//! together with the hash of the plaintext, and only reveals `r` after it
//! has seen the responder's public value. The hash also drives the tie-break
//! when both peers commit at once.

use super::{AES_CTR_IV, aes128_ctr};
use crate::crypto::keys::{AES_KEY_LENGTH, DH_KEY_LENGTH, public_value_from_slice};
use crate::error::{HandshakeError, Result};
use crate::protocol::framing::{append_data, expect_end, extract_data};
use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The symmetric key `r` protecting a committed public value.
///
/// 保护已承诺公钥的对称密钥 `r`。
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CommitmentKey([u8; AES_KEY_LENGTH]);

impl CommitmentKey {
    pub fn generate(rng: &mut dyn CryptoRngCore) -> Result<Self> {
        let mut key = [0u8; AES_KEY_LENGTH];
        rng.try_fill_bytes(&mut key)?;
        Ok(Self(key))
    }

    pub fn from_bytes(bytes: [u8; AES_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

impl PartialEq for CommitmentKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for CommitmentKey {}

impl fmt::Debug for CommitmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommitmentKey(..)")
    }
}

/// A commitment as carried by a DH-Commit message.
///
/// The hash is kept exactly as received; only our own commitments are
/// guaranteed to hold a 32-byte SHA-256 digest.
///
/// DH-Commit 消息中携带的承诺。
///
/// 哈希值按收到的原样保存；只有我们自己生成的承诺才保证是 32 字节的 SHA-256 摘要。
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
pub struct Commitment {
    pub encrypted_public_value: Vec<u8>,
    pub hashed_public_value: Vec<u8>,
}

impl Commitment {
    /// Commits to `public_value` under `key`.
    pub fn seal(key: &CommitmentKey, public_value: &[u8; DH_KEY_LENGTH]) -> Self {
        let mut encoded = Vec::with_capacity(4 + DH_KEY_LENGTH);
        append_data(&mut encoded, public_value);

        let commitment = Self {
            encrypted_public_value: aes128_ctr(key.as_bytes(), &AES_CTR_IV, &encoded),
            hashed_public_value: hash_encoded(&encoded).to_vec(),
        };
        encoded.zeroize();
        commitment
    }

    /// Opens the commitment with the revealed key.
    ///
    /// A hash mismatch, or a plaintext that is not a single encoded value,
    /// means the peer revealed something other than what it committed to.
    ///
    /// 使用揭示的密钥打开承诺。
    ///
    /// 哈希不匹配，或明文不是单个编码值，说明对方揭示的内容与其承诺不符。
    pub fn open(&self, key: &CommitmentKey) -> Result<[u8; DH_KEY_LENGTH]> {
        let encoded = aes128_ctr(key.as_bytes(), &AES_CTR_IV, &self.encrypted_public_value);
        let digest = hash_encoded(&encoded);
        if !bool::from(digest.as_slice().ct_eq(&self.hashed_public_value)) {
            return Err(HandshakeError::InvalidCommitment);
        }

        let (offset, public_value) =
            extract_data(&encoded, 0).map_err(|_| HandshakeError::InvalidCommitment)?;
        expect_end(&encoded, offset).map_err(|_| HandshakeError::InvalidCommitment)?;
        public_value_from_slice(public_value)
    }
}

/// `SHA-256(DATA(public_value))`, the value both peers compare on a
/// simultaneous commit.
pub fn hash_public_value(public_value: &[u8]) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(4 + public_value.len());
    append_data(&mut encoded, public_value);
    hash_encoded(&encoded)
}

fn hash_encoded(encoded: &[u8]) -> [u8; 32] {
    Sha256::digest(encoded).into()
}
