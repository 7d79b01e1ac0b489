//! Manages long-term identity keys and the signed identity blocks exchanged
//! inside Reveal-Signature and Signature messages.
//!
//! A signed identity carries the signer's public identity key, the key id of
//! its ephemeral DH key and a signature over the transcript authenticator.
//! On the wire it travels encrypted and MAC'd under keys derived from the
//! DH shared secret.
//!
//! 管理长期身份密钥，以及在 Reveal-Signature 和 Signature 消息中交换的签名身份块。
//!
//! 签名身份块包含签名者的身份公钥、其临时 DH 密钥的 ID，以及对握手记录认证值的签名。
//! 在线路上，它使用从 DH 共享密钥派生的密钥进行加密并附带 MAC。

use super::{AES_CTR_IV, aes128_ctr};
use crate::error::{HandshakeError, Result};
use crate::protocol::framing::{append_data, append_u32, expect_end, extract_data, extract_u32};
use crate::protocol::transcript::{authenticator, truncated_mac};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand_core::CryptoRngCore;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

pub const IDENTITY_KEY_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;
pub const MAC_LENGTH: usize = 20;

/// A long-term identity keypair.
///
/// 长期身份密钥对。
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    pub fn generate(rng: &mut dyn CryptoRngCore) -> Result<Self> {
        let mut seed = [0u8; IDENTITY_KEY_LENGTH];
        rng.try_fill_bytes(&mut seed)?;
        let pair = Self::from_seed(&seed);
        seed.zeroize();
        Ok(pair)
    }

    pub fn from_seed(seed: &[u8; IDENTITY_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// The public half of an identity key, as exchanged during the AKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityPublicKey([u8; IDENTITY_KEY_LENGTH]);

impl IdentityPublicKey {
    pub fn from_bytes(bytes: [u8; IDENTITY_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_KEY_LENGTH] {
        &self.0
    }

    fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> Result<()> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| HandshakeError::InvalidSignature)?;
        let signature = Signature::from_bytes(signature);
        key.verify_strict(message, &signature)
            .map_err(|_| HandshakeError::InvalidSignature)
    }
}

/// Keys protecting one direction's signed identity block.
pub struct SealingKeys<'a> {
    /// AES key (`c` or `c'`).
    pub encryption: &'a [u8; 16],
    /// Key for the transcript authenticator (`m1` or `m1'`).
    pub authenticator: &'a [u8; 32],
    /// Key for the MAC over the ciphertext (`m2` or `m2'`).
    pub mac: &'a [u8; 32],
}

/// A decrypted and verified identity block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub public_key: IdentityPublicKey,
    pub key_id: u32,
}

/// An encrypted identity block together with its truncated MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedIdentity {
    pub encrypted: Vec<u8>,
    pub mac: [u8; MAC_LENGTH],
}

/// Signs the transcript and seals the resulting identity block.
///
/// `own_dh` is the signer's ephemeral public value, `peer_dh` the peer's.
///
/// 对握手记录签名并封装得到的身份块。
///
/// `own_dh` 是签名者的临时公钥，`peer_dh` 是对方的临时公钥。
pub fn seal_identity(
    identity: &IdentityKeyPair,
    key_id: u32,
    own_dh: &[u8],
    peer_dh: &[u8],
    keys: &SealingKeys<'_>,
) -> SealedIdentity {
    let public_key = identity.public_key();
    let mut m = authenticator(keys.authenticator, own_dh, peer_dh, public_key.as_bytes(), key_id);
    let signature = identity.sign(&m);
    m.zeroize();

    let mut x = Vec::with_capacity(4 + IDENTITY_KEY_LENGTH + 4 + 4 + SIGNATURE_LENGTH);
    append_data(&mut x, public_key.as_bytes());
    append_u32(&mut x, key_id);
    append_data(&mut x, &signature);

    let encrypted = aes128_ctr(keys.encryption, &AES_CTR_IV, &x);
    x.zeroize();
    let mac = truncated_mac(keys.mac, &encrypted);
    SealedIdentity { encrypted, mac }
}

/// Checks the MAC, decrypts the identity block and verifies its signature.
///
/// `own_dh` is the *signer's* ephemeral public value (the peer's, from the
/// verifier's point of view). Any failure after the block has been parsed
/// is `InvalidSignature`.
///
/// 校验 MAC，解密身份块并验证其签名。
///
/// `own_dh` 是*签名者*的临时公钥（从验证者角度看即对方的公钥）。
pub fn open_identity(
    sealed: &SealedIdentity,
    own_dh: &[u8],
    peer_dh: &[u8],
    keys: &SealingKeys<'_>,
) -> Result<VerifiedIdentity> {
    let expected_mac = truncated_mac(keys.mac, &sealed.encrypted);
    if !bool::from(expected_mac.as_slice().ct_eq(sealed.mac.as_slice())) {
        return Err(HandshakeError::InvalidSignature);
    }

    let mut x = aes128_ctr(keys.encryption, &AES_CTR_IV, &sealed.encrypted);
    let parsed = parse_identity_block(&x);
    x.zeroize();
    let (public_key, key_id, signature) = parsed?;

    let m = authenticator(keys.authenticator, own_dh, peer_dh, public_key.as_bytes(), key_id);
    public_key.verify(&m, &signature)?;

    Ok(VerifiedIdentity { public_key, key_id })
}

fn parse_identity_block(x: &[u8]) -> Result<(IdentityPublicKey, u32, [u8; SIGNATURE_LENGTH])> {
    let (offset, public_key) = extract_data(x, 0)?;
    let (offset, key_id) = extract_u32(x, offset)?;
    let (offset, signature) = extract_data(x, offset)?;
    expect_end(x, offset)?;

    let public_key: [u8; IDENTITY_KEY_LENGTH] = public_key
        .try_into()
        .map_err(|_| HandshakeError::MalformedMessage)?;
    let signature: [u8; SIGNATURE_LENGTH] = signature
        .try_into()
        .map_err(|_| HandshakeError::MalformedMessage)?;
    if key_id == 0 {
        return Err(HandshakeError::MalformedMessage);
    }

    Ok((IdentityPublicKey(public_key), key_id, signature))
}
