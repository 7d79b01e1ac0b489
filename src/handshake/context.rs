//! Per-attempt state of the key exchange.
//!
//! Holds the ephemeral secrets of one handshake attempt. These are the only
//! values whose compromise retroactively exposes past sessions, so every
//! path that drops or replaces them zeroizes them first.
//!
//! 单次握手尝试的状态。
//!
//! 保存一次握手尝试中的临时秘密。只有这些值泄露才会回溯地暴露过去的会话，
//! 因此所有丢弃或替换它们的路径都会先将其清零。

use crate::crypto::commitment::{Commitment, CommitmentKey};
use crate::crypto::keys::{AkeKeys, DH_KEY_LENGTH, DhKeyPair};
use zeroize::Zeroize;

/// The key id we advertise for the keypair negotiated by a key exchange.
pub const AKE_KEY_ID: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AkeContext {
    /// Our ephemeral keypair (`x` as initiator, `y` as responder).
    pub(crate) our_keypair: Option<DhKeyPair>,
    /// The key `r` of the commitment we sent as initiator.
    pub(crate) our_commitment_key: Option<CommitmentKey>,
    /// The commitment we sent as initiator.
    pub(crate) our_commitment: Option<Commitment>,
    /// The commitment we received as responder.
    pub(crate) their_commitment: Option<Commitment>,
    /// Set only once a DH-Key or Reveal-Signature has been validated.
    pub(crate) their_public_value: Option<[u8; DH_KEY_LENGTH]>,
    /// Keys derived from the shared secret, kept between the DH-Key and the
    /// Signature steps of the initiator.
    pub(crate) keys: Option<AkeKeys>,
    pub(crate) sender_instance_tag: u32,
    pub(crate) receiver_instance_tag: u32,
}

impl AkeContext {
    pub fn new(sender_instance_tag: u32) -> Self {
        Self {
            sender_instance_tag,
            ..Default::default()
        }
    }

    pub fn our_public_value(&self) -> Option<&[u8; DH_KEY_LENGTH]> {
        self.our_keypair.as_ref().map(DhKeyPair::public)
    }

    pub fn our_commitment(&self) -> Option<&Commitment> {
        self.our_commitment.as_ref()
    }

    pub fn their_commitment(&self) -> Option<&Commitment> {
        self.their_commitment.as_ref()
    }

    pub fn their_public_value(&self) -> Option<&[u8; DH_KEY_LENGTH]> {
        self.their_public_value.as_ref()
    }

    pub fn sender_instance_tag(&self) -> u32 {
        self.sender_instance_tag
    }

    pub fn receiver_instance_tag(&self) -> u32 {
        self.receiver_instance_tag
    }

    /// Overwrites and discards every ephemeral value of this attempt.
    ///
    /// Instance tags are not secret and survive.
    ///
    /// 覆盖并丢弃本次尝试的所有临时值。实例标签不属于秘密，会被保留。
    pub fn wipe(&mut self) {
        self.our_keypair.zeroize();
        self.our_commitment_key.zeroize();
        self.our_commitment.zeroize();
        self.wipe_their_public_value_only();
    }

    /// Forgets the peer's contribution while keeping our own keypair, so a
    /// DH-Key we already sent stays valid and can be sent again unchanged.
    ///
    /// 忘记对方的贡献，同时保留我们自己的密钥对，
    /// 使已发送的 DH-Key 保持有效并可原样重发。
    pub fn wipe_their_public_value_only(&mut self) {
        self.their_commitment.zeroize();
        self.their_public_value.zeroize();
        self.keys.zeroize();
    }
}
