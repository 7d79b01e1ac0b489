//! The key management context of an encrypted session.
//!
//! The key exchange writes the negotiated DH values in here; the data layer
//! reads them afterwards. Old MAC keys that still have to be revealed to the
//! peer survive a fresh key exchange, everything else does not.
//!
//! 加密会话的密钥管理上下文。
//!
//! 密钥交换将协商出的 DH 值写入这里，数据层随后读取。
//! 仍需向对方公开的旧 MAC 密钥在新的密钥交换后保留，其余内容全部清除。

use crate::crypto::keys::{DH_KEY_LENGTH, DhKeyPair, SharedSecret};
use crate::protocol::message::OutgoingMessage;
use zeroize::Zeroize;

/// A data-layer MAC key waiting to be revealed to the peer.
pub type MacKey = [u8; 20];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyManagementContext {
    our_key_id: u32,
    their_key_id: u32,
    our_current: Option<DhKeyPair>,
    our_previous: Option<DhKeyPair>,
    their_current: Option<[u8; DH_KEY_LENGTH]>,
    their_previous: Option<[u8; DH_KEY_LENGTH]>,
    our_counter: u64,
    reveal_keys: Vec<MacKey>,
    pending_retransmit: Option<OutgoingMessage>,
}

impl KeyManagementContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn our_key_id(&self) -> u32 {
        self.our_key_id
    }

    pub fn their_key_id(&self) -> u32 {
        self.their_key_id
    }

    pub fn our_current_keypair(&self) -> Option<&DhKeyPair> {
        self.our_current.as_ref()
    }

    pub fn our_previous_keypair(&self) -> Option<&DhKeyPair> {
        self.our_previous.as_ref()
    }

    pub fn their_current_public_value(&self) -> Option<&[u8; DH_KEY_LENGTH]> {
        self.their_current.as_ref()
    }

    pub fn their_previous_public_value(&self) -> Option<&[u8; DH_KEY_LENGTH]> {
        self.their_previous.as_ref()
    }

    pub fn counter(&self) -> u64 {
        self.our_counter
    }

    pub fn reveal_keys(&self) -> &[MacKey] {
        &self.reveal_keys
    }

    /// Records the peer's newest public value. A different value already on
    /// file becomes the previous one.
    pub fn set_their_current_public_value(&mut self, public_value: [u8; DH_KEY_LENGTH]) {
        if self.their_current.as_ref() == Some(&public_value) {
            return;
        }
        self.their_previous.zeroize();
        self.their_previous = self.their_current.replace(public_value);
    }

    pub fn set_their_key_id(&mut self, key_id: u32) {
        self.their_key_id = key_id;
    }

    /// Installs `keypair` as our current key under `key_id`.
    ///
    /// The replaced keypair, if any, is wiped.
    pub fn set_our_current_keypair(&mut self, key_id: u32, keypair: DhKeyPair) {
        self.our_current.zeroize();
        self.our_current = Some(keypair);
        self.our_key_id = key_id;
    }

    /// Starts a new rekey cycle: the current keypair becomes the previous
    /// one and `next` takes its place under the following key id.
    ///
    /// 开始新的换钥周期：当前密钥对变为上一个密钥对，`next` 以下一个密钥 ID 取而代之。
    pub fn rotate_our_keypair(&mut self, next: DhKeyPair) {
        self.our_previous.zeroize();
        self.our_previous = self.our_current.take();
        self.our_current = Some(next);
        self.our_key_id = self.our_key_id.wrapping_add(1);
    }

    pub fn increment_counter(&mut self) {
        self.our_counter = self.our_counter.wrapping_add(1);
    }

    pub fn retain_mac_key_for_reveal(&mut self, key: MacKey) {
        self.reveal_keys.push(key);
    }

    /// Computes the DH secret between our keypair `our_key_id` and the
    /// peer's current public value, if both are on file.
    pub fn shared_secret(&self, our_key_id: u32, their_key_id: u32) -> Option<SharedSecret> {
        if their_key_id != self.their_key_id {
            return None;
        }
        let their_public = self.their_current.as_ref()?;
        let ours = if our_key_id == self.our_key_id {
            self.our_current.as_ref()
        } else if our_key_id.wrapping_add(1) == self.our_key_id {
            self.our_previous.as_ref()
        } else {
            None
        }?;
        ours.shared_secret(their_public).ok()
    }

    /// Parks a message that may need to be sent again once the session is
    /// (re)established. A later call replaces an earlier one.
    pub fn queue_retransmit(&mut self, message: OutgoingMessage) {
        self.pending_retransmit = Some(message);
    }

    pub fn has_pending_retransmit(&self) -> bool {
        self.pending_retransmit.is_some()
    }

    pub(crate) fn take_retransmit(&mut self) -> Option<OutgoingMessage> {
        self.pending_retransmit.take()
    }

    /// Discards all key material, reveal keys and pending retransmission
    /// included.
    pub fn wipe(&mut self) {
        self.wipe_keep_reveal_keys();
        self.reveal_keys.zeroize();
        self.pending_retransmit = None;
    }

    /// Discards the session's key material but keeps the old MAC keys still
    /// owed to the peer, and any message parked for retransmission.
    ///
    /// 丢弃会话的密钥材料，但保留仍需向对方公开的旧 MAC 密钥以及等待重传的消息。
    pub fn wipe_keep_reveal_keys(&mut self) {
        self.our_current.zeroize();
        self.our_previous.zeroize();
        self.their_current.zeroize();
        self.their_previous.zeroize();
        self.our_key_id = 0;
        self.their_key_id = 0;
        self.our_counter = 0;
    }
}
