//! Drives the key exchange for one conversation with one peer.
//!
//! A `Conversation` owns everything the state machine needs: the current
//! authentication state, the per-attempt AKE context, the session key
//! store, our identity and the entropy source. Inbound messages are parsed
//! before they reach the state machine, so malformed input is rejected the
//! same way in every state.
//!
//! 驱动与某个对端的一次会话中的密钥交换。
//!
//! `Conversation` 持有状态机所需的一切：当前认证状态、单次尝试的 AKE 上下文、
//! 会话密钥存储、我们的身份以及熵源。入站消息在到达状态机之前就会被解析，
//! 因此任何状态下格式错误的输入都会以相同方式被拒绝。

use crate::config::ConversationConfig;
use crate::crypto::commitment::{Commitment, CommitmentKey};
use crate::crypto::keys::{DhKeyPair, SSID_LENGTH};
use crate::crypto::signature::{IdentityKeyPair, IdentityPublicKey};
use crate::error::{HandshakeError, Result};
use crate::event::{SecurityEvent, SecurityEventHandler};
use crate::handshake::{AkeContext, Transition};
use crate::keys::KeyManagementContext;
use crate::protocol::framing::{
    self, Header, MessageType, UNKNOWN_INSTANCE_TAG, is_valid_instance_tag,
};
use crate::protocol::message::{AkeMessage, DhCommit, DhKey, OutgoingMessage};
use crate::protocol::state::{AuthState, MessageState};
use rand_core::CryptoRngCore;
use std::fmt;
use tracing::{debug, info, warn};

mod builder;

pub use builder::ConversationBuilder;

pub struct Conversation {
    pub(crate) config: ConversationConfig,
    pub(crate) identity: IdentityKeyPair,
    pub(crate) rng: Box<dyn CryptoRngCore + Send>,
    pub(crate) events: Box<dyn SecurityEventHandler>,
    pub(crate) our_instance_tag: u32,
    pub(crate) auth_state: AuthState,
    /// Created lazily on the first key exchange message.
    pub(crate) ake: Option<AkeContext>,
    pub(crate) keys: KeyManagementContext,
    pub(crate) msg_state: MessageState,
    pub(crate) ssid: Option<[u8; SSID_LENGTH]>,
    pub(crate) their_identity: Option<IdentityPublicKey>,
}

impl Conversation {
    pub fn builder() -> ConversationBuilder {
        ConversationBuilder::new()
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.auth_state
    }

    pub fn ake_context(&self) -> Option<&AkeContext> {
        self.ake.as_ref()
    }

    pub fn keys(&self) -> &KeyManagementContext {
        &self.keys
    }

    pub fn message_state(&self) -> MessageState {
        self.msg_state
    }

    /// The session id of the last completed key exchange.
    ///
    /// 最近一次完成的密钥交换的会话 ID。
    pub fn ssid(&self) -> Option<&[u8; SSID_LENGTH]> {
        self.ssid.as_ref()
    }

    /// The identity key the peer authenticated with in the last completed
    /// key exchange.
    pub fn their_identity(&self) -> Option<&IdentityPublicKey> {
        self.their_identity.as_ref()
    }

    pub fn our_identity(&self) -> IdentityPublicKey {
        self.identity.public_key()
    }

    pub fn our_instance_tag(&self) -> u32 {
        self.our_instance_tag
    }

    /// The peer's instance tag, or `UNKNOWN_INSTANCE_TAG` until one of its
    /// messages has been accepted.
    pub fn their_instance_tag(&self) -> u32 {
        self.ake
            .as_ref()
            .map_or(UNKNOWN_INSTANCE_TAG, AkeContext::receiver_instance_tag)
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Starts a key exchange as initiator and returns the DH-Commit to send.
    ///
    /// Any exchange already in flight is abandoned. Calling this on an
    /// encrypted conversation refreshes its keys.
    ///
    /// 作为发起方开始密钥交换，并返回需要发送的 DH-Commit。
    ///
    /// 任何正在进行的交换都会被放弃。在已加密的会话上调用会刷新其密钥。
    pub fn start_ake(&mut self) -> Result<OutgoingMessage> {
        let keypair = DhKeyPair::generate(self.rng())?;
        let commitment_key = CommitmentKey::generate(self.rng())?;
        let commitment = Commitment::seal(&commitment_key, keypair.public());

        let ake = self.ake_mut();
        ake.wipe();
        ake.our_keypair = Some(keypair);
        ake.our_commitment_key = Some(commitment_key);
        ake.our_commitment = Some(commitment);

        let dh_commit = self.dh_commit_message().ok_or(HandshakeError::InvalidState)?;
        debug!(from = %self.auth_state, "starting key exchange");
        self.auth_state = AuthState::AwaitingTheirPublicValue;
        Ok(dh_commit)
    }

    /// Processes one framed message received from the transport.
    ///
    /// The header's version and instance tags are checked before the body
    /// is looked at. Returns the messages to send in reply, in order.
    ///
    /// 处理从传输层收到的一条封装消息。
    ///
    /// 在查看消息体之前先检查头部的版本和实例标签。按顺序返回需要发送的回复消息。
    pub fn receive_message(&mut self, framed: &[u8]) -> Result<Vec<OutgoingMessage>> {
        let (header, body) = framing::unwrap(framed)?;
        if let Err(error) = self.check_instance_tags(&header) {
            warn!(
                sender = header.sender_instance_tag,
                receiver = header.receiver_instance_tag,
                "dropping message for another instance"
            );
            return Err(error);
        }
        let message = AkeMessage::parse(header.message_type, body)?;
        self.dispatch(message, Some(header.sender_instance_tag))
    }

    /// Processes an already unframed key exchange message.
    ///
    /// `message_type` is the raw type byte; anything but the four key
    /// exchange types is `UnknownMessageType`.
    pub fn process_inbound(&mut self, message_type: u8, payload: &[u8]) -> Result<Vec<OutgoingMessage>> {
        let message_type = MessageType::try_from(message_type)?;
        let message = AkeMessage::parse(message_type, payload)?;
        self.dispatch(message, None)
    }

    /// Parks a message to be sent again once a key exchange completes.
    ///
    /// 暂存一条消息，在密钥交换完成后重新发送。
    pub fn queue_retransmit(&mut self, message: OutgoingMessage) {
        self.keys.queue_retransmit(message);
    }

    /// Ends the session: every key is wiped and the conversation is
    /// finished until a new key exchange is started.
    ///
    /// 结束会话：清除所有密钥，会话进入结束状态，直到开始新的密钥交换。
    pub fn end(&mut self) {
        if let Some(ake) = self.ake.as_mut() {
            ake.wipe();
        }
        self.keys.wipe();
        self.auth_state = AuthState::Idle;
        self.msg_state = MessageState::Finished;
        self.ssid = None;
        self.their_identity = None;
        info!("conversation ended");
    }

    fn check_instance_tags(&self, header: &Header) -> Result<()> {
        if !is_valid_instance_tag(header.sender_instance_tag) {
            return Err(HandshakeError::InstanceTagMismatch);
        }
        let addressed_to_us = header.receiver_instance_tag == self.our_instance_tag
            || (header.receiver_instance_tag == UNKNOWN_INSTANCE_TAG
                && header.message_type == MessageType::DhCommit);
        if !addressed_to_us {
            return Err(HandshakeError::InstanceTagMismatch);
        }
        // Only a DH-Commit may come from a new peer instance.
        let known = self.their_instance_tag();
        if header.message_type != MessageType::DhCommit
            && known != UNKNOWN_INSTANCE_TAG
            && known != header.sender_instance_tag
        {
            return Err(HandshakeError::InstanceTagMismatch);
        }
        Ok(())
    }

    fn dispatch(&mut self, message: AkeMessage, sender_instance_tag: Option<u32>) -> Result<Vec<OutgoingMessage>> {
        let message_type = message.message_type();
        // Handlers may assume the context exists.
        self.ake_mut();

        let state = std::mem::take(&mut self.auth_state);
        debug!(state = %state, message = %message_type, "processing key exchange message");
        let Transition {
            state,
            outgoing,
            result,
            completed,
        } = match &message {
            AkeMessage::DhCommit(m) => state.receive_dh_commit(self, m, sender_instance_tag),
            AkeMessage::DhKey(m) => state.receive_dh_key(self, m, sender_instance_tag),
            AkeMessage::RevealSignature(m) => state.receive_reveal_signature(self, m),
            AkeMessage::Signature(m) => state.receive_signature(self, m),
        };
        self.auth_state = state;

        if let Err(error) = result {
            warn!(state = %self.auth_state, message = %message_type, %error, "key exchange step failed");
            return Err(error);
        }

        let mut replies: Vec<OutgoingMessage> = outgoing.into_iter().collect();
        // Only a Reveal-Signature or Signature that finished the exchange
        // releases a queued message; no-op cells leave the queue alone.
        if completed {
            replies.extend(self.maybe_retransmit());
        }
        Ok(replies)
    }

    fn maybe_retransmit(&mut self) -> Option<OutgoingMessage> {
        if !self.config.retransmit_after_ake || self.msg_state != MessageState::Encrypted {
            return None;
        }
        let message = self.keys.take_retransmit()?;
        debug!(message = %message.message_type, "retransmitting queued message");
        Some(message)
    }

    pub(crate) fn rng(&mut self) -> &mut dyn CryptoRngCore {
        &mut *self.rng
    }

    pub(crate) fn ake(&self) -> Option<&AkeContext> {
        self.ake.as_ref()
    }

    pub(crate) fn ake_mut(&mut self) -> &mut AkeContext {
        let sender_instance_tag = self.our_instance_tag;
        self.ake
            .get_or_insert_with(|| AkeContext::new(sender_instance_tag))
    }

    /// Frames `body` with our tag and the peer's tag as currently known.
    pub(crate) fn wrap(&self, message_type: MessageType, body: &[u8]) -> OutgoingMessage {
        let receiver_instance_tag = self.their_instance_tag();
        let bytes = framing::wrap(message_type, self.our_instance_tag, receiver_instance_tag, body);
        OutgoingMessage::new(message_type, bytes)
    }

    /// Our DH-Commit, rebuilt from the stored commitment. Repeated calls give
    /// identical bytes while the commitment and the peer's tag are unchanged.
    pub(crate) fn dh_commit_message(&self) -> Option<OutgoingMessage> {
        let commitment = self.ake()?.our_commitment()?.clone();
        let body = AkeMessage::DhCommit(DhCommit { commitment }).encode();
        Some(self.wrap(MessageType::DhCommit, &body))
    }

    pub(crate) fn dh_key_message(&self) -> Option<OutgoingMessage> {
        let public_value = self.ake()?.our_public_value()?.to_vec();
        let body = AkeMessage::DhKey(DhKey { public_value }).encode();
        Some(self.wrap(MessageType::DhKey, &body))
    }

    /// Applies the effects shared by both sides when a key exchange
    /// completes, then reports it.
    ///
    /// `next_keypair` becomes our current keypair for the first rekey; the
    /// one negotiated by the exchange becomes the previous one.
    ///
    /// 应用双方在密钥交换完成时共同的效果，然后上报事件。
    ///
    /// `next_keypair` 成为首次换钥所用的当前密钥对；交换协商出的密钥对变为上一个密钥对。
    pub(crate) fn complete_ake(
        &mut self,
        next_keypair: DhKeyPair,
        ssid: [u8; SSID_LENGTH],
        their_identity: IdentityPublicKey,
    ) {
        if let Some(ake) = self.ake.as_mut() {
            ake.wipe();
        }
        let previous = std::mem::replace(&mut self.msg_state, MessageState::Encrypted);
        self.keys.rotate_our_keypair(next_keypair);
        self.ssid = Some(ssid);
        self.their_identity = Some(their_identity);

        if their_identity == self.identity.public_key() {
            warn!("peer authenticated with our own identity key");
            self.events
                .on_security_event(SecurityEvent::SelfMessageDetected);
        }

        let event = if previous == MessageState::Encrypted {
            SecurityEvent::Reconfirmed
        } else {
            SecurityEvent::Established
        };
        info!(event = %event, their_key_id = self.keys.their_key_id(), "key exchange completed");
        self.events.on_security_event(event);
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("our_instance_tag", &self.our_instance_tag)
            .field("auth_state", &self.auth_state)
            .field("message_state", &self.msg_state)
            .field("their_identity", &self.their_identity)
            .finish_non_exhaustive()
    }
}
