//! Shared setup for the integration tests.
//! 集成测试的公共设置。
#![allow(dead_code)]

use otr_handshake::crypto::keys::SSID_LENGTH;
use otr_handshake::handshake::AkeContext;
use otr_handshake::protocol::framing;
use otr_handshake::{
    AuthState, Conversation, ConversationConfig, IdentityKeyPair, KeyManagementContext, MessageState,
    OutgoingMessage, Result, SecurityEvent,
};
use rand_chacha::ChaCha20Rng;
use rand_core::{CryptoRng, RngCore, SeedableRng};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

/// A conversation together with the events it reported.
pub struct Party {
    pub conversation: Conversation,
    events: Arc<Mutex<Vec<SecurityEvent>>>,
}

impl Party {
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().unwrap().clone()
    }
}

pub fn party(rng_seed: u64, identity_seed: u8) -> Party {
    party_with_config(rng_seed, identity_seed, ConversationConfig::default())
}

pub fn party_with_config(rng_seed: u64, identity_seed: u8, config: ConversationConfig) -> Party {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let conversation = Conversation::builder()
        .identity(IdentityKeyPair::from_seed(&[identity_seed; 32]))
        .event_handler(move |event: SecurityEvent| sink.lock().unwrap().push(event))
        .config(config)
        .rng(ChaCha20Rng::seed_from_u64(rng_seed))
        .build()
        .unwrap();
    Party {
        conversation,
        events,
    }
}

/// Everything a rejected or ignored message must leave untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub auth_state: AuthState,
    pub message_state: MessageState,
    pub ake: Option<AkeContext>,
    pub keys: KeyManagementContext,
    pub ssid: Option<[u8; SSID_LENGTH]>,
}

pub fn snapshot(conversation: &Conversation) -> Snapshot {
    Snapshot {
        auth_state: conversation.auth_state().clone(),
        message_state: conversation.message_state(),
        // The first inbound message creates an empty context; that is not a
        // change.
        ake: conversation
            .ake_context()
            .filter(|ake| **ake != AkeContext::new(ake.sender_instance_tag()))
            .cloned(),
        keys: conversation.keys().clone(),
        ssid: conversation.ssid().copied(),
    }
}

/// Delivers `batch` in order and collects every reply.
pub fn deliver(to: &mut Conversation, batch: Vec<OutgoingMessage>) -> Result<Vec<OutgoingMessage>> {
    let mut replies = Vec::new();
    for message in batch {
        replies.extend(to.receive_message(&message.bytes)?);
    }
    Ok(replies)
}

/// Shuttles messages between `a` and `b` until neither has anything left
/// to send.
pub fn run_until_quiet(
    a: &mut Conversation,
    b: &mut Conversation,
    mut to_a: Vec<OutgoingMessage>,
    mut to_b: Vec<OutgoingMessage>,
) -> Result<()> {
    for _ in 0..16 {
        if to_a.is_empty() && to_b.is_empty() {
            return Ok(());
        }
        let next_to_b = deliver(a, std::mem::take(&mut to_a))?;
        let next_to_a = deliver(b, std::mem::take(&mut to_b))?;
        to_a = next_to_a;
        to_b = next_to_b;
    }
    panic!("conversations kept exchanging messages");
}

/// Runs a complete exchange with `initiator` starting it.
pub fn handshake(initiator: &mut Conversation, responder: &mut Conversation) -> Result<()> {
    let dh_commit = initiator.start_ake()?;
    run_until_quiet(initiator, responder, Vec::new(), vec![dh_commit])
}

/// The body of a framed message.
pub fn body(message: &OutgoingMessage) -> Vec<u8> {
    let (_, body) = framing::unwrap(&message.bytes).unwrap();
    body.to_vec()
}

/// An entropy source that always fails.
pub struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {}

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        Err(rand_core::Error::from(
            NonZeroU32::new(rand_core::Error::CUSTOM_START).unwrap(),
        ))
    }
}

impl CryptoRng for FailingRng {}
