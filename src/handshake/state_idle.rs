use super::Transition;
use crate::conversation::Conversation;
use crate::crypto::keys::DhKeyPair;
use crate::error::HandshakeError;
use crate::protocol::message::DhCommit;
use crate::protocol::state::AuthState;
use tracing::debug;

/// Starts answering a fresh key exchange.
pub(super) fn receive_dh_commit(
    conversation: &mut Conversation,
    message: &DhCommit,
    sender_instance_tag: Option<u32>,
) -> Transition {
    accept_commitment(conversation, AuthState::Idle, message, sender_instance_tag)
}

/// Takes the responder role for `message`, abandoning whatever exchange was
/// in flight, and replies with a DH-Key.
///
/// This is the Idle behaviour, reused by every state that gives up its own
/// attempt in favour of the peer's. `from` is returned untouched on failure.
///
/// 为 `message` 承担响应方角色，放弃正在进行的交换，并回复 DH-Key。
///
/// 这是 Idle 状态的行为，所有放弃自身尝试而接受对方尝试的状态都会复用它。
/// 失败时原样返回 `from`。
pub(super) fn accept_commitment(
    conversation: &mut Conversation,
    from: AuthState,
    message: &DhCommit,
    sender_instance_tag: Option<u32>,
) -> Transition {
    // Entropy is the only thing that can fail, so draw it before anything
    // is wiped.
    let keypair = match DhKeyPair::generate(conversation.rng()) {
        Ok(keypair) => keypair,
        Err(error) => return Transition::rejected(from, error),
    };

    // A new exchange replaces all previous session keys.
    conversation.keys.wipe_keep_reveal_keys();
    let ake = conversation.ake_mut();
    ake.wipe();
    if let Some(tag) = sender_instance_tag {
        ake.receiver_instance_tag = tag;
    }
    ake.their_commitment = Some(message.commitment.clone());
    ake.our_keypair = Some(keypair);

    debug!(from = %from, "accepted peer commitment");
    match conversation.dh_key_message() {
        Some(dh_key) => Transition::send(AuthState::AwaitingCommitmentReveal, dh_key),
        None => Transition::rejected(from, HandshakeError::InvalidState),
    }
}
