use super::Transition;
use super::state_idle::accept_commitment;
use crate::conversation::Conversation;
use crate::crypto::keys::DhKeyPair;
use crate::crypto::signature::{SealingKeys, open_identity};
use crate::error::{HandshakeError, Result};
use crate::protocol::message::{DhCommit, DhKey, OutgoingMessage, Signature};
use crate::protocol::state::AuthState;
use tracing::debug;

/// The peer abandoned our exchange and started its own. Our Reveal-Signature
/// is dropped and we answer as responder.
pub(super) fn receive_dh_commit(
    conversation: &mut Conversation,
    message: &DhCommit,
    sender_instance_tag: Option<u32>,
    reveal_signature: OutgoingMessage,
) -> Transition {
    accept_commitment(
        conversation,
        AuthState::AwaitingSignature { reveal_signature },
        message,
        sender_instance_tag,
    )
}

/// A repeated DH-Key means our Reveal-Signature was lost: send it again.
/// A DH-Key with any other value is ignored.
///
/// 重复的 DH-Key 表示我们的 Reveal-Signature 丢失了，需要重发。其他值的 DH-Key 会被忽略。
pub(super) fn receive_dh_key(
    conversation: &mut Conversation,
    message: &DhKey,
    reveal_signature: OutgoingMessage,
) -> Transition {
    let repeated = conversation
        .ake()
        .and_then(|ake| ake.their_public_value())
        .is_some_and(|known| known.as_slice() == message.public_value.as_slice());

    if repeated {
        debug!("peer repeated its DH-Key, resending Reveal-Signature");
        let resend = reveal_signature.clone();
        Transition::send(AuthState::AwaitingSignature { reveal_signature }, resend)
    } else {
        Transition::ignore(AuthState::AwaitingSignature { reveal_signature })
    }
}

/// Verifies the responder's identity. This completes the exchange on the
/// initiator side.
pub(super) fn receive_signature(
    conversation: &mut Conversation,
    message: &Signature,
    reveal_signature: OutgoingMessage,
) -> Transition {
    match authenticate_responder(conversation, message) {
        Ok(()) => Transition::completed(None),
        Err(error) => Transition::rejected(AuthState::AwaitingSignature { reveal_signature }, error),
    }
}

fn authenticate_responder(conversation: &mut Conversation, message: &Signature) -> Result<()> {
    let next_keypair = DhKeyPair::generate(conversation.rng())?;

    let ake = conversation.ake.as_ref().ok_or(HandshakeError::InvalidState)?;
    let ours = ake.our_keypair.as_ref().ok_or(HandshakeError::InvalidState)?;
    let their_public = *ake
        .their_public_value
        .as_ref()
        .ok_or(HandshakeError::InvalidState)?;
    let keys = ake.keys.as_ref().ok_or(HandshakeError::InvalidState)?;

    let responder = open_identity(
        &message.identity,
        &their_public,
        ours.public(),
        &SealingKeys {
            encryption: &keys.c_prime,
            authenticator: &keys.m1_prime,
            mac: &keys.m2_prime,
        },
    )?;
    let ssid = keys.ssid;

    conversation.keys.set_their_current_public_value(their_public);
    conversation.keys.set_their_key_id(responder.key_id);
    conversation.complete_ake(next_keypair, ssid, responder.public_key);
    Ok(())
}
