use super::state_idle::accept_commitment;
use super::{AKE_KEY_ID, Transition};
use crate::conversation::Conversation;
use crate::crypto::commitment::hash_public_value;
use crate::crypto::keys::{AkeKeys, public_value_from_slice};
use crate::crypto::signature::{SealingKeys, seal_identity};
use crate::error::{HandshakeError, Result};
use crate::protocol::framing::MessageType;
use crate::protocol::message::{AkeMessage, DhCommit, DhKey, RevealSignature};
use crate::protocol::state::AuthState;
use tracing::debug;

/// Both sides sent a DH-Commit. The side whose hashed public value is larger
/// keeps the initiator role; the other one drops its attempt and answers.
///
/// 双方都发送了 DH-Commit。公钥哈希较大的一方保留发起方角色，另一方放弃自身尝试并作出应答。
pub(super) fn receive_dh_commit(
    conversation: &mut Conversation,
    message: &DhCommit,
    sender_instance_tag: Option<u32>,
) -> Transition {
    let Some(our_public) = conversation.ake().and_then(|ake| ake.our_public_value()) else {
        return Transition::rejected(AuthState::AwaitingTheirPublicValue, HandshakeError::InvalidState);
    };
    let our_hash = hash_public_value(our_public);

    if our_hash.as_slice() > message.commitment.hashed_public_value.as_slice() {
        // We keep the initiator role and still wait for the peer's DH-Key.
        // Moving to AwaitingCommitmentReveal here would drop that DH-Key as a
        // no-op and leave both sides waiting on each other.
        debug!("won commitment tie-break, resending our DH-Commit");
        return match conversation.dh_commit_message() {
            Some(dh_commit) => Transition::send(AuthState::AwaitingTheirPublicValue, dh_commit),
            None => Transition::rejected(AuthState::AwaitingTheirPublicValue, HandshakeError::InvalidState),
        };
    }

    debug!("lost commitment tie-break, answering the peer's DH-Commit");
    accept_commitment(
        conversation,
        AuthState::AwaitingTheirPublicValue,
        message,
        sender_instance_tag,
    )
}

/// Receives the responder's public value and reveals our commitment together
/// with our signed identity.
pub(super) fn receive_dh_key(
    conversation: &mut Conversation,
    message: &DhKey,
    sender_instance_tag: Option<u32>,
) -> Transition {
    Transition::from_result(
        AuthState::AwaitingTheirPublicValue,
        reveal_commitment(conversation, message, sender_instance_tag),
    )
}

fn reveal_commitment(
    conversation: &mut Conversation,
    message: &DhKey,
    sender_instance_tag: Option<u32>,
) -> Result<Transition> {
    let ake = conversation.ake.as_ref().ok_or(HandshakeError::InvalidState)?;
    let ours = ake.our_keypair.as_ref().ok_or(HandshakeError::InvalidState)?;
    let commitment_key = ake
        .our_commitment_key
        .as_ref()
        .ok_or(HandshakeError::InvalidState)?;

    let their_public = public_value_from_slice(&message.public_value)?;
    let shared = ours.shared_secret(&their_public)?;
    let keys = AkeKeys::derive(&shared);

    let identity = seal_identity(
        &conversation.identity,
        AKE_KEY_ID,
        ours.public(),
        &their_public,
        &SealingKeys {
            encryption: &keys.c,
            authenticator: &keys.m1,
            mac: &keys.m2,
        },
    );
    let body = AkeMessage::RevealSignature(RevealSignature {
        revealed_key: commitment_key.clone(),
        identity,
    })
    .encode();
    let our_keypair = ours.clone();
    let receiver_instance_tag = sender_instance_tag.unwrap_or(ake.receiver_instance_tag);

    let ake = conversation.ake_mut();
    ake.receiver_instance_tag = receiver_instance_tag;
    ake.their_public_value = Some(their_public);
    ake.keys = Some(keys);
    let reveal_signature = conversation.wrap(MessageType::RevealSignature, &body);

    // The session keys become usable before the peer has proven its
    // identity; the Signature step only confirms them.
    conversation.keys.set_their_current_public_value(their_public);
    conversation.keys.set_our_current_keypair(AKE_KEY_ID, our_keypair);
    conversation.keys.increment_counter();

    Ok(Transition::send(
        AuthState::AwaitingSignature {
            reveal_signature: reveal_signature.clone(),
        },
        reveal_signature,
    ))
}
