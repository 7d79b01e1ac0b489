use super::{AKE_KEY_ID, Transition};
use crate::conversation::Conversation;
use crate::crypto::keys::{AkeKeys, DhKeyPair};
use crate::crypto::signature::{SealingKeys, open_identity, seal_identity};
use crate::error::{HandshakeError, Result};
use crate::protocol::framing::MessageType;
use crate::protocol::message::{AkeMessage, DhCommit, RevealSignature, Signature};
use crate::protocol::state::AuthState;
use tracing::debug;

/// The initiator committed again, usually because our DH-Key was lost. The
/// new commitment replaces the old one and the same DH-Key goes out again.
///
/// 发起方再次提交承诺，通常是因为我们的 DH-Key 丢失了。新的承诺替换旧的承诺，并重新发送相同的 DH-Key。
pub(super) fn receive_dh_commit(
    conversation: &mut Conversation,
    message: &DhCommit,
    sender_instance_tag: Option<u32>,
) -> Transition {
    if conversation.dh_key_message().is_none() {
        return Transition::rejected(AuthState::AwaitingCommitmentReveal, HandshakeError::InvalidState);
    }

    conversation.keys.wipe_keep_reveal_keys();
    let ake = conversation.ake_mut();
    ake.wipe_their_public_value_only();
    ake.their_commitment = Some(message.commitment.clone());
    if let Some(tag) = sender_instance_tag {
        ake.receiver_instance_tag = tag;
    }

    debug!("replaced peer commitment, resending DH-Key");
    Transition::to(AuthState::AwaitingCommitmentReveal, conversation.dh_key_message())
}

/// Opens the initiator's commitment, checks its identity and answers with
/// ours. This completes the exchange on the responder side.
pub(super) fn receive_reveal_signature(
    conversation: &mut Conversation,
    message: &RevealSignature,
) -> Transition {
    Transition::from_result(
        AuthState::AwaitingCommitmentReveal,
        authenticate_initiator(conversation, message),
    )
}

fn authenticate_initiator(conversation: &mut Conversation, message: &RevealSignature) -> Result<Transition> {
    let next_keypair = DhKeyPair::generate(conversation.rng())?;

    let ake = conversation.ake.as_ref().ok_or(HandshakeError::InvalidState)?;
    let ours = ake.our_keypair.as_ref().ok_or(HandshakeError::InvalidState)?;
    let commitment = ake
        .their_commitment
        .as_ref()
        .ok_or(HandshakeError::InvalidState)?;

    let their_public = commitment.open(&message.revealed_key)?;
    let shared = ours.shared_secret(&their_public)?;
    let keys = AkeKeys::derive(&shared);

    let initiator = open_identity(
        &message.identity,
        &their_public,
        ours.public(),
        &SealingKeys {
            encryption: &keys.c,
            authenticator: &keys.m1,
            mac: &keys.m2,
        },
    )?;

    let identity = seal_identity(
        &conversation.identity,
        AKE_KEY_ID,
        ours.public(),
        &their_public,
        &SealingKeys {
            encryption: &keys.c_prime,
            authenticator: &keys.m1_prime,
            mac: &keys.m2_prime,
        },
    );
    let body = AkeMessage::Signature(Signature { identity }).encode();
    let our_keypair = ours.clone();
    let ssid = keys.ssid;

    conversation.ake_mut().their_public_value = Some(their_public);
    let signature = conversation.wrap(MessageType::Signature, &body);

    conversation.keys.set_their_current_public_value(their_public);
    conversation.keys.set_their_key_id(initiator.key_id);
    conversation.keys.set_our_current_keypair(AKE_KEY_ID, our_keypair);
    conversation.keys.increment_counter();
    conversation.complete_ake(next_keypair, ssid, initiator.public_key);

    Ok(Transition::completed(Some(signature)))
}
