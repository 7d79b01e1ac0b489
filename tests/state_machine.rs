//! Cell-by-cell checks of the key exchange dispatch table.
//! 逐格检查密钥交换分发表。

mod common;

use common::{Party, body, deliver, party, snapshot};
use otr_handshake::protocol::framing::{self, MessageType, UNKNOWN_INSTANCE_TAG};
use otr_handshake::protocol::message::{AkeMessage, DhKey};
use otr_handshake::{AuthState, HandshakeError, MessageState, OutgoingMessage, Result};

/// Bodies of one well-formed exchange between two unrelated parties.
struct Bodies {
    dh_key: Vec<u8>,
    reveal_signature: Vec<u8>,
    signature: Vec<u8>,
}

fn foreign_bodies() -> Result<Bodies> {
    let mut carol = party(100, 0xc1);
    let mut dave = party(101, 0xd2);
    let dh_commit = carol.conversation.start_ake()?;
    let dh_key = deliver(&mut dave.conversation, vec![dh_commit])?;
    let reveal_signature = deliver(&mut carol.conversation, dh_key.clone())?;
    let signature = deliver(&mut dave.conversation, reveal_signature.clone())?;
    Ok(Bodies {
        dh_key: body(&dh_key[0]),
        reveal_signature: body(&reveal_signature[0]),
        signature: body(&signature[0]),
    })
}

/// Feeds an unframed message and checks it was ignored: no reply, no event
/// and no change to any state or key material.
fn assert_ignored(party: &mut Party, message_type: MessageType, payload: &[u8]) -> Result<()> {
    let before = snapshot(&party.conversation);
    let events_before = party.events();
    let replies = party
        .conversation
        .process_inbound(message_type.as_byte(), payload)?;
    assert!(
        replies.is_empty(),
        "{message_type} in {} produced a reply",
        before.auth_state
    );
    assert_eq!(snapshot(&party.conversation), before);
    assert_eq!(party.events(), events_before);
    Ok(())
}

/// Feeds an unframed message and checks it was rejected as malformed
/// without touching the conversation.
fn assert_malformed(party: &mut Party, message_type: MessageType, payload: &[u8]) {
    let before = snapshot(&party.conversation);
    assert!(matches!(
        party
            .conversation
            .process_inbound(message_type.as_byte(), payload),
        Err(HandshakeError::MalformedMessage)
    ));
    assert_eq!(snapshot(&party.conversation), before);
}

/// Alice and Bob with Alice waiting for the Signature. Returns the
/// messages still in flight: the Reveal-Signature and Bob's Signature.
fn alice_awaiting_signature(alice: &mut Party, bob: &mut Party) -> Result<(Vec<OutgoingMessage>, Vec<OutgoingMessage>)> {
    let dh_commit = alice.conversation.start_ake()?;
    let dh_key = deliver(&mut bob.conversation, vec![dh_commit])?;
    let reveal_signature = deliver(&mut alice.conversation, dh_key)?;
    let signature = deliver(&mut bob.conversation, reveal_signature.clone())?;
    Ok((reveal_signature, signature))
}

#[test]
fn idle_ignores_everything_but_dh_commit() -> Result<()> {
    let bodies = foreign_bodies()?;
    let mut alice = party(1, 0xa1);

    assert_ignored(&mut alice, MessageType::DhKey, &bodies.dh_key)?;
    assert_ignored(&mut alice, MessageType::RevealSignature, &bodies.reveal_signature)?;
    assert_ignored(&mut alice, MessageType::Signature, &bodies.signature)?;
    assert_eq!(alice.conversation.message_state(), MessageState::Plaintext);
    Ok(())
}

#[test]
fn idle_signature_leaves_a_queued_message_alone() -> Result<()> {
    let bodies = foreign_bodies()?;
    let mut alice = party(19, 0xa1);
    alice
        .conversation
        .queue_retransmit(OutgoingMessage::new(MessageType::Data, vec![9, 9]));

    assert_ignored(&mut alice, MessageType::Signature, &bodies.signature)?;
    assert!(alice.conversation.keys().has_pending_retransmit());
    Ok(())
}

#[test]
fn late_signature_after_completion_is_ignored() -> Result<()> {
    let mut alice = party(20, 0xa1);
    let mut bob = party(21, 0xb2);
    let (_, signature) = alice_awaiting_signature(&mut alice, &mut bob)?;
    deliver(&mut alice.conversation, signature.clone())?;
    assert_eq!(alice.conversation.auth_state(), &AuthState::Idle);
    assert_eq!(alice.conversation.message_state(), MessageState::Encrypted);

    alice
        .conversation
        .queue_retransmit(OutgoingMessage::new(MessageType::Data, vec![9, 9]));
    let before = snapshot(&alice.conversation);

    // The duplicate goes through the framed path, as it would on the wire.
    let replies = deliver(&mut alice.conversation, signature.clone())?;
    assert!(replies.is_empty());
    assert_eq!(snapshot(&alice.conversation), before);
    assert!(alice.conversation.keys().has_pending_retransmit());

    assert_ignored(&mut alice, MessageType::Signature, &body(&signature[0]))?;
    Ok(())
}

#[test]
fn late_reveal_signature_after_completion_is_ignored() -> Result<()> {
    let mut alice = party(22, 0xa1);
    let mut bob = party(23, 0xb2);
    let (reveal_signature, _) = alice_awaiting_signature(&mut alice, &mut bob)?;
    assert_eq!(bob.conversation.message_state(), MessageState::Encrypted);

    bob.conversation
        .queue_retransmit(OutgoingMessage::new(MessageType::Data, vec![9, 9]));
    let before = snapshot(&bob.conversation);

    let replies = deliver(&mut bob.conversation, reveal_signature)?;
    assert!(replies.is_empty());
    assert_eq!(snapshot(&bob.conversation), before);
    assert_eq!(bob.events().len(), 1);
    Ok(())
}

#[test]
fn awaiting_their_public_value_ignores_reveal_and_signature() -> Result<()> {
    let bodies = foreign_bodies()?;
    let mut alice = party(2, 0xa1);
    alice.conversation.start_ake()?;

    assert_ignored(&mut alice, MessageType::RevealSignature, &bodies.reveal_signature)?;
    assert_ignored(&mut alice, MessageType::Signature, &bodies.signature)?;
    Ok(())
}

#[test]
fn awaiting_commitment_reveal_ignores_dh_key_and_signature() -> Result<()> {
    let bodies = foreign_bodies()?;
    let mut alice = party(3, 0xa1);
    let mut bob = party(4, 0xb2);
    let dh_commit = alice.conversation.start_ake()?;
    deliver(&mut bob.conversation, vec![dh_commit])?;

    assert_ignored(&mut bob, MessageType::DhKey, &bodies.dh_key)?;
    assert_ignored(&mut bob, MessageType::Signature, &bodies.signature)?;
    Ok(())
}

#[test]
fn awaiting_signature_ignores_reveal_and_unknown_dh_key() -> Result<()> {
    let bodies = foreign_bodies()?;
    let mut alice = party(5, 0xa1);
    let mut bob = party(6, 0xb2);
    alice_awaiting_signature(&mut alice, &mut bob)?;

    assert_ignored(&mut alice, MessageType::RevealSignature, &bodies.reveal_signature)?;
    let other_dh_key = AkeMessage::DhKey(DhKey {
        public_value: vec![9; 32],
    })
    .encode();
    assert_ignored(&mut alice, MessageType::DhKey, &other_dh_key)?;
    Ok(())
}

#[test]
fn dh_commit_while_awaiting_signature_switches_roles() -> Result<()> {
    let mut alice = party(7, 0xa1);
    let mut bob = party(8, 0xb2);
    alice_awaiting_signature(&mut alice, &mut bob)?;

    // Bob starts over before his Signature reaches Alice.
    let dh_commit = bob.conversation.start_ake()?;
    let replies = deliver(&mut alice.conversation, vec![dh_commit])?;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].message_type, MessageType::DhKey);
    assert_eq!(
        alice.conversation.auth_state(),
        &AuthState::AwaitingCommitmentReveal
    );
    // Keys installed by the abandoned exchange are gone.
    assert!(alice.conversation.keys().our_current_keypair().is_none());
    assert_eq!(alice.conversation.keys().counter(), 0);
    Ok(())
}

#[test]
fn wrong_commitment_key_keeps_waiting_for_the_reveal() -> Result<()> {
    let mut alice = party(9, 0xa1);
    let mut bob = party(10, 0xb2);
    let dh_commit = alice.conversation.start_ake()?;
    let dh_key = deliver(&mut bob.conversation, vec![dh_commit])?;
    let reveal_signature = deliver(&mut alice.conversation, dh_key)?;

    // DATA(r) starts the body: flip a bit of r.
    let mut tampered = body(&reveal_signature[0]);
    tampered[4] ^= 0x01;
    assert!(matches!(
        bob.conversation
            .process_inbound(MessageType::RevealSignature.as_byte(), &tampered),
        Err(HandshakeError::InvalidCommitment)
    ));
    assert_eq!(
        bob.conversation.auth_state(),
        &AuthState::AwaitingCommitmentReveal
    );
    assert_eq!(bob.conversation.message_state(), MessageState::Plaintext);
    assert!(bob.events().is_empty());

    // The genuine message still completes the exchange.
    let signature = deliver(&mut bob.conversation, reveal_signature)?;
    assert_eq!(signature.len(), 1);
    assert_eq!(bob.conversation.message_state(), MessageState::Encrypted);
    Ok(())
}

#[test]
fn forged_reveal_signature_mac_is_rejected() -> Result<()> {
    let mut alice = party(11, 0xa1);
    let mut bob = party(12, 0xb2);
    let dh_commit = alice.conversation.start_ake()?;
    let dh_key = deliver(&mut bob.conversation, vec![dh_commit])?;
    let reveal_signature = deliver(&mut alice.conversation, dh_key)?;

    let mut tampered = body(&reveal_signature[0]);
    let last = tampered.len() - 1;
    tampered[last] ^= 0x80;
    assert!(matches!(
        bob.conversation
            .process_inbound(MessageType::RevealSignature.as_byte(), &tampered),
        Err(HandshakeError::InvalidSignature)
    ));
    assert_eq!(
        bob.conversation.auth_state(),
        &AuthState::AwaitingCommitmentReveal
    );
    Ok(())
}

#[test]
fn forged_signature_keeps_waiting_for_the_signature() -> Result<()> {
    let mut alice = party(13, 0xa1);
    let mut bob = party(14, 0xb2);
    let (_, signature) = alice_awaiting_signature(&mut alice, &mut bob)?;

    let mut tampered = body(&signature[0]);
    let last = tampered.len() - 1;
    tampered[last] ^= 0x80;
    assert!(matches!(
        alice
            .conversation
            .process_inbound(MessageType::Signature.as_byte(), &tampered),
        Err(HandshakeError::InvalidSignature)
    ));
    assert!(matches!(
        alice.conversation.auth_state(),
        AuthState::AwaitingSignature { .. }
    ));
    assert_eq!(alice.conversation.message_state(), MessageState::Plaintext);

    deliver(&mut alice.conversation, signature)?;
    assert_eq!(alice.conversation.message_state(), MessageState::Encrypted);
    Ok(())
}

#[test]
fn bad_public_values_are_rejected_without_side_effects() -> Result<()> {
    let mut alice = party(15, 0xa1);
    alice.conversation.start_ake()?;

    for public_value in [vec![0u8; 32], vec![7u8; 31]] {
        let payload = AkeMessage::DhKey(DhKey { public_value }).encode();
        assert!(matches!(
            alice
                .conversation
                .process_inbound(MessageType::DhKey.as_byte(), &payload),
            Err(HandshakeError::InvalidPublicValue)
        ));
        assert_eq!(
            alice.conversation.auth_state(),
            &AuthState::AwaitingTheirPublicValue
        );
        assert_eq!(alice.conversation.keys().counter(), 0);
    }
    Ok(())
}

#[test]
fn malformed_and_unknown_messages_fail_in_any_state() -> Result<()> {
    let mut alice = party(16, 0xa1);

    assert!(matches!(
        alice.conversation.process_inbound(0x42, &[]),
        Err(HandshakeError::UnknownMessageType(0x42))
    ));
    assert!(matches!(
        alice
            .conversation
            .process_inbound(MessageType::Data.as_byte(), &[]),
        Err(HandshakeError::UnknownMessageType(0x03))
    ));
    // A no-op cell still rejects a body it cannot parse.
    assert!(matches!(
        alice
            .conversation
            .process_inbound(MessageType::Signature.as_byte(), &[0, 0, 0]),
        Err(HandshakeError::MalformedMessage)
    ));
    assert_eq!(alice.conversation.auth_state(), &AuthState::Idle);
    Ok(())
}

#[test]
fn idle_stores_the_commitment_it_received() -> Result<()> {
    let mut alice = party(24, 0xa1);
    let mut bob = party(25, 0xb2);
    let dh_commit = alice.conversation.start_ake()?;

    let AkeMessage::DhCommit(parsed) = AkeMessage::parse(MessageType::DhCommit, &body(&dh_commit))? else {
        panic!("a DH-Commit body parsed as another message");
    };
    deliver(&mut bob.conversation, vec![dh_commit])?;

    let ake = bob.conversation.ake_context().unwrap();
    assert_eq!(ake.their_commitment(), Some(&parsed.commitment));
    assert_eq!(ake.their_public_value(), None);
    assert_eq!(
        alice.conversation.ake_context().unwrap().our_commitment(),
        Some(&parsed.commitment)
    );
    Ok(())
}

#[test]
fn malformed_messages_mid_exchange_change_nothing() -> Result<()> {
    let bodies = foreign_bodies()?;
    let mut alice = party(26, 0xa1);
    let mut bob = party(27, 0xb2);
    let dh_commit = alice.conversation.start_ake()?;
    let dh_key = deliver(&mut bob.conversation, vec![dh_commit.clone()])?;

    // Bob waits for the reveal.
    let commit_body = body(&dh_commit);
    for (message_type, full) in [
        (MessageType::DhCommit, &commit_body),
        (MessageType::RevealSignature, &bodies.reveal_signature),
        (MessageType::Signature, &bodies.signature),
    ] {
        assert_malformed(&mut bob, message_type, &full[..full.len() - 1]);
        let mut padded = full.clone();
        padded.push(0);
        assert_malformed(&mut bob, message_type, &padded);
    }
    assert_eq!(
        bob.conversation.auth_state(),
        &AuthState::AwaitingCommitmentReveal
    );

    // Alice waits for the signature.
    deliver(&mut alice.conversation, dh_key.clone())?;
    let dh_key_body = body(&dh_key[0]);
    for (message_type, full) in [
        (MessageType::DhKey, &dh_key_body),
        (MessageType::Signature, &bodies.signature),
        (MessageType::RevealSignature, &bodies.reveal_signature),
    ] {
        assert_malformed(&mut alice, message_type, &full[..full.len() - 1]);
        assert_malformed(&mut alice, message_type, &[]);
    }
    assert!(matches!(
        alice.conversation.auth_state(),
        AuthState::AwaitingSignature { .. }
    ));
    assert_eq!(alice.conversation.keys().counter(), 1);
    Ok(())
}

#[test]
fn framing_checks_version_and_instance_tags() -> Result<()> {
    let mut alice = party(17, 0xa1);
    let mut bob = party(18, 0xb2);
    let dh_commit = alice.conversation.start_ake()?;
    let payload = body(&dh_commit);
    let alice_tag = alice.conversation.our_instance_tag();
    let bob_tag = bob.conversation.our_instance_tag();

    let mut old_version = dh_commit.bytes.clone();
    old_version[1] = 2;
    assert!(matches!(
        bob.conversation.receive_message(&old_version),
        Err(HandshakeError::UnsupportedVersion(2))
    ));

    let elsewhere = framing::wrap(MessageType::DhCommit, alice_tag, bob_tag ^ 0x0100_0000, &payload);
    assert!(matches!(
        bob.conversation.receive_message(&elsewhere),
        Err(HandshakeError::InstanceTagMismatch)
    ));

    let reserved_sender = framing::wrap(MessageType::DhCommit, 0x42, UNKNOWN_INSTANCE_TAG, &payload);
    assert!(matches!(
        bob.conversation.receive_message(&reserved_sender),
        Err(HandshakeError::InstanceTagMismatch)
    ));

    // Only a DH-Commit may leave the receiver tag unknown.
    let dh_key = deliver(&mut bob.conversation, vec![dh_commit])?;
    let unaddressed = framing::wrap(MessageType::DhKey, bob_tag, UNKNOWN_INSTANCE_TAG, &body(&dh_key[0]));
    assert!(matches!(
        alice.conversation.receive_message(&unaddressed),
        Err(HandshakeError::InstanceTagMismatch)
    ));
    assert_eq!(
        alice.conversation.auth_state(),
        &AuthState::AwaitingTheirPublicValue
    );

    deliver(&mut alice.conversation, dh_key)?;
    assert_eq!(alice.conversation.their_instance_tag(), bob_tag);
    Ok(())
}
