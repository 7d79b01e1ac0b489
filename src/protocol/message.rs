use crate::crypto::commitment::{Commitment, CommitmentKey};
use crate::crypto::keys::AES_KEY_LENGTH;
use crate::crypto::signature::{MAC_LENGTH, SealedIdentity};
use crate::error::{HandshakeError, Result};
use crate::protocol::framing::{
    MessageType, append_data, expect_end, extract_data, extract_fixed,
};

/// Defines the messages exchanged during the key exchange, in protocol order.
///
/// 定义密钥交换过程中交换的消息（按协议顺序）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AkeMessage {
    /// Initiator -> Responder: commits to the initiator's public value.
    DhCommit(DhCommit),

    /// Responder -> Initiator: the responder's public value in the clear.
    DhKey(DhKey),

    /// Initiator -> Responder: reveals the commitment key and the
    /// initiator's signed identity.
    RevealSignature(RevealSignature),

    /// Responder -> Initiator: the responder's signed identity.
    Signature(Signature),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhCommit {
    pub commitment: Commitment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhKey {
    pub public_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealSignature {
    pub revealed_key: CommitmentKey,
    pub identity: SealedIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub identity: SealedIdentity,
}

impl AkeMessage {
    /// Parses a message body of the given type.
    ///
    /// The whole body must be consumed; any missing, truncated or trailing
    /// field is `MalformedMessage`. Types outside the key exchange are
    /// `UnknownMessageType`.
    ///
    /// 解析给定类型的消息体。
    ///
    /// 必须完整消费整个消息体；任何缺失、截断或多余的字段均为 `MalformedMessage`。
    /// 不属于密钥交换的类型为 `UnknownMessageType`。
    pub fn parse(message_type: MessageType, body: &[u8]) -> Result<Self> {
        match message_type {
            MessageType::DhCommit => {
                let (offset, encrypted) = extract_data(body, 0)?;
                let (offset, hashed) = extract_data(body, offset)?;
                expect_end(body, offset)?;
                Ok(AkeMessage::DhCommit(DhCommit {
                    commitment: Commitment {
                        encrypted_public_value: encrypted.to_vec(),
                        hashed_public_value: hashed.to_vec(),
                    },
                }))
            }
            MessageType::DhKey => {
                let (offset, public_value) = extract_data(body, 0)?;
                expect_end(body, offset)?;
                Ok(AkeMessage::DhKey(DhKey {
                    public_value: public_value.to_vec(),
                }))
            }
            MessageType::RevealSignature => {
                let (offset, revealed_key) = extract_data(body, 0)?;
                let revealed_key: [u8; AES_KEY_LENGTH] = revealed_key
                    .try_into()
                    .map_err(|_| HandshakeError::MalformedMessage)?;
                let (identity, offset) = parse_sealed_identity(body, offset)?;
                expect_end(body, offset)?;
                Ok(AkeMessage::RevealSignature(RevealSignature {
                    revealed_key: CommitmentKey::from_bytes(revealed_key),
                    identity,
                }))
            }
            MessageType::Signature => {
                let (identity, offset) = parse_sealed_identity(body, 0)?;
                expect_end(body, offset)?;
                Ok(AkeMessage::Signature(Signature { identity }))
            }
            MessageType::Data => Err(HandshakeError::UnknownMessageType(message_type.as_byte())),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            AkeMessage::DhCommit(_) => MessageType::DhCommit,
            AkeMessage::DhKey(_) => MessageType::DhKey,
            AkeMessage::RevealSignature(_) => MessageType::RevealSignature,
            AkeMessage::Signature(_) => MessageType::Signature,
        }
    }

    /// Serializes the message body (without the framing header).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            AkeMessage::DhCommit(m) => {
                append_data(&mut out, &m.commitment.encrypted_public_value);
                append_data(&mut out, &m.commitment.hashed_public_value);
            }
            AkeMessage::DhKey(m) => append_data(&mut out, &m.public_value),
            AkeMessage::RevealSignature(m) => {
                append_data(&mut out, m.revealed_key.as_bytes());
                append_sealed_identity(&mut out, &m.identity);
            }
            AkeMessage::Signature(m) => append_sealed_identity(&mut out, &m.identity),
        }
        out
    }
}

fn parse_sealed_identity(body: &[u8], offset: usize) -> Result<(SealedIdentity, usize)> {
    let (offset, encrypted) = extract_data(body, offset)?;
    let (offset, mac) = extract_fixed::<MAC_LENGTH>(body, offset)?;
    Ok((
        SealedIdentity {
            encrypted: encrypted.to_vec(),
            mac,
        },
        offset,
    ))
}

fn append_sealed_identity(out: &mut Vec<u8>, identity: &SealedIdentity) {
    append_data(out, &identity.encrypted);
    out.extend_from_slice(&identity.mac);
}

/// A framed message ready for the transport, tagged with its type.
///
/// 已封装、可交给传输层的消息，并标注其类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub message_type: MessageType,
    pub bytes: Vec<u8>,
}

impl OutgoingMessage {
    pub fn new(message_type: MessageType, bytes: Vec<u8>) -> Self {
        Self {
            message_type,
            bytes,
        }
    }
}
