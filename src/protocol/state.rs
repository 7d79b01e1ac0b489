//! Defines the states of the key exchange and of the conversation around it.
//!
//! The key exchange is a closed set of four states, so it is an enum matched
//! against the incoming message type rather than a family of types.

use crate::protocol::message::OutgoingMessage;
use std::fmt;

/// The authentication state of a conversation.
///
/// 会话的认证状态。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// No key exchange in flight.
    ///
    /// 没有进行中的密钥交换。
    #[default]
    Idle,

    /// We sent a DH-Commit and wait for the peer's DH-Key.
    ///
    /// 已发送 DH-Commit，等待对方的 DH-Key。
    AwaitingTheirPublicValue,

    /// We answered a DH-Commit with a DH-Key and wait for the peer to reveal
    /// its commitment.
    ///
    /// 已用 DH-Key 回应 DH-Commit，等待对方揭示其承诺。
    AwaitingCommitmentReveal,

    /// We sent a Reveal-Signature and wait for the peer's Signature.
    ///
    /// The Reveal-Signature is kept verbatim so it can be retransmitted if
    /// the peer's DH-Key arrives again.
    ///
    /// 已发送 Reveal-Signature，等待对方的 Signature。
    ///
    /// Reveal-Signature 会被原样保存，以便对方的 DH-Key 再次到达时重传。
    AwaitingSignature { reveal_signature: OutgoingMessage },
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::Idle => "idle",
            AuthState::AwaitingTheirPublicValue => "awaiting their public value",
            AuthState::AwaitingCommitmentReveal => "awaiting commitment reveal",
            AuthState::AwaitingSignature { .. } => "awaiting signature",
        };
        f.write_str(name)
    }
}

/// Whether messages in a conversation travel in the clear or encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageState {
    #[default]
    Plaintext,
    Encrypted,
    Finished,
}
