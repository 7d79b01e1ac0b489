//! Implements the key exchange state machine.
//!
//! Each inbound message type has one entry point on [`AuthState`]. An entry
//! point consumes the current state, may mutate the conversation it is given
//! and returns a [`Transition`]: the next state, at most one message to send
//! and the outcome. On failure nothing in the conversation has changed and
//! the returned state is the one the failed attempt started from.
//!
//! Cells of the dispatch table without an entry below are silent no-ops.
//!
//! 实现密钥交换状态机。
//!
//! 每种入站消息类型在 [`AuthState`] 上都有一个入口。入口会消耗当前状态，
//! 可能修改传入的会话，并返回一个 [`Transition`]：下一个状态、最多一条待发送消息以及结果。
//! 失败时会话中的任何内容都不会改变，返回的状态即失败尝试开始时的状态。

use crate::conversation::Conversation;
use crate::error::{HandshakeError, Result};
use crate::protocol::message::{DhCommit, DhKey, OutgoingMessage, RevealSignature, Signature};
use crate::protocol::state::AuthState;

pub mod context;
mod state_awaiting_commitment_reveal;
mod state_awaiting_signature;
mod state_awaiting_their_public_value;
mod state_idle;

pub use context::{AKE_KEY_ID, AkeContext};

/// The result of feeding one message to the state machine.
///
/// 向状态机输入一条消息的结果。
#[derive(Debug)]
#[must_use]
pub struct Transition {
    pub state: AuthState,
    pub outgoing: Option<OutgoingMessage>,
    pub result: Result<()>,
    /// Set only when this step finished the exchange.
    ///
    /// 仅当此步骤完成了密钥交换时设置。
    pub completed: bool,
}

impl Transition {
    /// Moves to `state`, sending `outgoing` if present.
    pub fn to(state: AuthState, outgoing: Option<OutgoingMessage>) -> Self {
        Self {
            state,
            outgoing,
            result: Ok(()),
            completed: false,
        }
    }

    /// The exchange finished; the conversation is back to `Idle`.
    pub fn completed(outgoing: Option<OutgoingMessage>) -> Self {
        Self {
            completed: true,
            ..Self::to(AuthState::Idle, outgoing)
        }
    }

    pub fn send(state: AuthState, outgoing: OutgoingMessage) -> Self {
        Self::to(state, Some(outgoing))
    }

    /// Leaves the conversation in `state` and reports nothing.
    pub fn ignore(state: AuthState) -> Self {
        Self::to(state, None)
    }

    /// Reports `error`; `state` must be the state the attempt started from.
    pub fn rejected(state: AuthState, error: HandshakeError) -> Self {
        Self {
            state,
            outgoing: None,
            result: Err(error),
            completed: false,
        }
    }

    pub(crate) fn from_result(state_on_error: AuthState, result: Result<Transition>) -> Self {
        result.unwrap_or_else(|error| Self::rejected(state_on_error, error))
    }
}

impl AuthState {
    /// Handles a DH-Commit.
    ///
    /// `sender_instance_tag` is the tag from the framing header, when the
    /// message arrived framed.
    pub fn receive_dh_commit(
        self,
        conversation: &mut Conversation,
        message: &DhCommit,
        sender_instance_tag: Option<u32>,
    ) -> Transition {
        match self {
            AuthState::Idle => state_idle::receive_dh_commit(conversation, message, sender_instance_tag),
            AuthState::AwaitingTheirPublicValue => {
                state_awaiting_their_public_value::receive_dh_commit(
                    conversation,
                    message,
                    sender_instance_tag,
                )
            }
            AuthState::AwaitingCommitmentReveal => {
                state_awaiting_commitment_reveal::receive_dh_commit(
                    conversation,
                    message,
                    sender_instance_tag,
                )
            }
            AuthState::AwaitingSignature { reveal_signature } => {
                state_awaiting_signature::receive_dh_commit(
                    conversation,
                    message,
                    sender_instance_tag,
                    reveal_signature,
                )
            }
        }
    }

    pub fn receive_dh_key(
        self,
        conversation: &mut Conversation,
        message: &DhKey,
        sender_instance_tag: Option<u32>,
    ) -> Transition {
        match self {
            AuthState::AwaitingTheirPublicValue => {
                state_awaiting_their_public_value::receive_dh_key(
                    conversation,
                    message,
                    sender_instance_tag,
                )
            }
            AuthState::AwaitingSignature { reveal_signature } => {
                state_awaiting_signature::receive_dh_key(conversation, message, reveal_signature)
            }
            other => Transition::ignore(other),
        }
    }

    pub fn receive_reveal_signature(
        self,
        conversation: &mut Conversation,
        message: &RevealSignature,
    ) -> Transition {
        match self {
            AuthState::AwaitingCommitmentReveal => {
                state_awaiting_commitment_reveal::receive_reveal_signature(conversation, message)
            }
            other => Transition::ignore(other),
        }
    }

    pub fn receive_signature(self, conversation: &mut Conversation, message: &Signature) -> Transition {
        match self {
            AuthState::AwaitingSignature { reveal_signature } => {
                state_awaiting_signature::receive_signature(conversation, message, reveal_signature)
            }
            other => Transition::ignore(other),
        }
    }
}
