//! The authenticated key exchange of an OTR-style messaging conversation.
//!
//! Two parties that each hold a long-term identity key agree on fresh
//! Diffie-Hellman session keys in four messages (DH-Commit, DH-Key,
//! Reveal-Signature, Signature) and authenticate each other inside the
//! encrypted part of the exchange. [`Conversation`] drives the state machine
//! and hands the negotiated keys to its [`KeyManagementContext`].
//!
//! OTR 风格消息会话中的认证密钥交换。
//!
//! 双方各自持有长期身份密钥，通过四条消息（DH-Commit、DH-Key、Reveal-Signature、Signature）
//! 协商新的 Diffie-Hellman 会话密钥，并在交换的加密部分中相互认证。

pub mod config;
pub mod conversation;
pub mod crypto;
pub mod error;
pub mod event;
pub mod handshake;
pub mod keys;
pub mod protocol;

pub use config::ConversationConfig;
pub use conversation::{Conversation, ConversationBuilder};
pub use crypto::signature::{IdentityKeyPair, IdentityPublicKey};
pub use error::{HandshakeError, Result};
pub use event::{SecurityEvent, SecurityEventHandler};
pub use keys::KeyManagementContext;
pub use protocol::message::OutgoingMessage;
pub use protocol::state::{AuthState, MessageState};
