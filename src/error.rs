use thiserror::Error;

/// Errors surfaced while driving the authenticated key exchange.
///
/// None of these is fatal to a conversation: a failed step leaves the
/// conversation exactly as it was, and a later well-formed message can still
/// advance the handshake.
///
/// 驱动认证密钥交换时产生的错误。
///
/// 这些错误都不会终止会话：失败的步骤会让会话保持原样，
/// 之后格式正确的消息仍然可以推进握手。
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// A length-prefixed field was missing or truncated, or trailing bytes
    /// followed a complete message body.
    ///
    /// 长度前缀字段缺失或被截断，或者完整消息体之后还有多余字节。
    #[error("malformed message")]
    MalformedMessage,

    #[error("unknown message type 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The revealed commitment key does not decrypt to a value matching the
    /// committed hash.
    ///
    /// 揭示的承诺密钥解密出的值与承诺的哈希不匹配。
    #[error("revealed public value does not match its commitment")]
    InvalidCommitment,

    /// The MAC or the identity signature inside a reveal/signature message
    /// did not verify.
    ///
    /// 揭示/签名消息中的 MAC 或身份签名验证失败。
    #[error("signature or MAC verification failed")]
    InvalidSignature,

    #[error("peer public value is not a valid group element")]
    InvalidPublicValue,

    /// The entropy source failed while generating key material.
    ///
    /// 生成密钥材料时熵源失败。
    #[error("entropy source failed: {0}")]
    RandomnessFailure(#[from] rand_core::Error),

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u16),

    #[error("message is not addressed to this instance")]
    InstanceTagMismatch,

    #[error("operation not allowed in the current conversation state")]
    InvalidState,

    /// A required builder field was not provided.
    ///
    /// 构建器缺少必需字段。
    #[error("builder is missing the required field: {0}")]
    BuilderMissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, HandshakeError>;
