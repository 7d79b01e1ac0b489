//! Binary framing of AKE messages.
//!
//! Every message starts with a fixed header (protocol version, message type
//! and the sender/receiver instance tags) followed by a body built from
//! length-prefixed `DATA` fields and big-endian `INT`s.
//!
//! AKE 消息的二进制封装。
//!
//! 每条消息以固定头部（协议版本、消息类型以及发送方/接收方实例标签）开头，
//! 随后是由长度前缀 `DATA` 字段和大端 `INT` 组成的消息体。

use crate::error::{HandshakeError, Result};
use rand_core::CryptoRngCore;
use std::fmt;

/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: u16 = 3;

/// version (2) + type (1) + sender tag (4) + receiver tag (4)
pub const HEADER_LENGTH: usize = 11;

/// Instance tags below this value are reserved.
pub const MIN_VALID_INSTANCE_TAG: u32 = 0x100;

/// Receiver tag used before the peer's instance tag is known.
pub const UNKNOWN_INSTANCE_TAG: u32 = 0;

/// The message types that can appear in a framed header.
///
/// 可以出现在消息头中的消息类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    DhCommit = 0x02,
    Data = 0x03,
    DhKey = 0x0a,
    RevealSignature = 0x11,
    Signature = 0x12,
}

impl MessageType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = HandshakeError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x02 => Ok(MessageType::DhCommit),
            0x03 => Ok(MessageType::Data),
            0x0a => Ok(MessageType::DhKey),
            0x11 => Ok(MessageType::RevealSignature),
            0x12 => Ok(MessageType::Signature),
            other => Err(HandshakeError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::DhCommit => "DH-Commit",
            MessageType::Data => "Data",
            MessageType::DhKey => "DH-Key",
            MessageType::RevealSignature => "Reveal-Signature",
            MessageType::Signature => "Signature",
        };
        f.write_str(name)
    }
}

/// The decoded fixed header of a framed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub message_type: MessageType,
    pub sender_instance_tag: u32,
    pub receiver_instance_tag: u32,
}

/// Prepends the fixed header to `body`.
///
/// 在 `body` 前加上固定头部。
pub fn wrap(
    message_type: MessageType,
    sender_instance_tag: u32,
    receiver_instance_tag: u32,
    body: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LENGTH + body.len());
    out.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    out.push(message_type.as_byte());
    append_u32(&mut out, sender_instance_tag);
    append_u32(&mut out, receiver_instance_tag);
    out.extend_from_slice(body);
    out
}

/// Splits a framed message into its header and body.
///
/// Only the header's shape is checked here; whether the instance tags are
/// acceptable for a given conversation is decided by the conversation.
///
/// 将封装后的消息拆分为头部和消息体。
///
/// 这里只检查头部格式；实例标签对某个会话是否可接受由会话决定。
pub fn unwrap(framed: &[u8]) -> Result<(Header, &[u8])> {
    if framed.len() < HEADER_LENGTH {
        return Err(HandshakeError::MalformedMessage);
    }
    let version = u16::from_be_bytes([framed[0], framed[1]]);
    if version != PROTOCOL_VERSION {
        return Err(HandshakeError::UnsupportedVersion(version));
    }
    let message_type = MessageType::try_from(framed[2])?;
    let (offset, sender_instance_tag) = extract_u32(framed, 3)?;
    let (offset, receiver_instance_tag) = extract_u32(framed, offset)?;

    let header = Header {
        version,
        message_type,
        sender_instance_tag,
        receiver_instance_tag,
    };
    Ok((header, &framed[offset..]))
}

pub fn append_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Appends `data` as a 4-byte big-endian length followed by the bytes.
pub fn append_data(buf: &mut Vec<u8>, data: &[u8]) {
    // Field lengths are bounded by the fixed-size values the AKE carries.
    append_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

/// Reads a big-endian `u32` at `offset`, returning the offset just past it.
pub fn extract_u32(bytes: &[u8], offset: usize) -> Result<(usize, u32)> {
    let end = offset
        .checked_add(4)
        .ok_or(HandshakeError::MalformedMessage)?;
    let raw = bytes
        .get(offset..end)
        .ok_or(HandshakeError::MalformedMessage)?;
    Ok((end, u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])))
}

/// Reads the length-prefixed field starting at `offset`.
///
/// Returns the offset just past the field together with the field's bytes.
/// A missing prefix or a length running past the end of `bytes` is
/// `MalformedMessage`.
///
/// 读取从 `offset` 开始的长度前缀字段。
///
/// 返回字段之后的偏移量以及字段内容。前缀缺失或长度超出 `bytes` 末尾
/// 均视为 `MalformedMessage`。
pub fn extract_data(bytes: &[u8], offset: usize) -> Result<(usize, &[u8])> {
    let (start, length) = extract_u32(bytes, offset)?;
    let end = start
        .checked_add(length as usize)
        .ok_or(HandshakeError::MalformedMessage)?;
    let field = bytes
        .get(start..end)
        .ok_or(HandshakeError::MalformedMessage)?;
    Ok((end, field))
}

/// Reads exactly `N` raw bytes at `offset`.
pub fn extract_fixed<const N: usize>(bytes: &[u8], offset: usize) -> Result<(usize, [u8; N])> {
    let end = offset
        .checked_add(N)
        .ok_or(HandshakeError::MalformedMessage)?;
    let raw = bytes
        .get(offset..end)
        .ok_or(HandshakeError::MalformedMessage)?;
    let mut out = [0u8; N];
    out.copy_from_slice(raw);
    Ok((end, out))
}

/// Fails unless `offset` consumed the whole of `bytes`.
pub fn expect_end(bytes: &[u8], offset: usize) -> Result<()> {
    if offset == bytes.len() {
        Ok(())
    } else {
        Err(HandshakeError::MalformedMessage)
    }
}

pub fn is_valid_instance_tag(tag: u32) -> bool {
    tag >= MIN_VALID_INSTANCE_TAG
}

/// Draws random instance tags until one lands outside the reserved range.
///
/// 随机生成实例标签，直到其不在保留范围内。
pub fn generate_instance_tag(rng: &mut dyn CryptoRngCore) -> Result<u32> {
    loop {
        let mut raw = [0u8; 4];
        rng.try_fill_bytes(&mut raw)?;
        let tag = u32::from_be_bytes(raw);
        if is_valid_instance_tag(tag) {
            return Ok(tag);
        }
    }
}
