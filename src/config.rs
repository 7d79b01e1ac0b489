use crate::error::{HandshakeError, Result};
use crate::protocol::framing::{PROTOCOL_VERSION, is_valid_instance_tag};
use serde::{Deserialize, Serialize};

/// Settings for a single conversation.
///
/// 单个会话的配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Protocol version to frame messages with. Only version 3 is supported.
    ///
    /// 用于封装消息的协议版本，仅支持版本 3。
    pub protocol_version: u16,

    /// Our instance tag. A random one is generated when absent.
    ///
    /// 我们的实例标签。若未设置则随机生成。
    pub instance_tag: Option<u32>,

    /// Whether a message parked with `queue_retransmit` is re-sent after a
    /// successful Reveal-Signature or Signature step.
    pub retransmit_after_ake: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            instance_tag: None,
            retransmit_after_ake: true,
        }
    }
}

impl ConversationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.protocol_version != PROTOCOL_VERSION {
            return Err(HandshakeError::UnsupportedVersion(self.protocol_version));
        }
        match self.instance_tag {
            Some(tag) if !is_valid_instance_tag(tag) => Err(HandshakeError::InstanceTagMismatch),
            _ => Ok(()),
        }
    }
}
