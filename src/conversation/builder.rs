use super::Conversation;
use crate::config::ConversationConfig;
use crate::crypto::signature::IdentityKeyPair;
use crate::error::{HandshakeError, Result};
use crate::event::SecurityEventHandler;
use crate::keys::KeyManagementContext;
use crate::protocol::framing::generate_instance_tag;
use crate::protocol::state::{AuthState, MessageState};
use rand_core::{CryptoRngCore, OsRng};
use tracing::debug;

/// A builder for creating a `Conversation`.
///
/// The identity key and the event handler are required; the configuration
/// and the entropy source fall back to defaults.
///
/// 用于创建 `Conversation` 的构建器。
///
/// 身份密钥和事件处理器是必需的；配置和熵源可使用默认值。
#[derive(Default)]
pub struct ConversationBuilder {
    identity: Option<IdentityKeyPair>,
    event_handler: Option<Box<dyn SecurityEventHandler>>,
    config: Option<ConversationConfig>,
    rng: Option<Box<dyn CryptoRngCore + Send>>,
}

impl ConversationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets our long-term identity key.
    ///
    /// 设置我们的长期身份密钥。
    pub fn identity(mut self, identity: IdentityKeyPair) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the handler receiving security events.
    ///
    /// 设置接收安全事件的处理器。
    pub fn event_handler(mut self, handler: impl SecurityEventHandler + 'static) -> Self {
        self.event_handler = Some(Box::new(handler));
        self
    }

    pub fn config(mut self, config: ConversationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the operating system's entropy source.
    ///
    /// 替换操作系统的熵源。
    pub fn rng(mut self, rng: impl CryptoRngCore + Send + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    /// Builds the `Conversation`.
    ///
    /// Returns an error if a required field is missing, the configuration is
    /// invalid, or no instance tag could be generated.
    ///
    /// 构建 `Conversation`。
    ///
    /// 如果缺少必需字段、配置无效或无法生成实例标签，则返回错误。
    pub fn build(self) -> Result<Conversation> {
        let identity = self
            .identity
            .ok_or(HandshakeError::BuilderMissingField("identity"))?;
        let events = self
            .event_handler
            .ok_or(HandshakeError::BuilderMissingField("event_handler"))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut rng: Box<dyn CryptoRngCore + Send> = match self.rng {
            Some(rng) => rng,
            None => Box::new(OsRng),
        };
        let our_instance_tag = match config.instance_tag {
            Some(tag) => tag,
            None => generate_instance_tag(&mut *rng)?,
        };
        debug!(instance_tag = our_instance_tag, "conversation created");

        Ok(Conversation {
            config,
            identity,
            rng,
            events,
            our_instance_tag,
            auth_state: AuthState::Idle,
            ake: None,
            keys: KeyManagementContext::new(),
            msg_state: MessageState::Plaintext,
            ssid: None,
            their_identity: None,
        })
    }
}
