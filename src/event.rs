//! Security events raised when a key exchange completes.

use std::fmt;

/// 密钥交换完成时触发的安全事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityEvent {
    /// The conversation became encrypted.
    Established,
    /// An already encrypted conversation finished a fresh key exchange.
    Reconfirmed,
    /// The peer authenticated with our own identity key.
    SelfMessageDetected,
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityEvent::Established => "established",
            SecurityEvent::Reconfirmed => "reconfirmed",
            SecurityEvent::SelfMessageDetected => "self-message detected",
        };
        f.write_str(name)
    }
}

/// Receives security events synchronously while a message is processed.
///
/// Any `FnMut(SecurityEvent) + Send` closure is a handler; to forward events
/// to another thread, close over an `mpsc::Sender`.
///
/// 在处理消息期间同步接收安全事件。
///
/// 任何 `FnMut(SecurityEvent) + Send` 闭包都可以作为处理器；
/// 如需将事件转发到其他线程，可以在闭包中捕获 `mpsc::Sender`。
pub trait SecurityEventHandler: Send {
    fn on_security_event(&mut self, event: SecurityEvent);
}

impl<F> SecurityEventHandler for F
where
    F: FnMut(SecurityEvent) + Send,
{
    fn on_security_event(&mut self, event: SecurityEvent) {
        self(event)
    }
}
