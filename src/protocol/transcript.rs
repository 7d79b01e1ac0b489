//! Computes the MAC'd transcript each peer signs to prove its identity.
//!
//! The transcript binds both ephemeral public values to the signer's
//! long-term identity key and the key id it advertises, so a signature
//! cannot be replayed into a different exchange.
//!
//! 计算每一方为证明身份而签名的带 MAC 的握手记录。
//!
//! 握手记录将双方的临时公钥与签名者的长期身份密钥及其公布的密钥 ID 绑定，
//! 使签名无法被重放到其他交换中。
use crate::crypto::keys::MAC_KEY_LENGTH;
use crate::protocol::framing::{append_data, append_u32};
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Transcript {
    mac: HmacSha256,
}

/// SHA-256 block size; HMAC zero-pads shorter keys to this length.
const HMAC_BLOCK_LENGTH: usize = 64;

impl Transcript {
    /// Creates an empty transcript keyed with `mac_key`.
    ///
    /// The key is zero-padded to a full block up front, which is what HMAC
    /// does with a short key anyway, so keying cannot fail.
    ///
    /// 创建以 `mac_key` 为密钥的空握手记录。
    ///
    /// 密钥预先补零到一个完整分组，这与 HMAC 处理短密钥的方式相同，因此不会失败。
    pub fn new(mac_key: &[u8; MAC_KEY_LENGTH]) -> Self {
        let mut block = [0u8; HMAC_BLOCK_LENGTH];
        block[..MAC_KEY_LENGTH].copy_from_slice(mac_key);
        let mac = <HmacSha256 as KeyInit>::new(Key::<HmacSha256>::from_slice(&block));
        block.zeroize();
        Self { mac }
    }

    /// Appends a length-prefixed field.
    pub fn update_data(&mut self, data: &[u8]) {
        let mut encoded = Vec::with_capacity(4 + data.len());
        append_data(&mut encoded, data);
        self.mac.update(&encoded);
    }

    pub fn update_u32(&mut self, value: u32) {
        let mut encoded = Vec::with_capacity(4);
        append_u32(&mut encoded, value);
        self.mac.update(&encoded);
    }

    /// Returns the MAC over everything appended so far.
    pub fn finalize(self) -> [u8; 32] {
        self.mac.finalize().into_bytes().into()
    }
}

/// `MAC_key(DATA own_dh || DATA peer_dh || DATA identity || INT key_id)`.
///
/// The initiator signs with `own_dh = g^x`, the responder with `own_dh = g^y`;
/// each side recomputes the other's value by swapping the two.
///
/// 发起方使用 `own_dh = g^x` 签名，响应方使用 `own_dh = g^y`；
/// 各方交换两者即可重新计算对方的值。
pub fn authenticator(
    mac_key: &[u8; MAC_KEY_LENGTH],
    own_dh: &[u8],
    peer_dh: &[u8],
    identity: &[u8],
    key_id: u32,
) -> [u8; 32] {
    let mut transcript = Transcript::new(mac_key);
    transcript.update_data(own_dh);
    transcript.update_data(peer_dh);
    transcript.update_data(identity);
    transcript.update_u32(key_id);
    transcript.finalize()
}

/// MAC over a length-prefixed blob, truncated to the 20 bytes carried on the
/// wire.
pub fn truncated_mac(mac_key: &[u8; MAC_KEY_LENGTH], data: &[u8]) -> [u8; 20] {
    let mut transcript = Transcript::new(mac_key);
    transcript.update_data(data);
    let full = transcript.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    out
}
