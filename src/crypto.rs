//! Cryptographic building blocks of the key exchange.
//! 密钥交换的密码学构件。

pub mod commitment;
pub mod keys;
pub mod signature;

use aes::cipher::{KeyIvInit, StreamCipher};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Every AKE encryption uses a fresh key, so the counter always starts at zero.
pub(crate) const AES_CTR_IV: [u8; 16] = [0u8; 16];

/// AES-128 in counter mode. Encryption and decryption are the same operation.
pub(crate) fn aes128_ctr(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let mut cipher = Aes128Ctr::new(key.into(), iv.into());
    cipher.apply_keystream(&mut buf);
    buf
}
