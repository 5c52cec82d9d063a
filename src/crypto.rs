//! AES-256-CBC message decryption.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};

use crate::error::{Error, Result};
use crate::summary::{MessageDecryptor, IV_LEN};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Key length for AES-256.
pub const KEY_LEN: usize = 32;

/// Decrypts PKCS#7-padded AES-256-CBC message bodies.
///
/// Messages stored without a separate IV carry it as the first 16 bytes of
/// the ciphertext.
#[derive(Clone)]
pub struct AesCbcDecryptor {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for AesCbcDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcDecryptor").finish_non_exhaustive()
    }
}

impl AesCbcDecryptor {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
            Error::Decrypt(format!("key must be {KEY_LEN} bytes, got {}", key.len()))
        })?;
        Ok(Self::new(key))
    }
}

impl MessageDecryptor for AesCbcDecryptor {
    fn decrypt(&self, ciphertext: &[u8], iv: Option<&[u8; IV_LEN]>) -> Result<String> {
        let (iv, body) = match iv {
            Some(iv) => (iv.as_slice(), ciphertext),
            None if ciphertext.len() >= IV_LEN => ciphertext.split_at(IV_LEN),
            None => {
                return Err(Error::Decrypt(format!(
                    "ciphertext of {} bytes has no room for an IV",
                    ciphertext.len()
                )))
            }
        };

        let cipher = Aes256CbcDec::new_from_slices(&self.key, iv)
            .map_err(|e| Error::Decrypt(e.to_string()))?;
        let plain = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| Error::Decrypt("invalid padding".to_string()))?;
        String::from_utf8(plain).map_err(|e| Error::Decrypt(format!("not UTF-8: {e}")))
    }
}
