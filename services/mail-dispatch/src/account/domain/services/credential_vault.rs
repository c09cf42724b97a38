//! 凭据保险库
//!
//! 密钥由账户地址派生：
//! - 口令为地址的 ASCII 小写字节倒序
//! - 盐为地址的 ASCII 大写字节
//! - PBKDF2-HMAC-SHA256，100000 次迭代，32 字节，URL-safe base64
//!
//! 密文为 Fernet token 再做一次 URL-safe base64。
//! 配置了全局密钥时，口令先经过 HMAC-SHA256(密钥, 口令)，
//! 此时旧密文无法解密，启用前需要重新加密已有账户。

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use fernet::Fernet;
use hmac::{Hmac, Mac};
use mailroom_config::VaultConfig;
use mailroom_errors::AppResult;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

use crate::error::VaultError;

const ITERATIONS: u32 = 100_000;
const KEY_LEN: usize = 32;

/// 凭据保险库
#[derive(Clone)]
pub struct CredentialVault {
    secret: Option<Secret<String>>,
}

impl CredentialVault {
    pub fn new(secret: Option<Secret<String>>) -> Self {
        Self { secret }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.secret.clone())
    }

    /// 加密账户密码
    pub fn encrypt(&self, address: &str, password: &Secret<String>) -> AppResult<String> {
        let fernet = self.fernet(address)?;
        let token = fernet.encrypt(password.expose_secret().as_bytes());
        Ok(URL_SAFE.encode(token.as_bytes()))
    }

    /// 解密账户密码，地址与加密时不同则失败
    pub fn decrypt(&self, address: &str, ciphertext: &str) -> AppResult<Secret<String>> {
        let fernet = self.fernet(address)?;

        let token = URL_SAFE
            .decode(ciphertext.trim())
            .map_err(|_| VaultError::MalformedCiphertext)?;
        let token = String::from_utf8(token).map_err(|_| VaultError::MalformedCiphertext)?;

        let plaintext = fernet.decrypt(&token).map_err(|_| VaultError::Decrypt)?;
        let password = String::from_utf8(plaintext).map_err(|_| VaultError::Encoding)?;

        Ok(Secret::new(password))
    }

    /// 由地址派生 Fernet 密钥（URL-safe base64）
    pub fn derive_key(&self, address: &str) -> AppResult<String> {
        let mut passphrase = address.as_bytes().to_ascii_lowercase();
        passphrase.reverse();
        let salt = address.as_bytes().to_ascii_uppercase();

        if let Some(secret) = &self.secret {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
                .map_err(|e| VaultError::KeyDerivation(e.to_string()))?;
            mac.update(&passphrase);
            passphrase = mac.finalize().into_bytes().to_vec();
        }

        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(&passphrase, &salt, ITERATIONS, &mut key);

        Ok(URL_SAFE.encode(key))
    }

    fn fernet(&self, address: &str) -> AppResult<Fernet> {
        let key = self.derive_key(address)?;
        Fernet::new(&key).ok_or_else(|| VaultError::KeyDerivation("invalid key length".into()).into())
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("peppered", &self.secret.is_some())
            .finish()
    }
}
