//! 服务错误定义

use mailroom_errors::AppError;
use thiserror::Error;

/// 凭据加解密错误
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Failed to derive key: {0}")]
    KeyDerivation(String),

    #[error("Ciphertext is not valid base64")]
    MalformedCiphertext,

    #[error("Ciphertext cannot be decrypted with the key of this address")]
    Decrypt,

    #[error("Decrypted credential is not valid UTF-8")]
    Encoding,
}

impl From<VaultError> for AppError {
    fn from(error: VaultError) -> Self {
        AppError::crypto(error.to_string())
    }
}
