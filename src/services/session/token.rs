use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::store::SessionError;

/// Generate a session token id: 32 bytes of entropy as URL-safe base64.
pub fn generate_token_id() -> Result<String, SessionError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| SessionError::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// sha256(token id). Stores only ever see this digest.
pub fn hash_token_id(token_id: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token_id.as_bytes());
    hasher.finalize().to_vec()
}
