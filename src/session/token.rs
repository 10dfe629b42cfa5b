//! Signed session cookie values
//!
//! Cookie format: `{session_id}.base64(hmac_sha256(session_id))`
//!
//! The id itself is random and carries no data; the signature only
//! stops clients from presenting ids the server never issued.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::store::{SessionId, StorageError};

type HmacSha256 = Hmac<Sha256>;

/// Create a signed cookie value for a session id
///
/// # Errors
/// Returns error if the secret is rejected as an HMAC key
pub fn sign(id: &SessionId, secret: &str) -> Result<String, StorageError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StorageError::Signing(e.to_string()))?;
    mac.update(id.as_str().as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", id.as_str(), signature_b64))
}

/// Verify a cookie value and return the session id it carries
///
/// Returns `None` if the value is malformed or the signature does not match.
pub fn verify(value: &str, secret: &str) -> Option<SessionId> {
    let (id, signature_b64) = value.split_once('.')?;
    if id.is_empty() {
        return None;
    }

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(SessionId::from(id.to_string()))
}
