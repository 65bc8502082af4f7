use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Signed Tokens (Session Cookies)
// =============================================================================

/// Compute the hex-encoded HMAC-SHA256 of `data` under `secret`
pub fn sign_hmac(data: &str, secret: &str) -> Option<String> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return None;
        }
    };
    mac.update(data.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify HMAC-SHA256 signature
///
/// # Arguments
/// * `data` - The data that was signed
/// * `signature` - The hex-encoded HMAC signature
/// * `secret` - The shared secret key (from environment)
pub fn verify_hmac(data: &str, signature: &str, secret: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            tracing::error!("Failed to create HMAC instance");
            return false;
        }
    };

    mac.update(data.as_bytes());

    let sig_bytes = match hex::decode(signature) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!("Invalid hex signature format");
            return false;
        }
    };

    // Constant-time comparison
    mac.verify_slice(&sig_bytes).is_ok()
}

/// Encode a payload as `<base64url(payload)>.<hex hmac>`
pub fn sign_token(payload: &[u8], secret: &str) -> Option<String> {
    let encoded = URL_SAFE_NO_PAD.encode(payload);
    let signature = sign_hmac(&encoded, secret)?;
    Some(format!("{}.{}", encoded, signature))
}

/// Verify a token produced by [`sign_token`] and return its payload
pub fn verify_token(token: &str, secret: &str) -> Option<Vec<u8>> {
    let (encoded, signature) = token.rsplit_once('.')?;
    if !verify_hmac(encoded, signature, secret) {
        tracing::warn!("Session token signature mismatch");
        return None;
    }
    URL_SAFE_NO_PAD.decode(encoded).ok()
}

/// Check that an expiry timestamp (unix seconds) lies in the future
pub fn validate_expiry(expires_at: i64, now: i64) -> bool {
    if expires_at <= now {
        tracing::debug!("Token expired {} seconds ago", now - expires_at);
        return false;
    }
    true
}

/// Random hex value used as the OAuth CSRF `state`
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =============================================================================
// Response Headers
// =============================================================================

/// Build the Content-Security-Policy applied to every response
pub fn content_security_policy(connect_src: &[String]) -> String {
    let mut connect = String::from("connect-src 'self'");
    for origin in connect_src {
        connect.push(' ');
        connect.push_str(origin);
    }

    [
        "default-src 'self'".to_string(),
        connect,
        "script-src 'self' 'unsafe-inline' 'unsafe-eval' https://static.cloudflareinsights.com"
            .to_string(),
        "style-src 'self' 'unsafe-inline'".to_string(),
        "style-src-attr 'self' 'unsafe-inline'".to_string(),
        "img-src 'self' data: blob: https:".to_string(),
        "font-src 'self' data:".to_string(),
        "frame-src 'self'".to_string(),
    ]
    .join("; ")
}
