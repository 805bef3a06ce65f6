//! Time-based one-time passwords (RFC 6238)
//!
//! HMAC-SHA1 TOTP with 30-second steps and 6-digit codes, plus the
//! provisioning URI and recovery-code generation used by enrollment.
//! Secrets are stored hex-encoded; the otpauth URI carries base32 as
//! authenticator apps expect.

use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

const TIME_STEP_SECS: u64 = 30;
const CODE_DIGITS: u32 = 6;
/// Accept one step of clock drift either way
const VERIFY_WINDOW: i64 = 1;
const SECRET_BYTES: usize = 20;
const RECOVERY_CODE_COUNT: usize = 8;
/// Unambiguous charset for recovery codes (no 0/O, 1/I)
const RECOVERY_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// TOTP errors
#[derive(Error, Debug)]
pub enum TotpError {
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),
}

/// Generate a fresh hex-encoded shared secret
pub fn generate_secret() -> Result<String, TotpError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; SECRET_BYTES];
    rng.fill(&mut bytes).map_err(|_| {
        TotpError::KeyGenerationFailed("Failed to generate secure random secret".to_string())
    })?;
    Ok(hex::encode(bytes))
}

fn hotp(secret: &[u8], counter: u64) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
    let tag = hmac::sign(&key, &counter.to_be_bytes());
    let digest = tag.as_ref();

    // Dynamic truncation (RFC 4226 section 5.3)
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    let code = bin % 10u32.pow(CODE_DIGITS);
    format!("{code:0width$}", width = CODE_DIGITS as usize)
}

/// Code for an explicit time step
pub fn code_at_step(secret_hex: &str, step: u64) -> Result<String, TotpError> {
    let secret = hex::decode(secret_hex).map_err(|e| TotpError::InvalidSecret(e.to_string()))?;
    Ok(hotp(&secret, step))
}

/// Current code for a secret at `now_secs` (Unix seconds)
pub fn current_code(secret_hex: &str, now_secs: u64) -> Result<String, TotpError> {
    code_at_step(secret_hex, now_secs / TIME_STEP_SECS)
}

/// Verify a submitted code against the current step and its neighbors
pub fn verify_code(secret_hex: &str, code: &str, now_secs: u64) -> Result<bool, TotpError> {
    let step = (now_secs / TIME_STEP_SECS) as i64;
    for candidate in (step - VERIFY_WINDOW)..=(step + VERIFY_WINDOW) {
        if candidate < 0 {
            continue;
        }
        if code_at_step(secret_hex, candidate as u64)? == code {
            return Ok(true);
        }
    }
    Ok(false)
}

/// otpauth:// URI for authenticator apps
pub fn provisioning_uri(
    secret_hex: &str,
    username: &str,
    issuer: &str,
) -> Result<String, TotpError> {
    let secret = hex::decode(secret_hex).map_err(|e| TotpError::InvalidSecret(e.to_string()))?;
    let encoded = base32_encode(&secret);
    Ok(format!(
        "otpauth://totp/{issuer}:{username}?secret={encoded}&issuer={issuer}&algorithm=SHA1&digits={CODE_DIGITS}&period={TIME_STEP_SECS}"
    ))
}

/// RFC 4648 base32 without padding (authenticator apps ignore padding)
fn base32_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Generate a fresh set of recovery codes ("XXXX-XXXX")
pub fn generate_recovery_codes() -> Result<Vec<String>, TotpError> {
    let rng = SystemRandom::new();
    let mut codes = Vec::with_capacity(RECOVERY_CODE_COUNT);

    for _ in 0..RECOVERY_CODE_COUNT {
        let mut bytes = [0u8; 8];
        rng.fill(&mut bytes).map_err(|_| {
            TotpError::KeyGenerationFailed("Failed to generate recovery code".to_string())
        })?;
        let code: String = bytes
            .iter()
            .map(|b| RECOVERY_CHARSET[(*b as usize) % RECOVERY_CHARSET.len()] as char)
            .collect();
        codes.push(format!("{}-{}", &code[..4], &code[4..]));
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 6238 appendix B test secret (ASCII "12345678901234567890")
    fn rfc_secret() -> String {
        hex::encode(b"12345678901234567890")
    }

    #[test]
    fn test_rfc6238_vectors() {
        // 8-digit reference values 94287082 / 89005924, truncated to 6
        assert_eq!(current_code(&rfc_secret(), 59).unwrap(), "287082");
        assert_eq!(current_code(&rfc_secret(), 1234567890).unwrap(), "005924");
    }

    #[test]
    fn test_verify_accepts_adjacent_steps() {
        let secret = rfc_secret();
        let now: u64 = 1234567890;
        let step = now / 30;

        let previous = code_at_step(&secret, step - 1).unwrap();
        let next = code_at_step(&secret, step + 1).unwrap();
        assert!(verify_code(&secret, &previous, now).unwrap());
        assert!(verify_code(&secret, &next, now).unwrap());
    }

    #[test]
    fn test_verify_rejects_distant_steps() {
        let secret = rfc_secret();
        let now: u64 = 1234567890;
        let step = now / 30;

        let stale = code_at_step(&secret, step - 2).unwrap();
        assert!(!verify_code(&secret, &stale, now).unwrap());
    }

    #[test]
    fn test_base32_encode() {
        // RFC 4648 test vectors, unpadded
        assert_eq!(base32_encode(b""), "");
        assert_eq!(base32_encode(b"f"), "MY");
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn test_provisioning_uri_shape() {
        let secret = rfc_secret();
        let uri = provisioning_uri(&secret, "alice", "market-server").unwrap();
        assert!(uri.starts_with("otpauth://totp/market-server:alice?secret="));
        assert!(uri.contains("&issuer=market-server"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }

    #[test]
    fn test_generate_secret_is_hex() {
        let secret = generate_secret().unwrap();
        assert_eq!(secret.len(), SECRET_BYTES * 2);
        assert!(hex::decode(&secret).is_ok());
    }

    #[test]
    fn test_recovery_code_format() {
        let codes = generate_recovery_codes().unwrap();
        assert_eq!(codes.len(), RECOVERY_CODE_COUNT);
        for code in &codes {
            assert_eq!(code.len(), 9);
            assert_eq!(code.as_bytes()[4], b'-');
            assert!(
                code.bytes()
                    .filter(|b| *b != b'-')
                    .all(|b| RECOVERY_CHARSET.contains(&b))
            );
        }
    }
}
