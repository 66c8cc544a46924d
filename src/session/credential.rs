//! 会话密钥的生成、哈希与校验。

use std::num::NonZeroU32;

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD};
use base64::Engine as _;
use rand::{rngs::OsRng, RngCore};
use ring::pbkdf2;

use super::CredentialError;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SECRET_LEN: usize = 32;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const BEARER_PREFIX: &str = "Bearer ";

/// Identity plus plaintext secret presented on Answer/End.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub session_id: String,
    pub secret: String,
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl SessionCredential {
    pub fn new<I: Into<String>, S: Into<String>>(session_id: I, secret: S) -> Self {
        Self {
            session_id: session_id.into(),
            secret: secret.into(),
        }
    }

    /// Parses `Bearer base64(sessionId:secret)`.
    pub fn from_authorization(header: &str) -> Result<Self, CredentialError> {
        let token = header
            .trim()
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(CredentialError::Invalid)?;
        let decoded = BASE64
            .decode(token)
            .map_err(|_| CredentialError::Invalid)?;
        let decoded = String::from_utf8(decoded).map_err(|_| CredentialError::Invalid)?;
        let (session_id, secret) = decoded.split_once(':').ok_or(CredentialError::Invalid)?;
        if session_id.is_empty() || secret.is_empty() {
            return Err(CredentialError::Invalid);
        }
        Ok(Self::new(session_id, secret))
    }

    pub fn to_authorization(&self) -> String {
        let token = BASE64.encode(format!("{}:{}", self.session_id, self.secret));
        format!("{BEARER_PREFIX}{token}")
    }
}

/// Salted PBKDF2 hashing of session secrets.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    iterations: NonZeroU32,
}

impl SecretHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: NonZeroU32::new(iterations).unwrap_or(NonZeroU32::MIN),
        }
    }

    pub fn generate_secret(&self) -> Result<String, CredentialError> {
        let mut bytes = [0u8; SECRET_LEN];
        fill_random(&mut bytes)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Encodes as `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
    pub fn hash(&self, secret: &str) -> Result<String, CredentialError> {
        let mut salt = [0u8; SALT_LEN];
        fill_random(&mut salt)?;
        let mut hash = [0u8; HASH_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            self.iterations,
            &salt,
            secret.as_bytes(),
            &mut hash,
        );
        Ok(format!(
            "{HASH_SCHEME}${}${}${}",
            self.iterations,
            URL_SAFE_NO_PAD.encode(salt),
            URL_SAFE_NO_PAD.encode(hash)
        ))
    }

    /// Constant-time comparison of `secret` against a stored hash.
    pub fn verify(&self, secret: &str, stored: &str) -> bool {
        let Some(parsed) = ParsedHash::parse(stored) else {
            return false;
        };
        pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            parsed.iterations,
            &parsed.salt,
            secret.as_bytes(),
            &parsed.hash,
        )
        .is_ok()
    }
}

struct ParsedHash {
    iterations: NonZeroU32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl ParsedHash {
    fn parse(stored: &str) -> Option<Self> {
        let mut parts = stored.split('$');
        if parts.next()? != HASH_SCHEME {
            return None;
        }
        let iterations = parts.next()?.parse::<u32>().ok().and_then(NonZeroU32::new)?;
        let salt = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
        let hash = URL_SAFE_NO_PAD.decode(parts.next()?).ok()?;
        if parts.next().is_some() || hash.is_empty() {
            return None;
        }
        Some(Self {
            iterations,
            salt,
            hash,
        })
    }
}

fn fill_random(buffer: &mut [u8]) -> Result<(), CredentialError> {
    OsRng
        .try_fill_bytes(buffer)
        .map_err(|err| CredentialError::Entropy(format!("failed to gather randomness: {err}")))
}
