use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use opendal::Operator;
use rand::RngExt;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{NoteError, NoteResult};

type HmacSha256 = Hmac<Sha256>;

pub const HMAC_PATH: &str = "auth/hmac.json";

pub trait CredentialHasher: Send + Sync {
    fn hash(&self, salt: &[u8], password: &str) -> String;

    fn verify(&self, salt: &[u8], password: &str, expected: &str) -> bool {
        self.hash(salt, password) == expected
    }
}

pub struct FakeCredentialHasher;

impl CredentialHasher for FakeCredentialHasher {
    fn hash(&self, salt: &[u8], password: &str) -> String {
        format!("mock-hash-{}-{}", hex::encode(salt), password)
    }
}

/// HMAC-SHA256 over `salt || password`, keyed by the store-wide secret.
pub struct HmacCredentialHasher {
    secret: Vec<u8>,
}

impl HmacCredentialHasher {
    pub fn new(secret: Vec<u8>) -> Self {
        Self { secret }
    }

    pub async fn from_store(op: &Operator) -> NoteResult<Self> {
        let (_key_id, secret) = load_hmac_material(op).await?;
        Ok(Self::new(secret))
    }

    fn mac(&self, salt: &[u8], password: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(salt);
        mac.update(password.as_bytes());
        mac
    }
}

impl CredentialHasher for HmacCredentialHasher {
    fn hash(&self, salt: &[u8], password: &str) -> String {
        hex::encode(self.mac(salt, password).finalize().into_bytes())
    }

    fn verify(&self, salt: &[u8], password: &str, expected: &str) -> bool {
        match hex::decode(expected) {
            Ok(expected) => self.mac(salt, password).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

pub fn new_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    salt
}

/// Storage key for an account: hex SHA-256 of the normalized email.
pub fn email_key(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Reads the store secret, creating it on first use.
pub async fn load_hmac_material(op: &Operator) -> NoteResult<(String, Vec<u8>)> {
    if !op.exists(HMAC_PATH).await? {
        let mut key_bytes = [0u8; 32];
        rand::rng().fill(&mut key_bytes);
        let payload = serde_json::json!({
            "hmac_key_id": format!("key-{}", Uuid::new_v4().simple()),
            "hmac_key": general_purpose::STANDARD.encode(key_bytes),
            "last_rotation": Utc::now().to_rfc3339(),
        });
        op.write(HMAC_PATH, serde_json::to_vec_pretty(&payload)?)
            .await?;
    }
    let bytes = op.read(HMAC_PATH).await?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes.to_vec())?;
    let key_b64 = payload
        .get("hmac_key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| NoteError::InvalidDocument(format!("hmac_key missing in {HMAC_PATH}")))?;
    let key_id = payload
        .get("hmac_key_id")
        .and_then(|v| v.as_str())
        .unwrap_or("default")
        .to_string();
    let secret = general_purpose::STANDARD
        .decode(key_b64)
        .map_err(|e| NoteError::InvalidDocument(e.to_string()))?;
    Ok((key_id, secret))
}
