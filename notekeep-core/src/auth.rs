use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use opendal::Operator;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::info;

use crate::credential::{self, CredentialHasher, HmacCredentialHasher};
use crate::error::{NoteError, NoteResult};

pub const MIN_PASSWORD_LEN: usize = 6;
const SESSION_PATH: &str = "auth/session.json";

/// Identity provider in front of the note screens. Failures that the user
/// should see come back as `NoteError::Auth` with a readable message.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> NoteResult<()>;
    async fn sign_up(&self, email: &str, password: &str) -> NoteResult<()>;
    async fn sign_out(&self) -> NoteResult<()>;
    async fn current_user_email(&self) -> NoteResult<Option<String>>;
}

#[derive(Serialize, Deserialize, Debug)]
struct UserRecord {
    email: String,
    salt: String,
    password_hash: String,
    created_at: String,
}

#[derive(Serialize, Deserialize, Debug)]
struct SessionRecord {
    email: String,
    signed_in_at: String,
}

fn email_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
}

fn auth_error(message: &str) -> NoteError {
    NoteError::Auth(message.to_string())
}

/// Accounts kept next to the notes: `auth/users/<email-hash>.json`, with the
/// signed-in user persisted in `auth/session.json`.
pub struct OpendalAuthGateway<H: CredentialHasher = HmacCredentialHasher> {
    op: Operator,
    hasher: H,
}

impl OpendalAuthGateway<HmacCredentialHasher> {
    pub async fn open(op: Operator) -> NoteResult<Self> {
        let hasher = HmacCredentialHasher::from_store(&op).await?;
        Ok(Self { op, hasher })
    }
}

impl<H: CredentialHasher> OpendalAuthGateway<H> {
    pub fn with_hasher(op: Operator, hasher: H) -> Self {
        Self { op, hasher }
    }

    fn user_path(email: &str) -> String {
        format!("auth/users/{}.json", credential::email_key(email))
    }

    async fn read_user(&self, email: &str) -> NoteResult<Option<UserRecord>> {
        let path = Self::user_path(email);
        if !self.op.exists(&path).await? {
            return Ok(None);
        }
        let bytes = self.op.read(&path).await?;
        Ok(Some(serde_json::from_slice(&bytes.to_vec())?))
    }
}

#[async_trait]
impl<H: CredentialHasher> AuthGateway for OpendalAuthGateway<H> {
    async fn sign_in(&self, email: &str, password: &str) -> NoteResult<()> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(auth_error("Email and password must not be empty."));
        }
        let user = self
            .read_user(email)
            .await?
            .ok_or_else(|| auth_error("The email or password is incorrect."))?;
        let salt = general_purpose::STANDARD
            .decode(&user.salt)
            .map_err(|e| NoteError::InvalidDocument(e.to_string()))?;
        if !self.hasher.verify(&salt, password, &user.password_hash) {
            return Err(auth_error("The email or password is incorrect."));
        }

        let session = SessionRecord {
            email: user.email.clone(),
            signed_in_at: Utc::now().to_rfc3339(),
        };
        self.op
            .write(SESSION_PATH, serde_json::to_vec_pretty(&session)?)
            .await?;
        info!(email = %user.email, "signed in");
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> NoteResult<()> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(auth_error("Email and password must not be empty."));
        }
        if !email_shape().is_match(email) {
            return Err(auth_error("The email address is badly formatted."));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(auth_error("The password must be at least 6 characters."));
        }
        if self.read_user(email).await?.is_some() {
            return Err(auth_error(
                "The email address is already in use by another account.",
            ));
        }

        let salt = credential::new_salt();
        let record = UserRecord {
            email: email.to_string(),
            salt: general_purpose::STANDARD.encode(salt),
            password_hash: self.hasher.hash(&salt, password),
            created_at: Utc::now().to_rfc3339(),
        };
        self.op
            .write(&Self::user_path(email), serde_json::to_vec_pretty(&record)?)
            .await?;
        info!(email, "registered account");
        Ok(())
    }

    async fn sign_out(&self) -> NoteResult<()> {
        self.op.delete(SESSION_PATH).await?;
        info!("signed out");
        Ok(())
    }

    async fn current_user_email(&self) -> NoteResult<Option<String>> {
        if !self.op.exists(SESSION_PATH).await? {
            return Ok(None);
        }
        let bytes = self.op.read(SESSION_PATH).await?;
        let session: SessionRecord = serde_json::from_slice(&bytes.to_vec())?;
        Ok(Some(session.email))
    }
}
