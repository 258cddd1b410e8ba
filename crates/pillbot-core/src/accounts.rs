//! Patient accounts, sessions and profile management.
//!
//! Passwords are hashed with PBKDF2; sessions are opaque random bearer
//! tokens with a configurable TTL. Login failures never reveal whether the
//! username or the password was wrong.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use pbkdf2::password_hash::rand_core::OsRng;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{Rng, RngCore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::storage::Storage;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Usernames: at least three characters, letters and digits only.
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{3,32}$").expect("username regex is valid"));

/// Patient gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Other or undisclosed.
    #[default]
    Other,
}

/// A patient account as persisted. The password hash never leaves the
/// server; API responses use [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Unique id.
    pub id: Uuid,
    /// Login name, stored lowercased.
    pub username: String,
    /// PBKDF2 password hash in PHC string format.
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Gender.
    pub gender: Gender,
    /// Free-text medical conditions.
    #[serde(default)]
    pub medical_conditions: String,
    /// Emergency contact.
    #[serde(default)]
    pub emergency_contact: String,
    /// Treating doctor.
    #[serde(default)]
    pub doctor_name: String,
    /// Doctor's phone number.
    #[serde(default)]
    pub doctor_phone: String,
    /// Dispenser the mobile app paired with during setup.
    pub connected_bot_id: Option<String>,
    /// Whether the mobile app reported a successful pairing.
    pub bluetooth_connected: bool,
    /// Whether initial setup has been completed.
    pub setup_complete: bool,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Public view of an account, safe to put on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    /// Unique id.
    pub id: Uuid,
    /// Login name.
    #[schema(example = "amina42")]
    pub username: String,
    /// Display name.
    #[schema(example = "Amina Rahman")]
    pub name: String,
    /// Age in years.
    #[schema(example = 67)]
    pub age: u32,
    /// Gender.
    pub gender: Gender,
    /// Free-text medical conditions.
    pub medical_conditions: String,
    /// Emergency contact.
    pub emergency_contact: String,
    /// Treating doctor.
    pub doctor_name: String,
    /// Doctor's phone number.
    pub doctor_phone: String,
    /// Dispenser the mobile app paired with during setup.
    pub connected_bot_id: Option<String>,
    /// Whether the mobile app reported a successful pairing.
    pub bluetooth_connected: bool,
    /// Whether initial setup has been completed.
    pub setup_complete: bool,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&UserAccount> for UserProfile {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            name: account.name.clone(),
            age: account.age,
            gender: account.gender,
            medical_conditions: account.medical_conditions.clone(),
            emergency_contact: account.emergency_contact.clone(),
            doctor_name: account.doctor_name.clone(),
            doctor_phone: account.doctor_phone.clone(),
            connected_bot_id: account.connected_bot_id.clone(),
            bluetooth_connected: account.bluetooth_connected,
            setup_complete: account.setup_complete,
            created_at: account.created_at,
        }
    }
}

/// An authenticated bearer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// Owning user.
    pub user_id: Uuid,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
    /// When the session was issued.
    pub created_at: DateTime<Utc>,
}

/// Registration payload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAccount {
    /// Desired username (letters and digits, at least 3 characters).
    #[schema(example = "amina42")]
    pub username: String,
    /// Password (at least 6 characters).
    #[schema(example = "correct horse", min_length = 6)]
    pub password: String,
    /// Display name.
    #[schema(example = "Amina Rahman")]
    pub name: String,
    /// Age in years.
    #[schema(example = 67, minimum = 1, maximum = 150)]
    pub age: u32,
    /// Gender.
    #[serde(default)]
    pub gender: Gender,
    /// Free-text medical conditions.
    #[serde(default)]
    pub medical_conditions: String,
    /// Emergency contact.
    #[serde(default)]
    pub emergency_contact: String,
    /// Treating doctor.
    #[serde(default)]
    pub doctor_name: String,
    /// Doctor's phone number.
    #[serde(default)]
    pub doctor_phone: String,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfilePatch {
    /// New display name.
    pub name: Option<String>,
    /// New age.
    pub age: Option<u32>,
    /// New gender.
    pub gender: Option<Gender>,
    /// New medical conditions.
    pub medical_conditions: Option<String>,
    /// New emergency contact.
    pub emergency_contact: Option<String>,
    /// New doctor name.
    pub doctor_name: Option<String>,
    /// New doctor phone.
    pub doctor_phone: Option<String>,
}

/// Owns accounts and sessions, persisting both write-through.
#[derive(Debug)]
pub struct AccountManager {
    storage: Storage,
    users: Vec<UserAccount>,
    sessions: Vec<Session>,
    session_ttl: Duration,
}

impl AccountManager {
    /// Load accounts and sessions from storage.
    pub fn load(storage: Storage, session_ttl_hours: u32) -> Result<Self> {
        let users = storage.load_users()?;
        let sessions = storage.load_sessions()?;
        Ok(Self {
            storage,
            users,
            sessions,
            session_ttl: Duration::hours(i64::from(session_ttl_hours)),
        })
    }

    /// Register a new account and issue its first session.
    ///
    /// # Errors
    ///
    /// [`CoreError::UsernameTaken`] when the username exists, or a
    /// validation error for malformed input.
    pub fn register(&mut self, new: NewAccount) -> Result<(UserProfile, Session)> {
        let username = new.username.trim().to_lowercase();
        if !USERNAME_RE.is_match(&username) {
            return Err(CoreError::ValidationFailed {
                field: "username",
                message: "must be 3-32 letters and digits".into(),
            });
        }
        if new.password.len() < MIN_PASSWORD_LENGTH {
            return Err(CoreError::ValidationFailed {
                field: "password",
                message: format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
            });
        }
        if new.name.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                field: "name",
                message: "name is required".into(),
            });
        }
        if new.age == 0 || new.age > 150 {
            return Err(CoreError::ValidationFailed {
                field: "age",
                message: "age must be between 1 and 150".into(),
            });
        }
        if self.users.iter().any(|u| u.username == username) {
            return Err(CoreError::UsernameTaken(username));
        }

        let account = UserAccount {
            id: Uuid::new_v4(),
            username,
            password_hash: hash_password(&new.password)?,
            name: new.name.trim().to_string(),
            age: new.age,
            gender: new.gender,
            medical_conditions: new.medical_conditions,
            emergency_contact: new.emergency_contact,
            doctor_name: new.doctor_name,
            doctor_phone: new.doctor_phone,
            connected_bot_id: None,
            bluetooth_connected: false,
            setup_complete: false,
            created_at: Utc::now(),
        };
        let profile = UserProfile::from(&account);
        self.users.push(account);
        self.persist_users()?;

        let session = self.issue_session(profile.id)?;
        Ok((profile, session))
    }

    /// Verify credentials and issue a session.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidCredentials`] for any mismatch; unknown username
    /// and wrong password are indistinguishable.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(UserProfile, Session)> {
        let username = username.trim().to_lowercase();
        let user_id = self
            .users
            .iter()
            .find(|u| u.username == username && verify_password(&u.password_hash, password))
            .map(|u| u.id)
            .ok_or(CoreError::InvalidCredentials)?;

        let profile = UserProfile::from(self.account(user_id)?);
        let session = self.issue_session(user_id)?;
        Ok((profile, session))
    }

    /// Resolve a bearer token to its user.
    ///
    /// # Errors
    ///
    /// [`CoreError::SessionExpired`] for unknown or expired tokens.
    pub fn authenticate(&self, token: &str) -> Result<&UserAccount> {
        let now = Utc::now();
        let session = self
            .sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > now)
            .ok_or(CoreError::SessionExpired)?;
        self.users
            .iter()
            .find(|u| u.id == session.user_id)
            .ok_or(CoreError::SessionExpired)
    }

    /// Get an account by id.
    pub fn account(&self, user_id: Uuid) -> Result<&UserAccount> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(CoreError::UserNotFound)
    }

    /// Whether a user with this id exists (device registration check).
    #[must_use]
    pub fn exists(&self, user_id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    /// Apply a partial profile update.
    pub fn update_profile(&mut self, user_id: Uuid, patch: ProfilePatch) -> Result<UserProfile> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(CoreError::UserNotFound)?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(CoreError::ValidationFailed {
                    field: "name",
                    message: "name cannot be empty".into(),
                });
            }
            user.name = name.trim().to_string();
        }
        if let Some(age) = patch.age {
            user.age = age;
        }
        if let Some(gender) = patch.gender {
            user.gender = gender;
        }
        if let Some(v) = patch.medical_conditions {
            user.medical_conditions = v;
        }
        if let Some(v) = patch.emergency_contact {
            user.emergency_contact = v;
        }
        if let Some(v) = patch.doctor_name {
            user.doctor_name = v;
        }
        if let Some(v) = patch.doctor_phone {
            user.doctor_phone = v;
        }

        let profile = UserProfile::from(&*user);
        self.persist_users()?;
        Ok(profile)
    }

    /// Mark setup complete after the mobile app paired with a dispenser.
    ///
    /// When the app does not pass a bot id, one is generated in the
    /// `MD-BOT-NN` form the dispenser firmware uses.
    pub fn complete_setup(&mut self, user_id: Uuid, bot_id: Option<String>) -> Result<UserProfile> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(CoreError::UserNotFound)?;

        user.setup_complete = true;
        user.bluetooth_connected = true;
        user.connected_bot_id = Some(bot_id.filter(|b| !b.trim().is_empty()).unwrap_or_else(|| {
            format!("MD-BOT-{:02}", rand::thread_rng().gen_range(0..100))
        }));

        let profile = UserProfile::from(&*user);
        self.persist_users()?;
        Ok(profile)
    }

    fn issue_session(&mut self, user_id: Uuid) -> Result<Session> {
        let now = Utc::now();
        // Opportunistically drop expired sessions before adding a new one.
        self.sessions.retain(|s| s.expires_at > now);

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let session = Session {
            token: URL_SAFE_NO_PAD.encode(bytes),
            user_id,
            expires_at: now + self.session_ttl,
            created_at: now,
        };
        self.sessions.push(session.clone());
        self.persist_sessions()?;
        Ok(session)
    }

    fn persist_users(&self) -> Result<()> {
        self.storage.save_users(&self.users)
    }

    fn persist_sessions(&self) -> Result<()> {
        self.storage.save_sessions(&self.sessions)
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CoreError::PersistenceError(format!("Password hashing failed: {e}")))
}

fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
