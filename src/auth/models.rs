use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use sqlx::FromRow;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the credential store.
///
/// Login credentials never leave the server: the JSON projection carries
/// only `id`, `email` and `username`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub updated_at: OffsetDateTime,

    pub email: Option<String>,
    pub username: Option<String>,
    /// bcrypt digest; `None` until the account sets a password (code-only
    /// accounts stay `None` indefinitely).
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    #[serde(skip_serializing)]
    pub email_verified_at: Option<OffsetDateTime>,
    /// bcrypt digest of the active verification code, one at a time.
    #[serde(skip_serializing)]
    pub verification_code_hash: Option<String>,
    #[serde(skip_serializing)]
    pub verification_code_expires_at: Option<OffsetDateTime>,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// A single logged-in session, created after a successful credential check.
///
/// `token_hash` is the bcrypt digest of the bearer token; the plaintext is
/// handed to the client once at creation and never stored.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,

    pub user_id: Uuid,
    pub impersonated_user_id: Option<Uuid>,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// The identity this session acts as: the impersonated user when set,
    /// otherwise the owner.
    pub fn effective_user_id(&self) -> Uuid {
        self.impersonated_user_id.unwrap_or(self.user_id)
    }
}

// The JSON projection exposes the effective user id and hides the token
// hash entirely.
impl Serialize for Session {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let created_at = self
            .created_at
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        let expires_at = self
            .expires_at
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;

        let mut s = serializer.serialize_struct("Session", 4)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("created_at", &created_at)?;
        s.serialize_field("user_id", &self.effective_user_id())?;
        s.serialize_field("expires_at", &expires_at)?;
        s.end()
    }
}
