//! User model and the capability an account carries into blog operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Unique login name
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    /// Moderation rights; always set for admins
    pub is_staff: bool,
    /// Inactive accounts cannot log in
    pub is_active: bool,
    /// Media-relative path of the avatar
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unsaved user. The password must already be hashed.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            role,
            is_staff: role == UserRole::Admin,
            is_active: true,
            profile_image: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Capability derived from role and staff flag
    pub fn capability(&self) -> Capability {
        if self.is_staff || self.is_admin() {
            Capability::Staff
        } else {
            Capability::Member
        }
    }

    /// The acting identity handed to blog operations
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            capability: self.capability(),
        }
    }

    /// Change the role and keep `is_staff` in step with it
    pub fn set_role(&mut self, role: UserRole) {
        self.role = role;
        self.is_staff = role == UserRole::Admin;
    }
}

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// What an actor may do to content it does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Regular account: manages only its own blogs, cannot publish
    Member,
    /// Moderator: publishes, rejects and edits any blog
    Staff,
}

/// The identity performing a blog operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub capability: Capability,
}

impl Actor {
    pub fn member(id: i64) -> Self {
        Self {
            id,
            capability: Capability::Member,
        }
    }

    pub fn staff(id: i64) -> Self {
        Self {
            id,
            capability: Capability::Staff,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.capability == Capability::Staff
    }

    /// Author of the resource, or staff
    pub fn can_manage(&self, author_id: i64) -> bool {
        self.is_staff() || self.id == author_id
    }
}

/// Input for a profile update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
