//! Login state.
//!
//! The current user is stored in `<data_dir>/config.json`. Every command
//! that touches a knowledge base reads it to find the user's namespace.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use codekb_index::Namespace;
use codekb_index::store::validate_name;
use serde::{Deserialize, Serialize};

/// Login file name within the data directory.
pub const IDENTITY_FILE: &str = "config.json";

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,

    /// Opaque token kept for the user; never checked.
    #[serde(default)]
    pub token: String,

    /// When the user logged in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_in_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Create an identity stamped with the current time.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let username = username.into().trim().to_string();
        validate_name(&username)
            .with_context(|| format!("Username {:?} cannot be used as a directory name", username))?;
        Ok(Self {
            username,
            token: token.into(),
            logged_in_at: Some(Utc::now()),
        })
    }

    /// The namespace holding this user's knowledge base.
    pub fn namespace(&self, data_dir: &Path) -> Result<Namespace> {
        Ok(Namespace::for_user(data_dir, &self.username)?)
    }
}

/// Reads and writes the login file.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(IDENTITY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current identity, or `None` when nobody is logged in.
    pub fn load(&self) -> Result<Option<Identity>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let identity: Identity = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(identity))
    }

    /// The current identity, or an error telling the user to log in.
    pub fn require(&self) -> Result<Identity> {
        match self.load()? {
            Some(identity) => Ok(identity),
            None => bail!("Not logged in. Run `codekb login` first."),
        }
    }

    pub fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(identity)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the login file. Returns whether someone was logged in.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        Ok(true)
    }
}
