//! Lookups against the account and space stores.
//!
//! Both stores live outside this process. The message router consumes them
//! through the [`UserDirectory`] and [`SpaceDirectory`] traits, whose results
//! distinguish found (`Ok(Some(_))`), not found (`Ok(None)`) and a fault
//! (`Err(_)`).

pub mod memory;

pub use memory::InMemoryDirectory;

use crate::error::DirectoryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Avatar metadata stored for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub avatar_image_url: String,
    #[serde(default)]
    pub avatar_name: Option<String>,
}

/// A space participants can join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub id: String,
    pub name: String,
    /// Map dimensions as stored, e.g. `"100x200"`
    #[serde(default)]
    pub dimensions: Option<String>,
}

/// Avatar lookup by stable account id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DirectoryError>;
}

/// Space existence check by space id.
#[async_trait]
pub trait SpaceDirectory: Send + Sync {
    async fn find_space(&self, space_id: &str) -> Result<Option<SpaceInfo>, DirectoryError>;
}
