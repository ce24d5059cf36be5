//! In-process directory used when no external store is wired in.

use super::{SpaceDirectory, SpaceInfo, UserDirectory, UserProfile};
use crate::error::DirectoryError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Directory holding spaces and profiles in concurrent maps.
///
/// Seeded from configuration at startup and safe to update while the server
/// is running.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    spaces: DashMap<String, SpaceInfo>,
    profiles: DashMap<String, UserProfile>,
    /// Avatar handed to accounts without a stored profile, if any
    fallback_avatar: Option<String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from seed data.
    pub fn seeded(
        spaces: impl IntoIterator<Item = SpaceInfo>,
        profiles: impl IntoIterator<Item = UserProfile>,
    ) -> Self {
        let directory = Self::new();
        for space in spaces {
            directory.insert_space(space);
        }
        for profile in profiles {
            directory.insert_profile(profile);
        }
        directory
    }

    /// Answers profile lookups for unknown accounts with `avatar_image_url`
    /// instead of "not found". Meant for local runs and load simulation.
    pub fn with_fallback_avatar(mut self, avatar_image_url: impl Into<String>) -> Self {
        self.fallback_avatar = Some(avatar_image_url.into());
        self
    }

    pub fn insert_space(&self, space: SpaceInfo) {
        self.spaces.insert(space.id.clone(), space);
    }

    pub fn insert_profile(&self, profile: UserProfile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn space_count(&self) -> usize {
        self.spaces.len()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DirectoryError> {
        if let Some(profile) = self.profiles.get(user_id) {
            return Ok(Some(profile.value().clone()));
        }
        Ok(self.fallback_avatar.as_ref().map(|avatar| UserProfile {
            user_id: user_id.to_string(),
            avatar_image_url: avatar.clone(),
            avatar_name: None,
        }))
    }
}

#[async_trait]
impl SpaceDirectory for InMemoryDirectory {
    async fn find_space(&self, space_id: &str) -> Result<Option<SpaceInfo>, DirectoryError> {
        Ok(self.spaces.get(space_id).map(|entry| entry.value().clone()))
    }
}
