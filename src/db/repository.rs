//! Repositories for items and users.
//!
//! Items are addressed by `name`, users by `username`. Every check-and-act
//! sequence goes through a single conditional collection call.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

use super::{Collection, Document, StoreError};
use crate::auth::{hash_password, verify_password};
use crate::models::{Aliment, AlimentChanges, NewAliment, User};

impl Document for Aliment {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl Document for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Process-wide last-modification time of the item listing.
///
/// Held in whole Unix seconds, the precision of `Last-Modified`. Every write
/// moves the marker strictly past any earlier value, so a header issued
/// before a write can never match after it. Unset until the first listing
/// or write.
#[derive(Debug)]
pub struct CacheMarker {
    secs: AtomicI64,
}

const UNSET: i64 = i64::MIN;

impl Default for CacheMarker {
    fn default() -> Self {
        Self {
            secs: AtomicI64::new(UNSET),
        }
    }
}

impl CacheMarker {
    pub fn get(&self) -> Option<DateTime<Utc>> {
        match self.secs.load(Ordering::Acquire) {
            UNSET => None,
            secs => DateTime::from_timestamp(secs, 0),
        }
    }

    /// Record a write at `at`; the marker never stays put or moves back.
    pub fn touch(&self, at: DateTime<Utc>) {
        let now = at.timestamp();
        let _ = self
            .secs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(next_mark(prev, now))
            });
    }

    /// Set the marker to `now` unless it is already set; returns the marker.
    pub fn get_or_init(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = now.timestamp();
        let current = match self
            .secs
            .compare_exchange(UNSET, secs, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => secs,
            Err(current) => current,
        };
        DateTime::from_timestamp(current, 0).unwrap_or(now)
    }
}

fn next_mark(prev: i64, now: i64) -> i64 {
    if prev == UNSET {
        now
    } else {
        now.max(prev.saturating_add(1))
    }
}

/// Food item repository.
pub struct AlimentRepository {
    collection: Collection<Aliment>,
    marker: CacheMarker,
}

impl AlimentRepository {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            collection: Collection::open(path).await?,
            marker: CacheMarker::default(),
        })
    }

    /// List all items.
    pub async fn list(&self) -> Vec<Aliment> {
        self.collection.find(|_| true).await
    }

    /// Get an item by name.
    pub async fn get(&self, name: &str) -> Option<Aliment> {
        self.collection.find_one(|a| a.name == name).await
    }

    pub async fn count(&self) -> usize {
        self.collection.count().await
    }

    /// Create a new item at version 1 and move the cache marker to its timestamp.
    ///
    /// Returns `None` when an item with the same name already exists.
    pub async fn create(&self, new: NewAliment) -> Result<Option<Aliment>, StoreError> {
        let created = self.insert_new(new).await?;
        if let Some(aliment) = &created {
            self.marker.touch(aliment.updated);
        }
        Ok(created)
    }

    /// Insert a fixture item without moving the cache marker.
    pub async fn insert_fixture(&self, new: NewAliment) -> Result<Aliment, StoreError> {
        self.collection.insert(first_version(new)).await
    }

    async fn insert_new(&self, new: NewAliment) -> Result<Option<Aliment>, StoreError> {
        let aliment = first_version(new);
        let name = aliment.name.clone();
        self.collection
            .insert_unique(aliment, |a| a.name == name)
            .await
    }

    /// Update the named item, bumping its version and timestamp.
    ///
    /// Returns `None` when no item has that name.
    pub async fn update(
        &self,
        name: &str,
        changes: &AlimentChanges,
    ) -> Result<Option<Aliment>, StoreError> {
        let now = Utc::now();
        let mut updated = None;
        let matched = self
            .collection
            .update(
                |a| a.name == name,
                |a| {
                    changes.apply(a);
                    a.version += 1;
                    a.updated = now;
                    updated = Some(a.clone());
                },
            )
            .await?;
        if matched > 0 {
            self.marker.touch(now);
        }
        Ok(updated)
    }

    /// Delete the named item. The cache marker moves whether or not anything was removed.
    pub async fn remove(&self, name: &str) -> Result<Option<Aliment>, StoreError> {
        let removed = self.collection.remove(|a| a.name == name).await?;
        self.marker.touch(Utc::now());
        Ok(removed.into_iter().next())
    }

    pub async fn clear(&self) -> Result<usize, StoreError> {
        self.collection.clear().await
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.marker.get()
    }

    /// Marker value to report with a full listing, initializing it on first use.
    pub fn mark_listed(&self) -> DateTime<Utc> {
        self.marker.get_or_init(Utc::now())
    }
}

fn first_version(new: NewAliment) -> Aliment {
    Aliment {
        name: new.name,
        calories: new.calories,
        proteins: new.proteins,
        carbs: new.carbs,
        fats: new.fats,
        version: 1,
        updated: Utc::now(),
        id: String::new(),
    }
}

/// User account repository.
pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            collection: Collection::open(path).await?,
        })
    }

    /// Create a user with a hashed password.
    ///
    /// Returns `None` when the username is taken.
    pub async fn create(&self, username: &str, password: &str) -> Result<Option<User>, StoreError> {
        let user = User {
            username: username.to_string(),
            password_hash: hash_password(password),
            id: String::new(),
        };
        self.collection
            .insert_unique(user, |u| u.username == username)
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> Option<User> {
        self.collection.find_one(|u| u.username == username).await
    }

    /// The user, when the username exists and the password matches.
    pub async fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        match self.find_by_username(username).await {
            Some(user) if verify_password(password, &user.password_hash) => Some(user),
            Some(_) => None,
            None => {
                // Unknown users cost one derivation, same as a wrong password.
                verify_password(password, "");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn apple() -> NewAliment {
        NewAliment {
            name: "Apple".into(),
            calories: 52.0,
            proteins: 0.3,
            carbs: 14.0,
            fats: 0.2,
        }
    }

    #[test]
    fn test_cache_marker_lifecycle() {
        let marker = CacheMarker::default();
        assert!(marker.get().is_none());

        let first = DateTime::from_timestamp(1, 0).unwrap();
        let later = DateTime::from_timestamp(5, 0).unwrap();

        assert_eq!(marker.get_or_init(first), first);
        assert_eq!(marker.get_or_init(later), first);

        marker.touch(later);
        assert_eq!(marker.get(), Some(later));
    }

    #[test]
    fn test_cache_marker_drops_subsecond_precision() {
        let marker = CacheMarker::default();
        let at = DateTime::from_timestamp_millis(1_700_000_000_750).unwrap();
        assert_eq!(marker.get_or_init(at).timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_cache_marker_moves_past_listing_in_same_second() {
        let marker = CacheMarker::default();
        let listed_at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let written_at = DateTime::from_timestamp_millis(1_700_000_000_012).unwrap();

        let issued = marker.get_or_init(listed_at);
        marker.touch(written_at);
        let after_write = marker.get().unwrap();
        assert!(after_write > issued);

        // A second write in the same second still moves it forward
        marker.touch(written_at);
        assert!(marker.get().unwrap() > after_write);
    }

    #[test]
    fn test_cache_marker_never_moves_back() {
        let marker = CacheMarker::default();
        marker.touch(DateTime::from_timestamp(100, 0).unwrap());
        marker.touch(DateTime::from_timestamp(50, 0).unwrap());
        assert_eq!(marker.get().unwrap().timestamp(), 101);
    }

    #[tokio::test]
    async fn test_create_sets_version_and_marker() {
        let dir = TempDir::new().unwrap();
        let repo = AlimentRepository::open(&dir.path().join("a.json"))
            .await
            .unwrap();

        let created = repo.create(apple()).await.unwrap().unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(
            repo.last_update().map(|m| m.timestamp()),
            Some(created.updated.timestamp())
        );

        assert!(repo.create(apple()).await.unwrap().is_none());
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_fixture_insert_leaves_marker_unset() {
        let dir = TempDir::new().unwrap();
        let repo = AlimentRepository::open(&dir.path().join("a.json"))
            .await
            .unwrap();

        repo.insert_fixture(apple()).await.unwrap();
        assert!(repo.last_update().is_none());
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let dir = TempDir::new().unwrap();
        let repo = AlimentRepository::open(&dir.path().join("a.json"))
            .await
            .unwrap();
        repo.create(apple()).await.unwrap();

        let changes = AlimentChanges {
            calories: Some(60.0),
            ..Default::default()
        };
        let updated = repo.update("Apple", &changes).await.unwrap().unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.calories, 60.0);
        assert_eq!(updated.fats, 0.2);

        assert!(repo.update("Pear", &changes).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_touches_marker_even_when_missing() {
        let dir = TempDir::new().unwrap();
        let repo = AlimentRepository::open(&dir.path().join("a.json"))
            .await
            .unwrap();

        assert!(repo.remove("Pear").await.unwrap().is_none());
        assert!(repo.last_update().is_some());
    }

    #[tokio::test]
    async fn test_user_authentication() {
        let dir = TempDir::new().unwrap();
        let repo = UserRepository::open(&dir.path().join("u.json"))
            .await
            .unwrap();

        let user = repo.create("alice", "pw1").await.unwrap().unwrap();
        assert_ne!(user.password_hash, "pw1");
        assert!(repo.create("alice", "other").await.unwrap().is_none());

        let found = repo.authenticate("alice", "pw1").await.unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.authenticate("alice", "pw2").await.is_none());
        assert!(repo.authenticate("bob", "pw1").await.is_none());
    }
}
