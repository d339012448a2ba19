//! Startup seeding of the item collection.

use std::str::FromStr;

use super::{AlimentRepository, StoreError};
use crate::models::NewAliment;

/// Number of fixture items inserted by [`SeedMode::Reseed`].
pub const FIXTURE_COUNT: usize = 20;

/// What to do with the item collection before accepting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// Wipe the collection and insert the fixture items
    Reseed,
    /// Wipe the collection only
    Wipe,
    /// Leave the collection as loaded
    None,
}

impl SeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedMode::Reseed => "reseed",
            SeedMode::Wipe => "wipe",
            SeedMode::None => "none",
        }
    }
}

impl FromStr for SeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reseed" => Ok(SeedMode::Reseed),
            "wipe" => Ok(SeedMode::Wipe),
            "none" | "off" => Ok(SeedMode::None),
            other => Err(format!("unknown seed mode '{}'", other)),
        }
    }
}

/// The fixture items: `Aliment 0` to `Aliment 19`, identical macros.
pub fn fixture_aliments() -> Vec<NewAliment> {
    (0..FIXTURE_COUNT)
        .map(|i| NewAliment {
            name: format!("Aliment {}", i),
            calories: 100.0,
            proteins: 12.0,
            carbs: 80.3,
            fats: 6.0,
        })
        .collect()
}

/// Apply the seed mode; returns the number of fixtures inserted.
pub async fn seed_aliments(repo: &AlimentRepository, mode: SeedMode) -> Result<usize, StoreError> {
    if mode == SeedMode::None {
        return Ok(0);
    }

    let wiped = repo.clear().await?;
    tracing::info!("Removed {} aliments", wiped);

    if mode == SeedMode::Wipe {
        return Ok(0);
    }

    let mut inserted = 0;
    for fixture in fixture_aliments() {
        let aliment = repo.insert_fixture(fixture).await?;
        tracing::info!("{} added", aliment.name);
        inserted += 1;
    }
    Ok(inserted)
}
