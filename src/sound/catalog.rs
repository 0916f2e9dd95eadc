use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::pool::SoundPool;
use crate::platform::{PlatformClient, Sound};

/// Which sounds make it into the pool.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub excluded: HashSet<String>,
    pub use_default_sounds: bool,
    pub skip_unavailable: bool,
}

impl CatalogFilter {
    /// Ids of `sounds` that are not excluded, in fetch order.
    pub fn eligible_ids(&self, sounds: &[Sound]) -> Vec<String> {
        sounds
            .iter()
            .filter(|sound| !self.excluded.contains(&sound.sound_id))
            .filter(|sound| !self.skip_unavailable || sound.available)
            .map(|sound| sound.sound_id.clone())
            .collect()
    }
}

/// Lists kept between refreshes.
#[derive(Debug, Default)]
struct CatalogCache {
    custom: Vec<String>,
    /// `None` until the first successful fetch; never refetched afterwards.
    default: Option<Vec<String>>,
}

/// Rebuilds the [`SoundPool`] from the guild's soundboard.
///
/// Refreshes may come from startup, the text command and gateway events at
/// the same time; the cache lock serializes them end to end.
pub struct SoundCatalog {
    platform: Arc<dyn PlatformClient>,
    pool: Arc<SoundPool>,
    guild_id: u64,
    filter: CatalogFilter,
    cache: Mutex<CatalogCache>,
}

impl SoundCatalog {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        pool: Arc<SoundPool>,
        guild_id: u64,
        filter: CatalogFilter,
    ) -> Self {
        Self {
            platform,
            pool,
            guild_id,
            filter,
            cache: Mutex::new(CatalogCache::default()),
        }
    }

    /// Fetches the sound lists and installs the new pool.
    ///
    /// Returns the new pool size. When the guild list cannot be fetched the
    /// pool is left as it was and the error is returned; a failed default
    /// list only drops the defaults from this refresh.
    pub async fn refresh(&self) -> Result<usize> {
        let mut cache = self.cache.lock().await;

        let custom_sounds = self
            .platform
            .guild_sounds(self.guild_id)
            .await
            .context("Error fetching custom sounds")?;
        cache.custom = self.filter.eligible_ids(&custom_sounds);
        debug!(
            "🎚️ {} custom sounds fetched, {} eligible: {}",
            custom_sounds.len(),
            cache.custom.len(),
            custom_sounds
                .iter()
                .map(|sound| sound.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut ids = cache.custom.clone();
        if self.filter.use_default_sounds {
            if cache.default.is_none() {
                match self.platform.default_sounds().await {
                    Ok(sounds) => {
                        let eligible = self.filter.eligible_ids(&sounds);
                        info!("📦 {} default sounds cached", eligible.len());
                        cache.default = Some(eligible);
                    }
                    Err(e) => warn!("⚠️ Error fetching default sounds: {}", e),
                }
            }
            if let Some(defaults) = &cache.default {
                ids.extend(defaults.iter().cloned());
            }
        }

        let ids = dedupe(ids);
        let size = ids.len();
        self.pool.replace(ids);

        info!("🔄 Sounds refreshed. Total pool size: {}", size);
        Ok(size)
    }

    #[cfg(test)]
    pub fn pool(&self) -> &Arc<SoundPool> {
        &self.pool
    }
}

fn dedupe(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ApiError, MockPlatformClient};
    use pretty_assertions::assert_eq;

    fn sounds(ids: &[&str]) -> Vec<Sound> {
        ids.iter().map(|id| Sound::new(id)).collect()
    }

    fn gateway_error() -> ApiError {
        ApiError::Status {
            endpoint: "guilds/1/soundboard-sounds".to_string(),
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        }
    }

    fn pool_set(pool: &SoundPool) -> HashSet<String> {
        pool.snapshot().iter().cloned().collect()
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn catalog(platform: MockPlatformClient, filter: CatalogFilter) -> SoundCatalog {
        SoundCatalog::new(Arc::new(platform), Arc::new(SoundPool::new()), 1, filter)
    }

    #[tokio::test]
    async fn test_excluded_sounds_are_filtered() {
        let mut platform = MockPlatformClient::new();
        platform
            .expect_guild_sounds()
            .returning(|_| Ok(sounds(&["a", "b", "c", "d"])));
        platform.expect_default_sounds().never();

        let catalog = catalog(
            platform,
            CatalogFilter {
                excluded: set(&["a", "b"]),
                ..CatalogFilter::default()
            },
        );

        assert_eq!(catalog.refresh().await.unwrap(), 2);
        assert_eq!(pool_set(catalog.pool()), set(&["c", "d"]));
    }

    #[tokio::test]
    async fn test_defaults_ignored_when_disabled() {
        let mut platform = MockPlatformClient::new();
        platform
            .expect_guild_sounds()
            .returning(|_| Ok(sounds(&["custom"])));
        platform
            .expect_default_sounds()
            .returning(|| Ok(sounds(&["default-1", "default-2"])));

        let catalog = catalog(platform, CatalogFilter::default());
        catalog.refresh().await.unwrap();

        assert_eq!(pool_set(catalog.pool()), set(&["custom"]));
    }

    #[tokio::test]
    async fn test_defaults_fetched_once_and_appended() {
        let mut platform = MockPlatformClient::new();
        platform
            .expect_guild_sounds()
            .times(2)
            .returning(|_| Ok(sounds(&["custom", "shared"])));
        platform
            .expect_default_sounds()
            .times(1)
            .returning(|| Ok(sounds(&["shared", "default", "skip-me"])));

        let catalog = catalog(
            platform,
            CatalogFilter {
                excluded: set(&["skip-me"]),
                use_default_sounds: true,
                ..CatalogFilter::default()
            },
        );

        catalog.refresh().await.unwrap();
        assert_eq!(catalog.refresh().await.unwrap(), 3);
        assert_eq!(
            catalog.pool().snapshot().to_vec(),
            vec!["custom", "shared", "default"]
        );
    }

    #[tokio::test]
    async fn test_default_failure_keeps_custom_and_retries() {
        let mut platform = MockPlatformClient::new();
        platform
            .expect_guild_sounds()
            .times(2)
            .returning(|_| Ok(sounds(&["custom"])));
        let mut default_calls = 0;
        platform.expect_default_sounds().times(2).returning(move || {
            default_calls += 1;
            if default_calls == 1 {
                Err(gateway_error())
            } else {
                Ok(sounds(&["default"]))
            }
        });

        let catalog = catalog(
            platform,
            CatalogFilter {
                use_default_sounds: true,
                ..CatalogFilter::default()
            },
        );

        assert_eq!(catalog.refresh().await.unwrap(), 1);
        assert_eq!(pool_set(catalog.pool()), set(&["custom"]));

        assert_eq!(catalog.refresh().await.unwrap(), 2);
        assert_eq!(pool_set(catalog.pool()), set(&["custom", "default"]));
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_previous_pool() {
        let mut platform = MockPlatformClient::new();
        let mut calls = 0;
        platform.expect_guild_sounds().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(sounds(&["x", "y"]))
            } else {
                Err(gateway_error())
            }
        });

        let catalog = catalog(platform, CatalogFilter::default());
        catalog.refresh().await.unwrap();
        let before = catalog.pool().snapshot();

        assert!(catalog.refresh().await.is_err());
        assert_eq!(catalog.pool().snapshot(), before);
    }

    #[tokio::test]
    async fn test_unavailable_sounds_skipped_when_configured() {
        let mut platform = MockPlatformClient::new();
        platform.expect_guild_sounds().returning(|_| {
            let mut list = sounds(&["ok", "gone"]);
            list[1].available = false;
            Ok(list)
        });

        let catalog = catalog(
            platform,
            CatalogFilter {
                skip_unavailable: true,
                ..CatalogFilter::default()
            },
        );
        catalog.refresh().await.unwrap();

        assert_eq!(pool_set(catalog.pool()), set(&["ok"]));
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let ids = vec!["b", "a", "b", "c", "a"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(dedupe(ids), vec!["b", "a", "c"]);
    }
}
