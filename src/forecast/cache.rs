use crate::forecast::seasonal::FittedSeasonal;
use crate::series::loader::HistoricalSeries;
use crate::types::observation::SeriesField;
use chrono::NaiveDate;
use log::debug;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_MODEL_TTL: Duration = Duration::from_secs(3600);

/// Identifies the exact history a model was fitted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub entity: String,
    pub field: SeriesField,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub points: usize,
    /// Hash of the daily values, so a history revised in place is refitted.
    pub values_digest: u64,
}

impl ModelKey {
    /// `None` for empty or synthetic series, which are never cached.
    pub fn for_series(series: &HistoricalSeries) -> Option<Self> {
        if series.synthetic {
            return None;
        }
        Some(Self {
            entity: series.entity.to_lowercase(),
            field: series.field,
            first_date: series.first_date()?,
            last_date: series.last_date()?,
            points: series.len(),
            values_digest: digest(series),
        })
    }
}

fn digest(series: &HistoricalSeries) -> u64 {
    let mut hasher = DefaultHasher::new();
    for point in &series.points {
        point.date.hash(&mut hasher);
        point.value.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug)]
struct CachedModel {
    model: Arc<FittedSeasonal>,
    stored_at: Instant,
}

/// Fitted models with a time-to-live. Expired entries are evicted when looked up
/// and on every insert, so the cache holds at most the entries of one TTL window.
#[derive(Debug)]
pub struct ModelCache {
    ttl: Duration,
    entries: Mutex<HashMap<ModelKey, CachedModel>>,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_TTL)
    }
}

impl ModelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &ModelKey) -> Option<Arc<FittedSeasonal>> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            debug!("Model cache hit for {}/{}", key.entity, key.field);
            return Some(Arc::clone(&entry.model));
        }
        debug!("Model cache entry for {}/{} expired", key.entity, key.field);
        entries.remove(key);
        None
    }

    pub async fn insert(&self, key: ModelKey, model: Arc<FittedSeasonal>) {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        if entries.len() < before {
            debug!("Evicted {} expired models", before - entries.len());
        }
        entries.insert(
            key,
            CachedModel {
                model,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drops every expired entry and returns how many remain.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
