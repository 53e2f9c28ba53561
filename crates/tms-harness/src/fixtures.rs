//! Scoped fixture collections.
//!
//! A scenario may need reference records (devices, sites) in the platform
//! database before its trigger fires, and must leave the touched collections
//! empty afterwards. [`with_fixtures`] seeds each collection (clear, then
//! insert), runs the scenario, then clears the seeded and `clear_after`
//! collections even if the scenario panicked.

use crate::scope;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Fixture store errors
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// Store cannot be reached
    #[error("fixture store unavailable: {0}")]
    Unavailable(String),

    /// A clear or insert failed
    #[error("failed to {operation} collection {collection}: {message}")]
    Operation {
        operation: &'static str,
        collection: String,
        message: String,
    },
}

/// Database holding fixture collections.
#[async_trait]
pub trait FixtureStore: Send + Sync {
    /// Delete every record in each collection.
    async fn clear(&self, collections: &[String]) -> Result<(), FixtureError>;

    /// Insert records into a collection.
    async fn seed(&self, collection: &str, records: Vec<Value>) -> Result<(), FixtureError>;
}

/// Collections a scenario seeds and cleans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixturePlan {
    seeds: Vec<(String, Vec<Value>)>,
    clear_after: Vec<String>,
}

impl FixturePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `collection` with `records` before the scenario runs.
    pub fn seed(mut self, collection: impl Into<String>, records: Vec<Value>) -> Self {
        self.seeds.push((collection.into(), records));
        self
    }

    /// Clear `collections` after the scenario, e.g. `multicasts`, `transmissions`.
    pub fn clear_after<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clear_after.extend(collections.into_iter().map(Into::into));
        self
    }

    /// Seeded collections followed by `clear_after` ones, without duplicates.
    pub fn collections_to_clear(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in self.seeds.iter().map(|(c, _)| c).chain(self.clear_after.iter()) {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }
}

/// Seed `plan`, run `body`, and clear the plan's collections on every exit
/// path. Cleanup failures are logged; they never replace the body's result.
///
/// # Errors
///
/// Returns [`FixtureError`] if seeding fails. Collections seeded so far are
/// cleared and the body does not run.
pub async fn with_fixtures<S, Fut, T>(store: &S, plan: &FixturePlan, body: Fut) -> Result<T, FixtureError>
where
    S: FixtureStore + ?Sized,
    Fut: Future<Output = T>,
{
    let mut seeded = Vec::new();
    for (collection, records) in &plan.seeds {
        let names = [collection.clone()];
        let result = match store.clear(&names).await {
            Ok(()) => store.seed(collection, records.clone()).await,
            Err(e) => Err(e),
        };
        seeded.push(collection.clone());
        if let Err(e) = result {
            release(store, &seeded).await;
            return Err(e);
        }
        debug!(collection = %collection, records = records.len(), "seeded fixtures");
    }

    let collections = plan.collections_to_clear();
    Ok(scope::scoped(body, release(store, &collections)).await)
}

async fn release<S: FixtureStore + ?Sized>(store: &S, collections: &[String]) {
    if collections.is_empty() {
        return;
    }
    match store.clear(collections).await {
        Ok(()) => debug!(?collections, "cleared fixtures"),
        Err(e) => warn!("fixture cleanup failed: {e}"),
    }
}

/// In-process fixture store.
#[derive(Debug, Default)]
pub struct MemoryFixtureStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    log: Mutex<Vec<String>>,
    fail_seed: Mutex<Option<String>>,
}

impl MemoryFixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records currently in `collection`.
    pub fn records(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .ok()
            .and_then(|c| c.get(collection).cloned())
            .unwrap_or_default()
    }

    /// Operations performed so far, e.g. `clear devices`, `seed devices 2`.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Make seeding `collection` fail.
    pub fn fail_seed(&self, collection: impl Into<String>) {
        if let Ok(mut fail) = self.fail_seed.lock() {
            *fail = Some(collection.into());
        }
    }

    fn record(&self, entry: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }
}

#[async_trait]
impl FixtureStore for MemoryFixtureStore {
    async fn clear(&self, collections: &[String]) -> Result<(), FixtureError> {
        let mut store = self
            .collections
            .lock()
            .map_err(|e| FixtureError::Unavailable(e.to_string()))?;
        for name in collections {
            store.remove(name);
        }
        drop(store);
        self.record(format!("clear {}", collections.join(",")));
        Ok(())
    }

    async fn seed(&self, collection: &str, records: Vec<Value>) -> Result<(), FixtureError> {
        let failing = self.fail_seed.lock().ok().and_then(|f| f.clone());
        if failing.as_deref() == Some(collection) {
            return Err(FixtureError::Operation {
                operation: "seed",
                collection: collection.to_string(),
                message: "insert rejected".to_string(),
            });
        }
        let count = records.len();
        self.collections
            .lock()
            .map_err(|e| FixtureError::Unavailable(e.to_string()))?
            .entry(collection.to_string())
            .or_default()
            .extend(records);
        self.record(format!("seed {collection} {count}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device_plan() -> FixturePlan {
        FixturePlan::new()
            .seed("devices", vec![json!({"deviceId": "4"}), json!({"deviceId": "5"})])
            .clear_after(["multicasts", "transmissions", "devices"])
    }

    #[tokio::test]
    async fn test_seed_run_clear() {
        let store = MemoryFixtureStore::new();
        let seen = with_fixtures(&store, &device_plan(), async { store.records("devices").len() })
            .await
            .unwrap();

        assert_eq!(seen, 2);
        assert!(store.records("devices").is_empty());
        assert_eq!(
            store.log(),
            vec![
                "clear devices",
                "seed devices 2",
                "clear devices,multicasts,transmissions"
            ]
        );
    }

    #[tokio::test]
    async fn test_cleanup_runs_when_body_panics() {
        let store = MemoryFixtureStore::new();
        let plan = device_plan();
        let outcome = scope::guarded(with_fixtures(&store, &plan, async {
            assert!(store.records("devices").is_empty(), "scenario assertion");
        }))
        .await;

        assert!(outcome.is_err());
        assert!(store.records("devices").is_empty());
        assert_eq!(store.log().last().unwrap(), "clear devices,multicasts,transmissions");
    }

    #[tokio::test]
    async fn test_seed_failure_skips_body_and_cleans() {
        let store = MemoryFixtureStore::new();
        store.fail_seed("sites");
        let plan = FixturePlan::new()
            .seed("devices", vec![json!({"deviceId": "4"})])
            .seed("sites", vec![json!({"siteId": 2})]);

        let ran = std::sync::atomic::AtomicBool::new(false);
        let result = with_fixtures(&store, &plan, async {
            ran.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .await;

        assert!(matches!(result, Err(FixtureError::Operation { operation: "seed", .. })));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
        assert!(store.records("devices").is_empty());
        assert_eq!(store.log().last().unwrap(), "clear devices,sites");
    }
}
