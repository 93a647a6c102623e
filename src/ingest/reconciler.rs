use crate::clock::Clock;
use crate::ingest::raw_record::RawRecord;
use crate::store::error::StoreError;
use crate::store::{ObservationStore, UpsertOutcome};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Counts of one reconciliation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Records in which at least one value was replaced by a default.
    pub coerced: usize,
}

impl ReconcileSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Upserts externally fetched records into a store under their natural key.
#[derive(Debug)]
pub struct Reconciler<'a, S, C> {
    store: &'a S,
    clock: &'a C,
}

impl<'a, S: ObservationStore, C: Clock> Reconciler<'a, S, C> {
    pub fn new(store: &'a S, clock: &'a C) -> Self {
        Self { store, clock }
    }

    /// Records are applied in order, so a later record for the same key wins.
    /// Malformed values never abort the batch; store failures do.
    pub async fn reconcile(&self, batch: &[RawRecord]) -> Result<ReconcileSummary, StoreError> {
        let today = self.clock.today();
        let mut summary = ReconcileSummary::default();

        for (index, record) in batch.iter().enumerate() {
            let (observation, coercions) = record.normalize(today);
            if !coercions.is_empty() {
                summary.coerced += 1;
                for coercion in &coercions {
                    warn!(
                        "Record {} ({}/{}): {}",
                        index, observation.entity, observation.location, coercion
                    );
                }
            }
            match self.store.upsert(observation).await? {
                UpsertOutcome::Inserted => summary.inserted += 1,
                UpsertOutcome::Updated => summary.updated += 1,
            }
        }

        debug!(
            "Reconciled {} records: {} inserted, {} updated, {} coerced",
            batch.len(),
            summary.inserted,
            summary.updated,
            summary.coerced
        );
        Ok(summary)
    }
}
