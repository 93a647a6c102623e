//! External feeds of raw observations.

pub mod error;
pub mod http;

use crate::ingest::raw_record::RawRecord;
use crate::source::error::SourceError;
use std::future::Future;

pub trait ObservationSource: Send + Sync {
    /// Fetches the latest records for `region`. May fail or return nothing.
    fn fetch(
        &self,
        region: &str,
    ) -> impl Future<Output = Result<Vec<RawRecord>, SourceError>> + Send;
}

/// A source that never has data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl ObservationSource for EmptySource {
    async fn fetch(&self, _region: &str) -> Result<Vec<RawRecord>, SourceError> {
        Ok(Vec::new())
    }
}

/// Serves a fixed batch on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<RawRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

impl ObservationSource for StaticSource {
    async fn fetch(&self, _region: &str) -> Result<Vec<RawRecord>, SourceError> {
        Ok(self.records.clone())
    }
}
