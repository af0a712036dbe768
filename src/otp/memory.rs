//! In-process Code Store for demo runs and tests.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CodeLookup, OtpRecord,
    store::{CodeStore, StoreFuture},
};

#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    records: Mutex<Vec<OtpRecord>>,
}

impl MemoryCodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record, oldest first.
    pub async fn snapshot(&self) -> Vec<OtpRecord> {
        self.records.lock().await.clone()
    }
}

// Newest `created_at` wins; insertion order breaks ties so the later row wins.
fn best_match<'r>(
    records: &'r mut [OtpRecord],
    lookup: &CodeLookup<'_>,
    now: DateTime<Utc>,
) -> Option<&'r mut OtpRecord> {
    records
        .iter_mut()
        .filter(|record| record.matches(lookup) && record.is_usable(now))
        .max_by_key(|record| record.created_at)
}

impl CodeStore for MemoryCodeStore {
    fn insert<'a>(&'a self, record: &'a OtpRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            if records.iter().any(|existing| existing.id == record.id) {
                anyhow::bail!("duplicate OTP record id {}", record.id);
            }
            records.push(record.clone());
            Ok(())
        })
    }

    fn find_usable<'a>(
        &'a self,
        lookup: CodeLookup<'a>,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<OtpRecord>> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            Ok(best_match(&mut records, &lookup, now).cloned())
        })
    }

    fn mark_used(&self, id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut records = self.records.lock().await;
            if let Some(record) = records.iter_mut().find(|record| record.id == id) {
                record.used = true;
            }
            Ok(())
        })
    }

    fn consume<'a>(
        &'a self,
        lookup: CodeLookup<'a>,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<Uuid>> {
        Box::pin(async move {
            // The lock spans the check and the write, which makes this a compare-and-swap.
            let mut records = self.records.lock().await;
            Ok(best_match(&mut records, &lookup, now).map(|record| {
                record.used = true;
                record.id
            }))
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
