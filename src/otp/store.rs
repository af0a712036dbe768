//! Code Store abstraction.
//!
//! The store is the only state shared between the generator and the verifier.
//! Methods return boxed futures so the service can hold an `Arc<dyn CodeStore>`
//! and swap Postgres for the in-memory store in demos and tests.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::{future::Future, pin::Pin};
use uuid::Uuid;

use super::{CodeLookup, OtpRecord};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait CodeStore: Send + Sync {
    /// Persist one new record. Never touches existing rows.
    fn insert<'a>(&'a self, record: &'a OtpRecord) -> StoreFuture<'a, ()>;

    /// Newest unused, unexpired record matching `lookup` exactly.
    fn find_usable<'a>(
        &'a self,
        lookup: CodeLookup<'a>,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<OtpRecord>>;

    /// Unconditionally set `used = true`.
    fn mark_used(&self, id: Uuid) -> StoreFuture<'_, ()>;

    /// Atomically pick the newest usable match and flip it to used.
    ///
    /// Returns `None` when nothing matched or another caller consumed it first.
    fn consume<'a>(
        &'a self,
        lookup: CodeLookup<'a>,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<Uuid>>;

    /// Connectivity probe for health checks.
    fn ping(&self) -> StoreFuture<'_, ()>;
}
