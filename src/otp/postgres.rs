//! `PostgreSQL` Code Store backed by the `otp_codes` table (see `sql/schema.sql`).

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{
    CodeLookup, OtpRecord, Purpose,
    store::{CodeStore, StoreFuture},
};

const INSERT_QUERY: &str = r"
    INSERT INTO otp_codes (id, email, code, purpose, expires_at, used, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
";

const FIND_USABLE_QUERY: &str = r"
    SELECT id, email, code, purpose, expires_at, used, created_at
    FROM otp_codes
    WHERE email = $1
      AND code = $2
      AND purpose = $3
      AND used = FALSE
      AND expires_at > $4
    ORDER BY created_at DESC
    LIMIT 1
";

const MARK_USED_QUERY: &str = "UPDATE otp_codes SET used = TRUE WHERE id = $1";

// Row lock plus the `used = FALSE` re-check make the flip a single compare-and-swap.
const CONSUME_QUERY: &str = r"
    UPDATE otp_codes
    SET used = TRUE
    WHERE id = (
        SELECT id
        FROM otp_codes
        WHERE email = $1
          AND code = $2
          AND purpose = $3
          AND used = FALSE
          AND expires_at > $4
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
    )
      AND used = FALSE
    RETURNING id
";

#[derive(Clone, Debug)]
pub struct PgCodeStore {
    pool: PgPool,
}

impl PgCodeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn record_from_row(row: &PgRow) -> Result<OtpRecord> {
    let purpose: String = row.try_get("purpose")?;
    let purpose = purpose.parse::<Purpose>().map_err(|err| anyhow!(err))?;

    Ok(OtpRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        code: row.try_get("code")?,
        purpose,
        expires_at: row.try_get("expires_at")?,
        used: row.try_get("used")?,
        created_at: row.try_get("created_at")?,
    })
}

impl CodeStore for PgCodeStore {
    fn insert<'a>(&'a self, record: &'a OtpRecord) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = INSERT_QUERY
            );
            sqlx::query(INSERT_QUERY)
                .bind(record.id)
                .bind(&record.email)
                .bind(&record.code)
                .bind(record.purpose.as_str())
                .bind(record.expires_at)
                .bind(record.used)
                .bind(record.created_at)
                .execute(&self.pool)
                .instrument(span)
                .await
                .context("failed to insert OTP code")?;
            Ok(())
        })
    }

    fn find_usable<'a>(
        &'a self,
        lookup: CodeLookup<'a>,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<OtpRecord>> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = FIND_USABLE_QUERY
            );
            let row = sqlx::query(FIND_USABLE_QUERY)
                .bind(lookup.email)
                .bind(lookup.code)
                .bind(lookup.purpose.as_str())
                .bind(now)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to look up OTP code")?;

            row.as_ref()
                .map(record_from_row)
                .transpose()
                .context("failed to decode OTP code row")
        })
    }

    fn mark_used(&self, id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = MARK_USED_QUERY
            );
            sqlx::query(MARK_USED_QUERY)
                .bind(id)
                .execute(&self.pool)
                .instrument(span)
                .await
                .context("failed to mark OTP code used")?;
            Ok(())
        })
    }

    fn consume<'a>(
        &'a self,
        lookup: CodeLookup<'a>,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Option<Uuid>> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = CONSUME_QUERY
            );
            let row = sqlx::query(CONSUME_QUERY)
                .bind(lookup.email)
                .bind(lookup.code)
                .bind(lookup.purpose.as_str())
                .bind(now)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to consume OTP code")?;

            row.map(|row| row.try_get::<Uuid, _>("id"))
                .transpose()
                .context("failed to decode consumed OTP id")
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = "SELECT 1"
            );
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .instrument(span)
                .await
                .context("database ping failed")?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn canonical(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn consume_rechecks_used_flag_under_row_lock() {
        let sql = canonical(CONSUME_QUERY);
        assert!(sql.contains("FOR UPDATE SKIP LOCKED"));
        assert!(sql.ends_with("AND used = FALSE RETURNING id"));
    }

    #[test]
    fn lookups_order_newest_first() {
        for query in [FIND_USABLE_QUERY, CONSUME_QUERY] {
            let sql = canonical(query);
            assert!(sql.contains("ORDER BY created_at DESC LIMIT 1"));
            assert!(sql.contains("AND expires_at > $4"));
        }
    }

    #[tokio::test]
    async fn unreachable_database_surfaces_error() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://postgres@127.0.0.1:1/postgres")?;
        let store = PgCodeStore::new(pool);
        assert!(store.ping().await.is_err());
        Ok(())
    }
}
