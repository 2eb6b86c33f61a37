use anyhow::Result;
use sqlx::SqlitePool;

/// Create the two pipeline tables and their indexes. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Raw candidate records, deduplicated by fingerprint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            fingerprint TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            external_id TEXT NOT NULL,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            url TEXT NOT NULL,
            published_at INTEGER NOT NULL,
            fetched_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Analysis results, one per (fingerprint, model) pair
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS insights (
            fingerprint TEXT NOT NULL,
            model TEXT NOT NULL,
            opportunities TEXT NOT NULL DEFAULT '[]',
            directions TEXT NOT NULL DEFAULT '[]',
            innovations TEXT NOT NULL DEFAULT '[]',
            generated_at INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            PRIMARY KEY (fingerprint, model),
            FOREIGN KEY (fingerprint) REFERENCES records(fingerprint)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_published_at ON records(published_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_fetched_at ON records(fetched_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_insights_status ON insights(status, generated_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
