//! `articles` command: list recent records and their analysis status.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

pub async fn run_articles(pool: &SqlitePool, limit: usize) -> Result<()> {
    let rows = sqlx::query(
        r#"
        SELECT r.fingerprint, r.source, r.title, i.status
        FROM records r
        LEFT JOIN insights i ON i.fingerprint = r.fingerprint
        ORDER BY r.fetched_at DESC, r.fingerprint
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        println!("no records stored");
        return Ok(());
    }

    println!("{:<14} {:<12} {:<12} TITLE", "FINGERPRINT", "SOURCE", "STATUS");
    for row in &rows {
        let fingerprint: String = row.get("fingerprint");
        let source: String = row.get("source");
        let status: Option<String> = row.get("status");
        let title: String = row.get("title");

        println!(
            "{:<14} {:<12} {:<12} {}",
            &fingerprint[..fingerprint.len().min(12)],
            source,
            status.as_deref().unwrap_or("unanalyzed"),
            title
        );
    }

    Ok(())
}
