//! Re-import an exported activity-log batch (JSONL, one entry per line).
//!
//! Inserts are conflict-safe on the entry id, so the job can be re-run
//! after a partial failure or timeout without producing duplicates.
//!
//! Run with: cargo run --bin activity_import -- export.jsonl

use sqlx::postgres::PgPoolOptions;

use access_service::models::ActivityLogEntry;
use access_service::services::activity::import_batch;

const BATCH_SIZE: usize = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: activity_import <export.jsonl>"))?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/gatehouse".to_string());

    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    println!("Connected successfully!");

    let contents = std::fs::read_to_string(&path)?;
    let mut entries = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: ActivityLogEntry = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("line {}: {}", line_no + 1, e))?;
        entries.push(entry);
    }

    println!("Parsed {} entries from {}", entries.len(), path);

    let mut total_inserted = 0;
    for (batch_no, batch) in entries.chunks(BATCH_SIZE).enumerate() {
        let inserted = import_batch(&pool, batch).await?;
        total_inserted += inserted;
        println!(
            "Batch {}: {} of {} entries were new",
            batch_no + 1,
            inserted,
            batch.len()
        );
    }

    println!(
        "Done: {} new entries, {} already present",
        total_inserted,
        entries.len() - total_inserted
    );

    Ok(())
}
