//! Ingest documents from JSONL
//!
//! The CLI here plays the source-collaborator role: one JSON object per
//! line with title, url, optional published_at (RFC 3339), and optional
//! raw_text. Documents with raw_text skip the scrape stage.

use crate::app::IngestArgs;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use intelroot_core::Database;
use serde::Deserialize;
use std::io::BufRead;
use std::path::Path;

#[derive(Deserialize)]
struct IngestRecord {
    title: String,
    url: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    raw_text: Option<String>,
}

pub async fn run(args: IngestArgs, db_path: &Path) -> Result<()> {
    let db = Database::open(db_path)?;
    db.initialize()?;

    let source_id = match &args.source {
        Some(name) => Some(db.upsert_source(name, &format!("cli://{name}"), true)?),
        None => None,
    };

    let reader: Box<dyn BufRead> = match &args.file {
        Some(path) => Box::new(std::io::BufReader::new(
            std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };

    let mut inserted = 0usize;
    let mut skipped = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: IngestRecord = serde_json::from_str(&line)
            .with_context(|| format!("parsing line {}", line_no + 1))?;

        let outcome = db.insert_document(
            source_id,
            &record.title,
            &record.url,
            record.published_at,
            record.raw_text.as_deref(),
        )?;
        if outcome.is_some() {
            inserted += 1;
        } else {
            skipped += 1;
        }
    }

    println!("Ingested {inserted} documents ({skipped} duplicates skipped)");
    Ok(())
}
