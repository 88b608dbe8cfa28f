//! Corpus statistics

use crate::app::Format;
use anyhow::Result;
use intelroot_core::Database;
use std::path::Path;

pub async fn run(db_path: &Path, format: Format) -> Result<()> {
    let db = Database::open(db_path)?;
    db.initialize()?;
    let stats = db.stats()?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        Format::Text => {
            println!("Documents:         {}", stats.documents);
            println!("Sources:           {}", stats.sources);
            println!("Artifacts:         {}", stats.artifacts);
            println!("Failed artifacts:  {}", stats.failed_artifacts);
            println!("Embeddings:        {}", stats.embeddings);
            println!("Pending scrape:    {}", stats.pending_scrape);
            println!("Pending summarize: {}", stats.pending_summarize);
            println!("Pending embed:     {}", stats.pending_embed);
        }
    }
    Ok(())
}
