use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use puzzlepress_db::{Database, DbError};
use puzzlepress_types::models::{NewItem, NewPuzzle};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub puzzles: Vec<NewPuzzle>,
    #[serde(default)]
    pub items: Vec<NewItem>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

pub fn load(db: &Database, path: &Path) -> Result<SeedReport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let seed: SeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("invalid seed file {}", path.display()))?;

    let report = apply(db, &seed)?;
    info!(
        created = report.created,
        skipped = report.skipped,
        "Seeded from {}",
        path.display()
    );
    Ok(report)
}

/// Insert everything in `seed`. Rows that already exist are skipped, so the
/// same file can be applied on every start.
pub fn apply(db: &Database, seed: &SeedFile) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for puzzle in &seed.puzzles {
        match db.create_puzzle(puzzle) {
            Ok(_) => report.created += 1,
            Err(err @ DbError::Conflict(_)) => {
                warn!(puzzle = %puzzle.id, "Skipping seed puzzle: {}", err);
                report.skipped += 1;
            }
            Err(err) => return Err(err).with_context(|| format!("failed to seed puzzle {}", puzzle.id)),
        }
    }

    for item in &seed.items {
        match db.create_item(item) {
            Ok(_) => report.created += 1,
            Err(err @ DbError::Conflict(_)) => {
                warn!(model = %item.model, name = %item.name, "Skipping seed item: {}", err);
                report.skipped += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to seed item {} {}", item.model, item.name));
            }
        }
    }

    Ok(report)
}
