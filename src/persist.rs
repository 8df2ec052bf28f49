//! Chip population persistence.
//!
//! The whole population is a flat text file, one `<id>=<json>` line per
//! chip, rewritten in full on every structural change. The format is not
//! transactional; the last successful write wins. Records carry the full
//! topology so startup never re-scans the world.

use crate::block_position::{BlockPosition, Direction};
use crate::scanner::{InputPin, OutputPin};
use crate::signal::Bits;
use log::warn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("chip file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything needed to rebuild one chip without touching the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChipRecord {
    pub kind: SmolStr,
    #[serde(default)]
    pub name: Option<String>,
    pub activation: BlockPosition,
    pub direction: Direction,
    #[serde(default)]
    pub args: Vec<String>,
    pub inputs: Vec<InputPin>,
    pub outputs: Vec<OutputPin>,
    #[serde(default)]
    pub interface_blocks: Vec<BlockPosition>,
    pub structure: Vec<BlockPosition>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub output_bits: Bits,
    #[serde(default)]
    pub internal: FxHashMap<String, String>,
}

/// File-backed store for the chip population.
#[derive(Debug, Clone)]
pub struct ChipStore {
    path: PathBuf,
}

impl ChipStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ChipStore { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Rewrite the whole file from the given records. A record that fails
    /// to serialize is dropped with a warning rather than aborting the
    /// save.
    pub fn save<'a, I>(&self, records: I) -> Result<(), PersistenceError>
    where
        I: IntoIterator<Item = (u32, ChipRecord)>,
    {
        let mut out = String::new();
        for (id, record) in records {
            match serde_json::to_string(&record) {
                Ok(json) => {
                    let _ = writeln!(out, "{}={}", id, json);
                }
                Err(e) => warn!("not saving chip {}: {}", id, e),
            }
        }
        fs::write(&self.path, out)?;
        Ok(())
    }

    /// Read every parseable record. Malformed lines are skipped with a
    /// warning; a missing file is an empty population.
    pub fn load(&self) -> Result<Vec<(u32, ChipRecord)>, PersistenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, json)) = line.split_once('=') else {
                warn!("skipping malformed chip entry on line {}", index + 1);
                continue;
            };
            let Ok(id) = key.trim().parse::<u32>() else {
                warn!("skipping chip entry with bad id on line {}", index + 1);
                continue;
            };
            match serde_json::from_str::<ChipRecord>(json) {
                Ok(record) => entries.push((id, record)),
                Err(e) => warn!("skipping unreadable chip entry on line {}: {}", index + 1, e),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ChipRecord {
        ChipRecord {
            kind: SmolStr::new("and"),
            name: None,
            activation: BlockPosition::new(0, 64, 0),
            direction: Direction::East,
            args: vec![],
            inputs: vec![InputPin {
                marker: BlockPosition::new(1, 64, -1),
                sources: vec![BlockPosition::new(1, 64, -2)],
            }],
            outputs: vec![OutputPin {
                marker: BlockPosition::new(3, 64, 1),
                target: BlockPosition::new(3, 64, 2),
            }],
            interface_blocks: vec![],
            structure: vec![BlockPosition::new(0, 64, 0), BlockPosition::new(1, 64, 0)],
            disabled: false,
            output_bits: Bits::new(1),
            internal: FxHashMap::default(),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir().join("redchips_store_roundtrip.txt");
        let store = ChipStore::new(&path);
        store
            .save(vec![(0, sample_record()), (7, sample_record())])
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, 0);
        assert_eq!(loaded[1].0, 7);
        assert_eq!(loaded[0].1.kind, "and");
        assert_eq!(loaded[0].1.activation, BlockPosition::new(0, 64, 0));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let path = std::env::temp_dir().join("redchips_store_corrupt.txt");
        let store = ChipStore::new(&path);
        let good = serde_json::to_string(&sample_record()).unwrap();
        std::fs::write(
            &path,
            format!("0={}\nnot a line\n2={{\"broken\": true}}\n3={}\n", good, good),
        )
        .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, 0);
        assert_eq!(loaded[1].0, 3);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_empty_population() {
        let store = ChipStore::new("/nonexistent/redchips_never_written.txt");
        assert!(store.load().unwrap().is_empty());
    }
}
