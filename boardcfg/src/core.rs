//! Core error type and catalog-wide operations shared by CLI and tests.
//! No terminal or prompt dependencies.

use serde::Serialize;
use std::path::Path;

use crate::catalog::{Catalog, CatalogSource};
use crate::migrate::{migrate, MigrationOutput, PinoutTable};
use crate::pins::{PinConflict, PinReport};
use crate::schema::{
    self, BoardRecord, FieldIssue, FinalConfig, LegacySkuCatalog, SensorBoardCatalog,
};

#[derive(Debug, thiserror::Error)]
pub enum BoardCfgError {
    #[error("{schema} failed validation:\n{}", join_issues(.issues))]
    Structural {
        schema: &'static str,
        issues: Vec<FieldIssue>,
    },
    #[error("pin conflicts in {scope}:\n{}", join_conflicts(.conflicts))]
    PinConflict {
        scope: String,
        conflicts: Vec<PinConflict>,
    },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("sensor board {sensor_board} is not compatible with board {board}")]
    Incompatible { sensor_board: String, board: String },
    #[error("cancelled")]
    Cancelled,
    #[error("Prompt error: {0}")]
    Prompt(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BoardCfgError>;

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_conflicts(conflicts: &[PinConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("  - {}", c))
        .collect::<Vec<_>>()
        .join("\n")
}

impl BoardCfgError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        BoardCfgError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BoardCfgError::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Board,
    SensorBoards,
    SkuMapping,
}

/// Validation outcome for one catalog entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryReport {
    pub kind: EntryKind,
    pub id: String,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pins: Option<PinReport>,
}

impl EntryReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub boards: usize,
    pub sensor_boards: usize,
    pub legacy_products: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogReport {
    pub entries: Vec<EntryReport>,
    pub stats: CatalogStats,
}

impl CatalogReport {
    pub fn is_valid(&self) -> bool {
        self.stats.failures == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|e| !e.is_valid())
    }
}

fn error_lines(err: &BoardCfgError) -> Vec<String> {
    match err {
        BoardCfgError::Structural { schema, issues } => issues
            .iter()
            .map(|i| format!("{}: {}", schema, i))
            .collect(),
        BoardCfgError::PinConflict { conflicts, .. } => {
            conflicts.iter().map(|c| c.to_string()).collect()
        }
        other => vec![other.to_string()],
    }
}

/// Catalog-level API used by the CLI.
pub struct BoardCfgCore;

impl BoardCfgCore {
    /// Validate every entry of a catalog, collecting failures instead of
    /// stopping at the first one. An unreadable or unparseable file is an
    /// entry failure too; only listing the board directory can fail the
    /// whole call.
    pub fn validate_catalog(source: &dyn CatalogSource) -> Result<CatalogReport> {
        let mut entries = Vec::new();
        let mut boards = 0;
        let mut sensor_boards = 0;
        let mut legacy_products = 0;

        for id in source.board_ids()? {
            boards += 1;
            let read = source
                .read_board(&id)
                .and_then(|value| value.ok_or_else(|| BoardCfgError::not_found("board file", id.clone())));
            let value = match read {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(board = %id, error = %e, "board file unreadable");
                    entries.push(EntryReport {
                        kind: EntryKind::Board,
                        id: id.clone(),
                        errors: error_lines(&e),
                        pins: None,
                    });
                    continue;
                }
            };
            let entry = match schema::parse_structure::<BoardRecord>(&value) {
                Ok(record) => {
                    let pins = record.pin_report();
                    let errors = pins.conflicts.iter().map(|c| c.to_string()).collect();
                    EntryReport {
                        kind: EntryKind::Board,
                        id: id.clone(),
                        errors,
                        pins: Some(pins),
                    }
                }
                Err(e) => EntryReport {
                    kind: EntryKind::Board,
                    id: id.clone(),
                    errors: error_lines(&e),
                    pins: None,
                },
            };
            tracing::debug!(board = %id, valid = entry.is_valid(), "validated board");
            entries.push(entry);
        }

        if let Some(read) = source.read_sensor_boards().transpose() {
            let checked = read.and_then(|value| schema::validate::<SensorBoardCatalog>(&value));
            let errors = match checked {
                Ok(catalog) => {
                    sensor_boards = catalog.sensor_boards.len();
                    Vec::new()
                }
                Err(e) => error_lines(&e),
            };
            entries.push(EntryReport {
                kind: EntryKind::SensorBoards,
                id: "sensor_boards".to_string(),
                errors,
                pins: None,
            });
        }

        if let Some(read) = source.read_sku_mapping().transpose() {
            let checked = read.and_then(|value| schema::validate::<LegacySkuCatalog>(&value));
            let errors = match checked {
                Ok(mapping) => {
                    legacy_products = mapping.products.len();
                    Vec::new()
                }
                Err(e) => error_lines(&e),
            };
            entries.push(EntryReport {
                kind: EntryKind::SkuMapping,
                id: "sku_mapping".to_string(),
                errors,
                pins: None,
            });
        }

        let failures = entries.iter().filter(|e| !e.is_valid()).count();
        Ok(CatalogReport {
            entries,
            stats: CatalogStats {
                boards,
                sensor_boards,
                legacy_products,
                failures,
            },
        })
    }

    /// Diagnostic pin report for one board: structural validation only, so
    /// conflicts are reported rather than rejected.
    pub fn pin_report(source: &dyn CatalogSource, board_id: &str) -> Result<(BoardRecord, PinReport)> {
        let value = crate::catalog::read_board_value(source, board_id)?;
        let record = schema::parse_structure::<BoardRecord>(&value)?;
        let report = record.pin_report();
        Ok((record, report))
    }

    /// Reshape the legacy SKU mapping into per-board products, using the
    /// catalog's legacy boards as the pinout table unless one is supplied.
    pub fn migrate_catalog(
        source: &dyn CatalogSource,
        pinouts: Option<PinoutTable>,
    ) -> Result<MigrationOutput> {
        let catalog = Catalog::load(source)?;
        let mapping = catalog
            .sku_mapping
            .as_ref()
            .ok_or_else(|| BoardCfgError::not_found("sku mapping", "sku_mapping.json"))?;
        let table = match pinouts {
            Some(table) => table.with_aliases(&catalog.boards),
            None => catalog.pinout_table(),
        };
        migrate(mapping, &table)
    }

    /// Re-validate a saved configuration file.
    pub fn check_config(path: &Path) -> Result<FinalConfig> {
        let text = std::fs::read_to_string(path)?;
        schema::validate_str::<FinalConfig>(&text)
    }
}
