//! Catalog loading
//!
//! A catalog directory holds one JSON file per board plus the sensor-board
//! and legacy SKU mapping catalogs:
//!
//! ```text
//! catalog/
//! ├── boards/
//! │   ├── ESP32-HC.json
//! │   └── ESP32-LEGACY.json
//! ├── sensor_boards.json     {"sensorBoards": [...]}
//! └── sku_mapping.json       {"products": [...]}   (optional)
//! ```
//!
//! Everything is read fresh for each run and treated as immutable.

pub mod fs;

pub use fs::FsCatalog;

use serde_json::Value;

use crate::core::{BoardCfgError, Result};
use crate::migrate::PinoutTable;
use crate::schema::{
    self, BoardRecord, LegacyBoard, LegacyProduct, LegacySkuCatalog, SensorBoard,
    SensorBoardCatalog,
};

/// File-reading collaborator.
pub trait CatalogSource {
    /// Identifiers of every board file (file stems), sorted.
    fn board_ids(&self) -> Result<Vec<String>>;

    /// Raw board JSON by identifier: exact file name first, then a
    /// case-insensitive match. `None` when no file matches.
    fn read_board(&self, id: &str) -> Result<Option<Value>>;

    fn read_sensor_boards(&self) -> Result<Option<Value>>;

    fn read_sku_mapping(&self) -> Result<Option<Value>>;
}

/// Raw board JSON by file name, falling back to a `boardType`/alias match
/// across every board file.
pub fn read_board_value(source: &dyn CatalogSource, id: &str) -> Result<Value> {
    if let Some(value) = source.read_board(id)? {
        return Ok(value);
    }
    for file_id in source.board_ids()? {
        let Some(value) = source.read_board(&file_id)? else {
            continue;
        };
        if board_value_matches(&value, id) {
            tracing::debug!(requested = id, file = %file_id, "board resolved by alias");
            return Ok(value);
        }
    }
    Err(BoardCfgError::not_found("board", id))
}

fn board_value_matches(value: &Value, id: &str) -> bool {
    let board_type = value.get("boardType").and_then(Value::as_str);
    let aliases = value
        .get("aliases")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    board_type
        .into_iter()
        .chain(aliases)
        .any(|known| known.eq_ignore_ascii_case(id))
}

/// Fully validated in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub boards: Vec<BoardRecord>,
    pub sensor_boards: Vec<SensorBoard>,
    pub sku_mapping: Option<LegacySkuCatalog>,
}

impl Catalog {
    /// Load and validate every entry. The first invalid entry aborts the
    /// load; use `BoardCfgCore::validate_catalog` for a full report.
    pub fn load(source: &dyn CatalogSource) -> Result<Self> {
        let mut boards = Vec::new();
        for id in source.board_ids()? {
            let value = source
                .read_board(&id)?
                .ok_or_else(|| BoardCfgError::not_found("board file", id.clone()))?;
            let record = schema::validate::<BoardRecord>(&value)?;
            tracing::debug!(board = %record.board_type(), legacy = record.is_legacy(), "loaded board");
            boards.push(record);
        }

        let sensor_boards = match source.read_sensor_boards()? {
            Some(value) => schema::validate::<SensorBoardCatalog>(&value)?.sensor_boards,
            None => Vec::new(),
        };

        let sku_mapping = match source.read_sku_mapping()? {
            Some(value) => Some(schema::validate::<LegacySkuCatalog>(&value)?),
            None => None,
        };

        let catalog = Self {
            boards,
            sensor_boards,
            sku_mapping,
        };
        catalog.warn_dangling_references();
        tracing::info!(
            boards = catalog.boards.len(),
            sensor_boards = catalog.sensor_boards.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    fn warn_dangling_references(&self) {
        for sensor_board in &self.sensor_boards {
            for id in &sensor_board.compatible_boards {
                if !self.boards.iter().any(|b| b.matches(id)) {
                    tracing::warn!(
                        sensor_board = %sensor_board.sku,
                        board = %id,
                        "sensor board references an unknown board"
                    );
                }
            }
        }
    }

    /// Board by type or alias, ignoring ASCII case. An exact `boardType`
    /// match wins over a case-insensitive or alias match.
    pub fn find_board(&self, id: &str) -> Result<&BoardRecord> {
        self.boards
            .iter()
            .find(|b| b.board_type() == id)
            .or_else(|| self.boards.iter().find(|b| b.matches(id)))
            .ok_or_else(|| BoardCfgError::not_found("board", id))
    }

    pub fn find_sensor_board(&self, sku: &str) -> Result<&SensorBoard> {
        self.sensor_boards
            .iter()
            .find(|s| s.sku == sku)
            .or_else(|| {
                self.sensor_boards
                    .iter()
                    .find(|s| s.sku.eq_ignore_ascii_case(sku))
            })
            .ok_or_else(|| BoardCfgError::not_found("sensor board", sku))
    }

    pub fn compatible_sensor_boards(&self, board: &BoardRecord) -> Vec<&SensorBoard> {
        self.sensor_boards
            .iter()
            .filter(|s| s.is_compatible_with(board.identifiers()))
            .collect()
    }

    /// Legacy SKU mapping entries that list `board` as compatible.
    pub fn legacy_products_for(&self, board: &BoardRecord) -> Vec<&LegacyProduct> {
        self.sku_mapping
            .iter()
            .flat_map(|m| m.products.iter())
            .filter(|p| p.is_compatible_with(board.identifiers()))
            .collect()
    }

    pub fn legacy_boards(&self) -> impl Iterator<Item = &LegacyBoard> {
        self.boards.iter().filter_map(|b| match b {
            BoardRecord::Legacy(legacy) => Some(legacy),
            BoardRecord::Current(_) => None,
        })
    }

    /// Pinout lookup table built from the legacy boards.
    pub fn pinout_table(&self) -> PinoutTable {
        PinoutTable::from_legacy_boards(self.legacy_boards())
    }
}
