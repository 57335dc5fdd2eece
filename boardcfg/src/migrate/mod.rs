//! Legacy SKU mapping → per-board product model.
//!
//! Each legacy SKU lists the boards it can be built on and a wattage per
//! heating circuit. For every compatible board the builder emits one
//! [`Product`] whose relays are taken from that board's named pinout slots:
//!
//! - `heater_N` for each circuit with wattage > 0 *and* a wired pin;
//! - `lights_1` (`led_strip`) and `lights_2` (`led_ring`) only when the SKU
//!   contains `-L` *and* the slot is wired.
//!
//! Anything else is left out without an error: an unwired slot or a zero
//! wattage means "not applicable".

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::core::{BoardCfgError, Result};
use crate::pins::{detect_product_conflicts, PinReport};
use crate::schema::legacy::check_legacy_pinout;
use crate::schema::{
    self, BoardRecord, Checker, Extra, HeatingRelay, LegacyBoard, LegacyPinout, LegacyProduct,
    LegacySkuCatalog, LightingRelay, LightingType, Product,
};

/// SKU marker for lighting-enabled variants.
pub const LIGHTING_MARKER: &str = "-L";

/// Board identifier → named pin slots, resolved case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PinoutTable {
    /// Lowercased identifier → (canonical board id, pinout).
    entries: HashMap<String, (String, LegacyPinout)>,
}

impl PinoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pinout` under `board_id`; `aliases` resolve to the same
    /// canonical identifier.
    pub fn insert(&mut self, board_id: &str, aliases: &[String], pinout: LegacyPinout) {
        let canonical = board_id.to_string();
        for key in std::iter::once(board_id).chain(aliases.iter().map(String::as_str)) {
            self.entries.insert(
                key.to_ascii_lowercase(),
                (canonical.clone(), pinout.clone()),
            );
        }
    }

    pub fn from_legacy_boards<'a>(boards: impl IntoIterator<Item = &'a LegacyBoard>) -> Self {
        let mut table = Self::new();
        for board in boards {
            table.insert(&board.board_type, &board.aliases, board.pinout.clone());
        }
        table
    }

    /// Load a standalone `{"<boardId>": {pinout}, ...}` object.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut checker = Checker::new();
        let Some(obj) = checker.object(value) else {
            return Err(BoardCfgError::Structural {
                schema: "PinoutTable",
                issues: checker.into_issues(),
            });
        };
        for (board_id, pinout) in obj {
            checker.at(board_id, |c| check_legacy_pinout(c, pinout));
        }
        if !checker.is_clean() {
            return Err(BoardCfgError::Structural {
                schema: "PinoutTable",
                issues: checker.into_issues(),
            });
        }
        let mut table = Self::new();
        for (board_id, pinout) in obj {
            let pinout: LegacyPinout = serde_json::from_value(pinout.clone())?;
            table.insert(board_id, &[], pinout);
        }
        Ok(table)
    }

    /// Teach the table every alias of the catalog boards it already knows,
    /// so a mapping that names a board by alias still resolves.
    pub fn with_aliases<'a>(mut self, boards: impl IntoIterator<Item = &'a BoardRecord>) -> Self {
        for board in boards {
            let Some(known) = board
                .identifiers()
                .find_map(|id| self.entries.get(&id.to_ascii_lowercase()).cloned())
            else {
                continue;
            };
            for id in board.identifiers() {
                self.entries
                    .entry(id.to_ascii_lowercase())
                    .or_insert_with(|| known.clone());
            }
        }
        self
    }

    /// Canonical board identifier and its pinout.
    pub fn get(&self, board_id: &str) -> Option<(&str, &LegacyPinout)> {
        self.entries
            .get(&board_id.to_ascii_lowercase())
            .map(|(id, pinout)| (id.as_str(), pinout))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the new-model product for one legacy SKU on one board.
pub fn build_product(legacy: &LegacyProduct, pinout: &LegacyPinout) -> Product {
    let heating_relays = legacy
        .heating_wattage
        .circuits()
        .into_iter()
        .filter(|(_, wattage)| *wattage > 0)
        .filter_map(|(n, wattage)| {
            pinout.heater(n).map(|pin| HeatingRelay {
                id: format!("heater_{}", n),
                pin,
                wattage,
                extra: Extra::new(),
            })
        })
        .collect();

    let lighting_relays = if legacy.sku.contains(LIGHTING_MARKER) {
        [(1, LightingType::LedStrip), (2, LightingType::LedRing)]
            .into_iter()
            .filter_map(|(n, kind)| {
                pinout.lights(n).map(|pin| LightingRelay {
                    id: format!("lights_{}", n),
                    pin,
                    kind,
                    extra: Extra::new(),
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    Product {
        sku: legacy.sku.clone(),
        variant: legacy.variant.clone(),
        name: legacy.product_name.clone(),
        heating_relays,
        lighting_relays,
        sensors: Vec::new(),
        leds: Vec::new(),
        buttons: Vec::new(),
        extra: Extra::new(),
    }
}

/// One product per compatible board, in `compatibleBoards` order, paired
/// with the canonical board identifier.
pub fn build_products(legacy: &LegacyProduct, table: &PinoutTable) -> Result<Vec<(String, Product)>> {
    legacy
        .compatible_boards
        .iter()
        .map(|board_id| {
            let (canonical, pinout) = table
                .get(board_id)
                .ok_or_else(|| BoardCfgError::not_found("board pinout", board_id.clone()))?;
            let product = build_product(legacy, pinout);
            // Round-trip through the Product schema so a SKU that ends up
            // with no hardware on this board is reported, not written.
            let value = serde_json::to_value(&product)?;
            let product = schema::validate::<Product>(&value)?;
            tracing::debug!(
                sku = %product.sku,
                board = canonical,
                heating = product.heating_relays.len(),
                lighting = product.lighting_relays.len(),
                "migrated product"
            );
            Ok((canonical.to_string(), product))
        })
        .collect()
}

/// Products grouped by board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardProducts {
    pub board: String,
    pub products: Vec<Product>,
}

/// Migration result, grouped by board in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationOutput {
    pub boards: Vec<BoardProducts>,
}

impl MigrationOutput {
    fn push(&mut self, board: String, product: Product) {
        match self.boards.iter_mut().find(|b| b.board == board) {
            Some(group) => group.products.push(product),
            None => self.boards.push(BoardProducts {
                board,
                products: vec![product],
            }),
        }
    }

    pub fn products_for(&self, board: &str) -> &[Product] {
        self.boards
            .iter()
            .find(|b| b.board.eq_ignore_ascii_case(board))
            .map(|b| b.products.as_slice())
            .unwrap_or(&[])
    }

    pub fn product_count(&self) -> usize {
        self.boards.iter().map(|b| b.products.len()).sum()
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<Product>> {
        self.boards
            .iter()
            .map(|b| (b.board.clone(), b.products.clone()))
            .collect()
    }

    /// Diagnostic pin report per board. Products migrated onto one board
    /// usually share relay pins, so these are reported, never rejected.
    pub fn pin_reports(&self) -> Vec<(&str, PinReport)> {
        self.boards
            .iter()
            .map(|b| (b.board.as_str(), detect_product_conflicts(&b.products)))
            .collect()
    }
}

/// Serialized as `{"<board>": [Product, ...]}` in grouping order.
impl Serialize for MigrationOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.boards.len()))?;
        for group in &self.boards {
            map.serialize_entry(&group.board, &group.products)?;
        }
        map.end()
    }
}

/// Migrate a whole SKU mapping. Iteration follows product order, then each
/// product's compatible-board order, so the result is deterministic.
pub fn migrate(catalog: &LegacySkuCatalog, table: &PinoutTable) -> Result<MigrationOutput> {
    let mut output = MigrationOutput::default();
    for legacy in &catalog.products {
        for (board, product) in build_products(legacy, table)? {
            output.push(board, product);
        }
    }
    tracing::info!(
        boards = output.boards.len(),
        products = output.product_count(),
        "migration complete"
    );
    Ok(output)
}
