//! Board catalog entries (current and legacy shapes).

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::checker::Checker;
use super::legacy::{check_legacy_board, LegacyBoard};
use super::product::{check_peripherals, check_product, Button, Led, Product, Sensor};
use super::{Extra, Pin, Schema};
use crate::core::{BoardCfgError, Result};
use crate::pins::{detect_conflicts, PinReport};

/// Microcontroller module fitted to a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub chip: String,
    pub flash_size_mb: u32,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Shared I2C bus descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I2cBus {
    pub sda: Pin,
    pub scl: Pin,
    pub port: u8,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Current-shape board: shared peripherals plus the products it hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub board_type: String,
    pub board_version: String,
    pub module: Module,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub i2c: I2cBus,
    pub products: Vec<Product>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensors: Vec<Sensor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leds: Vec<Led>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Board {
    pub fn product(&self, sku: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.sku == sku)
    }

    /// Pin report over the whole board scope, without rejecting.
    pub fn pin_report(&self) -> PinReport {
        detect_conflicts(self)
    }
}

impl Schema for Board {
    const NAME: &'static str = "Board";

    fn check(checker: &mut Checker, value: &Value) {
        check_board(checker, value);
    }

    fn refine(&self) -> Result<()> {
        let report = self.pin_report();
        if report.is_valid {
            Ok(())
        } else {
            Err(BoardCfgError::PinConflict {
                scope: format!("board {}", self.board_type),
                conflicts: report.conflicts,
            })
        }
    }
}

/// A board catalog entry in either schema version.
///
/// An object with `products` is a current board, one with `pinout` a legacy
/// board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BoardRecord {
    Current(Board),
    Legacy(LegacyBoard),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoardShape {
    Current,
    Legacy,
}

fn detect_shape(obj: &Map<String, Value>) -> Option<BoardShape> {
    if obj.contains_key("products") {
        Some(BoardShape::Current)
    } else if obj.contains_key("pinout") {
        Some(BoardShape::Legacy)
    } else {
        None
    }
}

impl BoardRecord {
    pub fn board_type(&self) -> &str {
        match self {
            BoardRecord::Current(b) => &b.board_type,
            BoardRecord::Legacy(b) => &b.board_type,
        }
    }

    pub fn board_version(&self) -> &str {
        match self {
            BoardRecord::Current(b) => &b.board_version,
            BoardRecord::Legacy(b) => &b.board_version,
        }
    }

    pub fn module(&self) -> &Module {
        match self {
            BoardRecord::Current(b) => &b.module,
            BoardRecord::Legacy(b) => &b.module,
        }
    }

    pub fn aliases(&self) -> &[String] {
        match self {
            BoardRecord::Current(b) => &b.aliases,
            BoardRecord::Legacy(b) => &b.aliases,
        }
    }

    /// Board type followed by every alias.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.board_type()).chain(self.aliases().iter().map(String::as_str))
    }

    /// Whether `id` names this board, by type or alias, ignoring ASCII case.
    pub fn matches(&self, id: &str) -> bool {
        self.identifiers().any(|known| known.eq_ignore_ascii_case(id))
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, BoardRecord::Legacy(_))
    }

    pub fn pin_report(&self) -> PinReport {
        match self {
            BoardRecord::Current(b) => b.pin_report(),
            BoardRecord::Legacy(b) => b.pin_report(),
        }
    }
}

impl<'de> Deserialize<'de> for BoardRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let shape = value
            .as_object()
            .and_then(detect_shape)
            .ok_or_else(|| de::Error::custom("board has neither `products` nor `pinout`"))?;
        match shape {
            BoardShape::Current => serde_json::from_value(value).map(BoardRecord::Current),
            BoardShape::Legacy => serde_json::from_value(value).map(BoardRecord::Legacy),
        }
        .map_err(de::Error::custom)
    }
}

impl Schema for BoardRecord {
    const NAME: &'static str = "Board";

    fn check(checker: &mut Checker, value: &Value) {
        let Some(obj) = checker.object(value) else {
            return;
        };
        match detect_shape(obj) {
            Some(BoardShape::Current) => check_board(checker, value),
            Some(BoardShape::Legacy) => check_legacy_board(checker, value),
            None => checker.refine(
                "board must declare either `products` (current schema) or `pinout` (legacy schema)",
            ),
        }
    }

    fn refine(&self) -> Result<()> {
        match self {
            BoardRecord::Current(b) => b.refine(),
            BoardRecord::Legacy(b) => b.refine(),
        }
    }
}

pub(crate) fn check_module(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    c.string(obj, "chip");
    c.uint_in(obj, "flash_size_mb", 1..=u32::MAX as u64);
}

pub(crate) fn check_i2c_bus(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    c.pin(obj, "sda");
    c.pin(obj, "scl");
    c.uint_in(obj, "port", 0..=u8::MAX as u64);
}

/// Identity fields shared by both board shapes.
pub(crate) fn check_board_identity(c: &mut Checker, obj: &Map<String, Value>) {
    c.string(obj, "boardType");
    c.string(obj, "boardVersion");
    if let Some(module) = c.required(obj, "module") {
        c.at("module", |c| check_module(c, module));
    }
    c.string_list(obj, "aliases", false);
}

pub(crate) fn check_board(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    check_board_identity(c, obj);
    if let Some(i2c) = c.required(obj, "i2c") {
        c.at("i2c", |c| check_i2c_bus(c, i2c));
    }
    if let Some(products) = c.array(obj, "products") {
        c.each("products", products, check_product);
        let mut seen: Vec<&str> = Vec::new();
        c.each("products", products, |c, product| {
            if let Some(sku) = product.get("sku").and_then(Value::as_str) {
                if seen.contains(&sku) {
                    c.refine(format!("duplicate product sku '{}'", sku));
                }
                seen.push(sku);
            }
        });
    }
    check_peripherals(c, obj);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_structure, validate};
    use serde_json::json;

    fn board_value() -> Value {
        json!({
            "boardType": "ESP32-HC",
            "boardVersion": "2.1",
            "module": { "chip": "ESP32-S3", "flash_size_mb": 8 },
            "aliases": ["hc-v2"],
            "i2c": { "sda": 21, "scl": 22, "port": 0 },
            "products": [
                {
                    "sku": "HC-3",
                    "variant": "Three circuits",
                    "name": "Heater",
                    "heatingRelays": [
                        { "id": "heater_1", "pin": 18, "wattage": 1600 },
                        { "id": "heater_2", "pin": 19, "wattage": 1600 },
                        { "id": "heater_3", "pin": 23, "wattage": 1600 }
                    ],
                    "lightingRelays": []
                }
            ],
            "leds": [{ "id": "status", "pin": 2, "type": "status" }]
        })
    }

    #[test]
    fn test_current_board_parses() {
        let record: BoardRecord = validate(&board_value()).unwrap();
        assert!(!record.is_legacy());
        assert!(record.matches("HC-V2"));
        assert_eq!(record.module().flash_size_mb, 8);
        let BoardRecord::Current(board) = record else {
            panic!("expected current board");
        };
        assert!(board.product("HC-3").is_some());
    }

    #[test]
    fn test_board_without_shape_is_rejected() {
        let mut value = board_value();
        value.as_object_mut().unwrap().remove("products");
        let err = parse_structure::<BoardRecord>(&value).unwrap_err();
        assert!(err.to_string().contains("pinout"));
    }

    #[test]
    fn test_duplicate_skus_are_refinement_failures() {
        let mut value = board_value();
        let product = value["products"][0].clone();
        value["products"].as_array_mut().unwrap().push(product);
        let err = parse_structure::<Board>(&value).unwrap_err();
        assert!(err.to_string().contains("duplicate product sku 'HC-3'"));
    }

    #[test]
    fn test_shared_led_colliding_with_relay_is_rejected() {
        let mut value = board_value();
        value["leds"][0]["pin"] = json!(18);
        let err = validate::<Board>(&value).unwrap_err();
        let BoardCfgError::PinConflict { conflicts, .. } = err else {
            panic!("expected pin conflict");
        };
        assert_eq!(conflicts[0].pin, 18);
        assert_eq!(
            conflicts[0].components,
            vec!["HC-3:heating:heater_1", "shared:led:status"]
        );
    }
}
