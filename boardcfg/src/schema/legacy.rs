//! Legacy (flat capabilities + pinout) records and the SKU mapping catalog.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::board::check_board_identity;
use super::checker::Checker;
use super::sensor_board::{check_flags, SensorFlags};
use super::{Extra, Module, Pin, Schema};
use crate::core::{BoardCfgError, Result};
use crate::pins::{detect_legacy_conflicts, PinReport};

/// Flat capability record of a legacy board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_circuits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting_circuits: Option<u8>,
    #[serde(default)]
    pub has_mlx90614: bool,
    #[serde(default)]
    pub has_bme688: bool,
    #[serde(default)]
    pub has_sht41: bool,
    #[serde(default)]
    pub has_ld2410_uart: bool,
    #[serde(default)]
    pub has_ld2410_binary: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LegacyCapabilities {
    pub fn sensor_flags(&self) -> SensorFlags {
        SensorFlags {
            has_mlx90614: self.has_mlx90614,
            has_bme688: self.has_bme688,
            has_sht41: self.has_sht41,
            has_ld2410_uart: self.has_ld2410_uart,
            has_ld2410_binary: self.has_ld2410_binary,
        }
    }

    /// A copy with the five sensor flags replaced by `flags`.
    pub fn with_sensor_flags(&self, flags: SensorFlags) -> Self {
        Self {
            has_mlx90614: flags.has_mlx90614,
            has_bme688: flags.has_bme688,
            has_sht41: flags.has_sht41,
            has_ld2410_uart: flags.has_ld2410_uart,
            has_ld2410_binary: flags.has_ld2410_binary,
            ..self.clone()
        }
    }
}

/// Named pin slots of a legacy board. `None` (`null` in JSON) means the
/// slot is not wired on that board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyPinout {
    #[serde(default)]
    pub heater_1: Option<Pin>,
    #[serde(default)]
    pub heater_2: Option<Pin>,
    #[serde(default)]
    pub heater_3: Option<Pin>,
    #[serde(default)]
    pub lights_1: Option<Pin>,
    #[serde(default)]
    pub lights_2: Option<Pin>,
    #[serde(default)]
    pub i2c_sda: Option<Pin>,
    #[serde(default)]
    pub i2c_scl: Option<Pin>,
    #[serde(default)]
    pub ld2410_tx: Option<Pin>,
    #[serde(default)]
    pub ld2410_rx: Option<Pin>,
    #[serde(default)]
    pub ld2410_out: Option<Pin>,
    #[serde(default)]
    pub lm35: Option<Pin>,
    #[serde(default)]
    pub status_led: Option<Pin>,
    #[serde(default)]
    pub pairing_button: Option<Pin>,
    #[serde(default)]
    pub reset_button: Option<Pin>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LegacyPinout {
    pub const SLOTS: [&'static str; 14] = [
        "heater_1",
        "heater_2",
        "heater_3",
        "lights_1",
        "lights_2",
        "i2c_sda",
        "i2c_scl",
        "ld2410_tx",
        "ld2410_rx",
        "ld2410_out",
        "lm35",
        "status_led",
        "pairing_button",
        "reset_button",
    ];

    /// Every named slot with its (possibly unwired) pin, in declaration order.
    pub fn slots(&self) -> [(&'static str, Option<Pin>); 14] {
        [
            ("heater_1", self.heater_1),
            ("heater_2", self.heater_2),
            ("heater_3", self.heater_3),
            ("lights_1", self.lights_1),
            ("lights_2", self.lights_2),
            ("i2c_sda", self.i2c_sda),
            ("i2c_scl", self.i2c_scl),
            ("ld2410_tx", self.ld2410_tx),
            ("ld2410_rx", self.ld2410_rx),
            ("ld2410_out", self.ld2410_out),
            ("lm35", self.lm35),
            ("status_led", self.status_led),
            ("pairing_button", self.pairing_button),
            ("reset_button", self.reset_button),
        ]
    }

    /// Heater pin for circuit `n` (1-based).
    pub fn heater(&self, n: u8) -> Option<Pin> {
        match n {
            1 => self.heater_1,
            2 => self.heater_2,
            3 => self.heater_3,
            _ => None,
        }
    }

    /// Lighting pin for relay `n` (1-based).
    pub fn lights(&self, n: u8) -> Option<Pin> {
        match n {
            1 => self.lights_1,
            2 => self.lights_2,
            _ => None,
        }
    }
}

/// Legacy-shape board: flat capabilities and a nullable pinout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBoard {
    pub board_type: String,
    pub board_version: String,
    pub module: Module,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub capabilities: LegacyCapabilities,
    pub pinout: LegacyPinout,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LegacyBoard {
    pub fn pin_report(&self) -> PinReport {
        detect_legacy_conflicts(self)
    }
}

impl Schema for LegacyBoard {
    const NAME: &'static str = "LegacyBoard";

    fn check(checker: &mut Checker, value: &Value) {
        check_legacy_board(checker, value);
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

/// Per-circuit heater wattage of a legacy SKU. Zero means "no circuit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatingWattage {
    pub circuit1: u32,
    pub circuit2: u32,
    pub circuit3: u32,
}

impl HeatingWattage {
    /// `(circuit number, wattage)` pairs in circuit order.
    pub fn circuits(&self) -> [(u8, u32); 3] {
        [(1, self.circuit1), (2, self.circuit2), (3, self.circuit3)]
    }
}

/// Entry of the flat SKU → compatible boards mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProduct {
    pub product_name: String,
    pub sku: String,
    pub variant: String,
    pub compatible_boards: Vec<String>,
    pub heating_wattage: HeatingWattage,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LegacyProduct {
    pub fn is_compatible_with<'a>(&self, board_ids: impl IntoIterator<Item = &'a str>) -> bool {
        board_ids.into_iter().any(|id| {
            self.compatible_boards
                .iter()
                .any(|c| c.eq_ignore_ascii_case(id))
        })
    }
}

impl Schema for LegacyProduct {
    const NAME: &'static str = "LegacyProduct";

    fn check(checker: &mut Checker, value: &Value) {
        check_legacy_product(checker, value);
    }
}

/// `sku_mapping.json`: `{"products": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySkuCatalog {
    pub products: Vec<LegacyProduct>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl LegacySkuCatalog {
    pub fn product(&self, sku: &str) -> Option<&LegacyProduct> {
        self.products.iter().find(|p| p.sku == sku)
    }
}

impl Schema for LegacySkuCatalog {
    const NAME: &'static str = "LegacySkuCatalog";

    fn check(checker: &mut Checker, value: &Value) {
        let Some(obj) = checker.object(value) else {
            return;
        };
        if let Some(products) = checker.array(obj, "products") {
            checker.each("products", products, check_legacy_product);
        }
    }
}

pub(crate) fn check_legacy_capabilities(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    c.optional_uint_in(obj, "heating_circuits", 0..=3);
    c.optional_uint_in(obj, "lighting_circuits", 0..=2);
    check_flags(c, obj, false);
}

pub(crate) fn check_legacy_pinout(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    for slot in LegacyPinout::SLOTS {
        c.nullable_pin(obj, slot);
    }
}

pub(crate) fn check_heating_wattage(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    for key in ["circuit1", "circuit2", "circuit3"] {
        c.uint_in(obj, key, 0..=u32::MAX as u64);
    }
}

pub(crate) fn check_legacy_board(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    check_board_identity(c, obj);
    if let Some(caps) = c.required(obj, "capabilities") {
        c.at("capabilities", |c| check_legacy_capabilities(c, caps));
    }
    if let Some(pinout) = c.required(obj, "pinout") {
        c.at("pinout", |c| check_legacy_pinout(c, pinout));
    }
}

fn check_legacy_product(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    c.string(obj, "productName");
    c.string(obj, "sku");
    c.string(obj, "variant");
    c.string_list(obj, "compatibleBoards", true);
    if let Some(wattage) = c.required(obj, "heatingWattage") {
        c.at("heatingWattage", |c| check_heating_wattage(c, wattage));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate, BoardRecord};
    use serde_json::json;

    fn legacy_value() -> Value {
        json!({
            "boardType": "ESP32-LEGACY",
            "boardVersion": "1.0",
            "module": { "chip": "ESP32", "flash_size_mb": 4 },
            "capabilities": {
                "heating_circuits": 3,
                "has_bme688": false,
                "has_sht41": true
            },
            "pinout": {
                "heater_1": 18,
                "heater_2": 19,
                "heater_3": null,
                "lights_1": 25,
                "lights_2": null,
                "i2c_sda": 21,
                "i2c_scl": 22,
                "spare_gpio": 33
            }
        })
    }

    #[test]
    fn test_legacy_board_detected_and_parsed() {
        let record: BoardRecord = validate(&legacy_value()).unwrap();
        let BoardRecord::Legacy(board) = record else {
            panic!("expected legacy board");
        };
        assert_eq!(board.pinout.heater(1), Some(18));
        assert_eq!(board.pinout.heater(3), None);
        assert_eq!(board.pinout.extra["spare_gpio"], json!(33));
        assert!(board.capabilities.sensor_flags().has_sht41);
    }

    #[test]
    fn test_null_slots_serialize_as_null() {
        let board: LegacyBoard = validate(&legacy_value()).unwrap();
        let back = serde_json::to_value(&board).unwrap();
        assert_eq!(back["pinout"]["heater_3"], Value::Null);
        assert_eq!(back["pinout"]["heater_1"], json!(18));
    }

    #[test]
    fn test_duplicate_pinout_slots_conflict() {
        let mut value = legacy_value();
        value["pinout"]["lights_1"] = json!(19);
        let err = validate::<LegacyBoard>(&value).unwrap_err();
        assert!(matches!(err, BoardCfgError::PinConflict { .. }));
    }

    #[test]
    fn test_with_sensor_flags_replaces_only_flags() {
        let board: LegacyBoard = validate(&legacy_value()).unwrap();
        let flags = SensorFlags {
            has_bme688: true,
            ..SensorFlags::default()
        };
        let caps = board.capabilities.with_sensor_flags(flags);
        assert!(caps.has_bme688);
        assert!(!caps.has_sht41);
        assert_eq!(caps.heating_circuits, Some(3));
        assert!(board.capabilities.has_sht41);
    }

    #[test]
    fn test_null_capability_flag_is_located_type_mismatch() {
        let mut value = legacy_value();
        value["capabilities"]["has_bme688"] = Value::Null;
        let err = validate::<LegacyBoard>(&value).unwrap_err();
        let BoardCfgError::Structural { issues, .. } = err else {
            panic!("expected structural error");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "capabilities.has_bme688");
        assert!(matches!(
            issues[0].kind,
            crate::schema::IssueKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_heating_wattage_must_be_non_negative() {
        let value = json!({
            "products": [{
                "productName": "Sauna",
                "sku": "S-1",
                "variant": "Basic",
                "compatibleBoards": ["ESP32-LEGACY"],
                "heatingWattage": { "circuit1": -5, "circuit2": 0, "circuit3": 0 }
            }]
        });
        let err = validate::<LegacySkuCatalog>(&value).unwrap_err();
        assert!(err
            .to_string()
            .contains("products[0].heatingWattage.circuit1"));
    }
}
