//! Sensor-board add-ons and the capability flags they carry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::checker::Checker;
use super::{Extra, Pin, Schema};

/// The five sensor presence flags a sensor board overrides wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFlags {
    pub has_mlx90614: bool,
    pub has_bme688: bool,
    pub has_sht41: bool,
    pub has_ld2410_uart: bool,
    pub has_ld2410_binary: bool,
}

impl SensorFlags {
    pub const KEYS: [&'static str; 5] = [
        "has_mlx90614",
        "has_bme688",
        "has_sht41",
        "has_ld2410_uart",
        "has_ld2410_binary",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorCapabilities {
    pub has_mlx90614: bool,
    pub has_bme688: bool,
    pub has_sht41: bool,
    pub has_ld2410_uart: bool,
    pub has_ld2410_binary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_sensor_led: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_gnd_sw_mosfet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gnd_sw_gpio: Option<Pin>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl SensorCapabilities {
    pub fn from_flags(flags: SensorFlags) -> Self {
        Self {
            has_mlx90614: flags.has_mlx90614,
            has_bme688: flags.has_bme688,
            has_sht41: flags.has_sht41,
            has_ld2410_uart: flags.has_ld2410_uart,
            has_ld2410_binary: flags.has_ld2410_binary,
            has_sensor_led: None,
            has_gnd_sw_mosfet: None,
            gnd_sw_gpio: None,
            extra: Extra::new(),
        }
    }

    pub fn flags(&self) -> SensorFlags {
        SensorFlags {
            has_mlx90614: self.has_mlx90614,
            has_bme688: self.has_bme688,
            has_sht41: self.has_sht41,
            has_ld2410_uart: self.has_ld2410_uart,
            has_ld2410_binary: self.has_ld2410_binary,
        }
    }
}

/// An attachable add-on identified by SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorBoard {
    pub sku: String,
    pub name: String,
    pub compatible_boards: Vec<String>,
    pub capabilities: SensorCapabilities,
    #[serde(flatten)]
    pub extra: Extra,
}

impl SensorBoard {
    /// Whether any of `board_ids` (a board type and its aliases) appears in
    /// `compatibleBoards`. Comparison ignores ASCII case.
    pub fn is_compatible_with<'a>(&self, board_ids: impl IntoIterator<Item = &'a str>) -> bool {
        board_ids.into_iter().any(|id| {
            self.compatible_boards
                .iter()
                .any(|c| c.eq_ignore_ascii_case(id))
        })
    }
}

impl Schema for SensorBoard {
    const NAME: &'static str = "SensorBoard";

    fn check(checker: &mut Checker, value: &Value) {
        check_sensor_board(checker, value);
    }
}

/// `sensor_boards.json`: `{"sensorBoards": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorBoardCatalog {
    pub sensor_boards: Vec<SensorBoard>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Schema for SensorBoardCatalog {
    const NAME: &'static str = "SensorBoardCatalog";

    fn check(checker: &mut Checker, value: &Value) {
        let Some(obj) = checker.object(value) else {
            return;
        };
        if let Some(boards) = checker.array(obj, "sensorBoards") {
            checker.each("sensorBoards", boards, check_sensor_board);
            let mut seen: Vec<&str> = Vec::new();
            checker.each("sensorBoards", boards, |c, board| {
                if let Some(sku) = board.get("sku").and_then(Value::as_str) {
                    if seen.contains(&sku) {
                        c.refine(format!("duplicate sensor board sku '{}'", sku));
                    }
                    seen.push(sku);
                }
            });
        }
    }
}

pub(crate) fn check_sensor_board(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    c.string(obj, "sku");
    c.string(obj, "name");
    c.string_list(obj, "compatibleBoards", true);
    if let Some(caps) = c.required(obj, "capabilities") {
        c.at("capabilities", |c| check_sensor_capabilities(c, caps));
    }
}

pub(crate) fn check_sensor_capabilities(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    check_flags(c, obj, true);
    c.optional_boolean(obj, "has_sensor_led");
    let mosfet = c.optional_boolean(obj, "has_gnd_sw_mosfet");
    c.nullable_pin(obj, "gnd_sw_gpio");
    let gpio_missing = matches!(obj.get("gnd_sw_gpio"), None | Some(Value::Null));
    if mosfet == Some(true) && gpio_missing {
        c.refine("has_gnd_sw_mosfet requires gnd_sw_gpio");
    }
}

/// The five sensor flags; required on sensor boards, defaulted on legacy
/// board capabilities.
pub(crate) fn check_flags(c: &mut Checker, obj: &Map<String, Value>, required: bool) {
    for key in SensorFlags::KEYS {
        if required {
            c.boolean(obj, key);
        } else {
            c.defaulted_boolean(obj, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoardCfgError;
    use crate::schema::validate;
    use serde_json::json;

    fn radar_board() -> Value {
        json!({
            "sku": "SB-RADAR",
            "name": "Radar + climate",
            "compatibleBoards": ["ESP32-HC", "hc-v2"],
            "capabilities": {
                "has_mlx90614": false,
                "has_bme688": true,
                "has_sht41": false,
                "has_ld2410_uart": true,
                "has_ld2410_binary": false,
                "has_gnd_sw_mosfet": true,
                "gnd_sw_gpio": 27
            }
        })
    }

    #[test]
    fn test_sensor_board_parses() {
        let board: SensorBoard = validate(&radar_board()).unwrap();
        assert_eq!(board.capabilities.gnd_sw_gpio, Some(27));
        assert!(board.capabilities.flags().has_bme688);
    }

    #[test]
    fn test_compatibility_ignores_case() {
        let board: SensorBoard = validate(&radar_board()).unwrap();
        assert!(board.is_compatible_with(["esp32-hc"]));
        assert!(board.is_compatible_with(["OTHER", "HC-V2"]));
        assert!(!board.is_compatible_with(["ESP32-LITE"]));
    }

    #[test]
    fn test_mosfet_without_gpio_is_refinement_failure() {
        let mut value = radar_board();
        value["capabilities"]
            .as_object_mut()
            .unwrap()
            .remove("gnd_sw_gpio");
        let err = validate::<SensorBoard>(&value).unwrap_err();
        assert!(err.to_string().contains("gnd_sw_gpio"));
    }

    #[test]
    fn test_missing_flags_are_all_reported() {
        let value = json!({
            "sku": "SB-EMPTY",
            "name": "Empty",
            "compatibleBoards": [],
            "capabilities": {}
        });
        match validate::<SensorBoard>(&value).unwrap_err() {
            BoardCfgError::Structural { issues, .. } => assert_eq!(issues.len(), 5),
            other => panic!("unexpected error: {other}"),
        }
    }
}
