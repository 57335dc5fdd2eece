//! Per-unit manufacturing output record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::batch_date::BatchDate;
use super::board::{check_i2c_bus, check_module, I2cBus, Module};
use super::checker::{Checker, IssueKind};
use super::legacy::{
    check_heating_wattage, check_legacy_capabilities, check_legacy_pinout, HeatingWattage,
    LegacyCapabilities, LegacyPinout,
};
use super::product::{check_product, Product};
use super::sensor_board::{check_sensor_capabilities, SensorCapabilities, SensorFlags};
use super::{Extra, Schema};
use crate::core::{BoardCfgError, Result};
use crate::pins::{Category, PinRegistry};

/// `configVersion` written for flattened capabilities + pinout records.
pub const CONFIG_VERSION_LEGACY: u32 = 1;
/// `configVersion` written for embedded i2c + product records.
pub const CONFIG_VERSION_CURRENT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigShape {
    Current,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalConfig {
    pub config_version: u32,
    pub sku: String,
    pub board_type: String,
    pub board_version: String,
    pub batch_date: String,
    pub provisioning_key: String,
    pub provisioning_secret: String,
    pub module: Module,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i2c: Option<I2cBus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_capabilities: Option<SensorCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<LegacyCapabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinout: Option<LegacyPinout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_wattage: Option<HeatingWattage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_board: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl FinalConfig {
    pub fn shape(&self) -> ConfigShape {
        if self.product.is_some() {
            ConfigShape::Current
        } else {
            ConfigShape::Legacy
        }
    }

    /// Sensor flags the unit ships with, after any sensor-board override.
    pub fn effective_sensor_flags(&self) -> SensorFlags {
        if let Some(caps) = &self.capabilities {
            return caps.sensor_flags();
        }
        if let Some(caps) = &self.sensor_capabilities {
            return caps.flags();
        }
        self.product
            .as_ref()
            .map(Product::sensor_flags)
            .unwrap_or_default()
    }

    fn pin_registry(&self) -> PinRegistry {
        let mut registry = PinRegistry::new();
        if let Some(product) = &self.product {
            registry.claim_product(product);
        }
        if let Some(i2c) = &self.i2c {
            registry.claim_i2c_bus(i2c);
        }
        if let Some(pinout) = &self.pinout {
            registry.claim_legacy_pinout(&self.board_type, pinout);
        }
        if let Some(gpio) = self.sensor_capabilities.as_ref().and_then(|c| c.gnd_sw_gpio) {
            let owner = self.sensor_board.as_deref().unwrap_or("sensor_board");
            registry.claim(gpio, owner, Category::SensorBoard, "gnd_sw", None);
        }
        registry
    }
}

impl Schema for FinalConfig {
    const NAME: &'static str = "FinalConfig";

    fn check(checker: &mut Checker, value: &Value) {
        check_final_config(checker, value);
    }

    fn refine(&self) -> Result<()> {
        let report = self.pin_registry().report();
        if report.is_valid {
            Ok(())
        } else {
            Err(BoardCfgError::PinConflict {
                scope: format!("config {}", self.sku),
                conflicts: report.conflicts,
            })
        }
    }
}

fn check_final_config(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    let version = c.uint_in(obj, "configVersion", 1..=u32::MAX as u64);
    let sku = c.string(obj, "sku");
    c.string(obj, "boardType");
    c.string(obj, "boardVersion");
    if let Some(raw) = c.string(obj, "batchDate") {
        if let Err(e) = BatchDate::parse(raw) {
            c.at("batchDate", |c| {
                c.report(IssueKind::OutOfRange {
                    message: e.to_string(),
                })
            });
        }
    }
    c.string(obj, "provisioningKey");
    c.string(obj, "provisioningSecret");
    if let Some(module) = c.required(obj, "module") {
        c.at("module", |c| check_module(c, module));
    }
    c.optional_string(obj, "sensorBoard");
    if let Some(caps) = obj.get("sensorCapabilities") {
        c.at("sensorCapabilities", |c| check_sensor_capabilities(c, caps));
    }

    let current = obj.contains_key("i2c") || obj.contains_key("product");
    let legacy = obj.contains_key("capabilities") || obj.contains_key("pinout");

    match (current, legacy) {
        (true, true) => {
            c.refine("config mixes current (i2c/product) and legacy (capabilities/pinout) fields")
        }
        (false, false) => {
            c.refine("config must carry either i2c + product or capabilities + pinout")
        }
        (true, false) => {
            if let Some(i2c) = c.required(obj, "i2c") {
                c.at("i2c", |c| check_i2c_bus(c, i2c));
            }
            if let Some(product) = c.required(obj, "product") {
                c.at("product", |c| check_product(c, product));
                let embedded = product.get("sku").and_then(Value::as_str);
                if let (Some(sku), Some(embedded)) = (sku, embedded) {
                    if sku != embedded {
                        c.refine(format!(
                            "sku '{}' does not match embedded product sku '{}'",
                            sku, embedded
                        ));
                    }
                }
            }
            if let Some(version) = version {
                if version < CONFIG_VERSION_CURRENT as u64 {
                    c.at("configVersion", |c| {
                        c.refine(format!(
                            "i2c + product records require configVersion >= {}",
                            CONFIG_VERSION_CURRENT
                        ))
                    });
                }
            }
        }
        (false, true) => {
            if let Some(caps) = c.required(obj, "capabilities") {
                c.at("capabilities", |c| check_legacy_capabilities(c, caps));
            }
            if let Some(pinout) = c.required(obj, "pinout") {
                c.at("pinout", |c| check_legacy_pinout(c, pinout));
            }
            if let Some(wattage) = obj.get("heatingWattage") {
                c.at("heatingWattage", |c| check_heating_wattage(c, wattage));
            }
            if let Some(version) = version {
                if version != CONFIG_VERSION_LEGACY as u64 {
                    c.at("configVersion", |c| {
                        c.refine(format!(
                            "capabilities + pinout records require configVersion {}",
                            CONFIG_VERSION_LEGACY
                        ))
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{parse_structure, validate};
    use serde_json::json;

    fn current_config() -> Value {
        json!({
            "configVersion": 2,
            "sku": "HC-3",
            "boardType": "ESP32-HC",
            "boardVersion": "2.1",
            "batchDate": "102026",
            "provisioningKey": "0f3c8a",
            "provisioningSecret": "9d1e44",
            "module": { "chip": "ESP32-S3", "flash_size_mb": 8 },
            "i2c": { "sda": 21, "scl": 22, "port": 0 },
            "product": {
                "sku": "HC-3",
                "variant": "Three circuits",
                "name": "Heater",
                "heatingRelays": [{ "id": "heater_1", "pin": 18, "wattage": 1600 }],
                "lightingRelays": []
            }
        })
    }

    #[test]
    fn test_current_config_validates() {
        let config: FinalConfig = validate(&current_config()).unwrap();
        assert_eq!(config.shape(), ConfigShape::Current);
    }

    #[test]
    fn test_mixed_shape_is_rejected() {
        let mut value = current_config();
        value["pinout"] = json!({ "heater_1": 18 });
        let err = parse_structure::<FinalConfig>(&value).unwrap_err();
        assert!(err.to_string().contains("mixes"));
    }

    #[test]
    fn test_bad_batch_date_and_sku_mismatch_reported_together() {
        let mut value = current_config();
        value["batchDate"] = json!("132026");
        value["product"]["sku"] = json!("HC-2");
        let err = parse_structure::<FinalConfig>(&value).unwrap_err();
        let BoardCfgError::Structural { issues, .. } = err else {
            panic!("expected structural error");
        };
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].path, "batchDate");
    }

    #[test]
    fn test_sensor_board_ground_switch_claims_its_gpio() {
        let mut value = current_config();
        value["sensorBoard"] = json!("SB-RADAR");
        value["sensorCapabilities"] = json!({
            "has_mlx90614": false,
            "has_bme688": false,
            "has_sht41": false,
            "has_ld2410_uart": true,
            "has_ld2410_binary": false,
            "has_gnd_sw_mosfet": true,
            "gnd_sw_gpio": 18
        });
        let err = validate::<FinalConfig>(&value).unwrap_err();
        let BoardCfgError::PinConflict { conflicts, .. } = err else {
            panic!("expected pin conflict");
        };
        assert_eq!(conflicts[0].pin, 18);
        assert_eq!(
            conflicts[0].components,
            vec!["HC-3:heating:heater_1", "SB-RADAR:sensor_board:gnd_sw"]
        );

        value["sensorCapabilities"]["gnd_sw_gpio"] = json!(5);
        assert!(validate::<FinalConfig>(&value).is_ok());
    }

    #[test]
    fn test_padded_batch_date_is_rejected() {
        let mut value = current_config();
        value["batchDate"] = json!(" 12026 ");
        let err = parse_structure::<FinalConfig>(&value).unwrap_err();
        let BoardCfgError::Structural { issues, .. } = err else {
            panic!("expected structural error");
        };
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "batchDate");
    }

    #[test]
    fn test_product_pin_on_i2c_bus_is_conflict() {
        let mut value = current_config();
        value["product"]["heatingRelays"][0]["pin"] = json!(21);
        let err = validate::<FinalConfig>(&value).unwrap_err();
        assert!(matches!(err, BoardCfgError::PinConflict { .. }));
    }
}
