//! Product (SKU variant) records and their hardware components.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::checker::Checker;
use super::sensor_board::SensorFlags;
use super::{Extra, Pin, Schema};
use crate::core::{BoardCfgError, Result};
use crate::pins::PinRegistry;

pub const MAX_HEATING_RELAYS: usize = 3;
pub const MAX_LIGHTING_RELAYS: usize = 2;

/// Valid 7-bit I2C address range.
const I2C_ADDRESS_RANGE: std::ops::RangeInclusive<u64> = 0x01..=0x7F;

/// A manufacturable SKU variant hosted on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub sku: String,
    pub variant: String,
    pub name: String,
    #[serde(default)]
    pub heating_relays: Vec<HeatingRelay>,
    #[serde(default)]
    pub lighting_relays: Vec<LightingRelay>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensors: Vec<Sensor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub leds: Vec<Led>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Product {
    pub fn component_count(&self) -> usize {
        self.heating_relays.len()
            + self.lighting_relays.len()
            + self.sensors.len()
            + self.leds.len()
            + self.buttons.len()
    }

    /// Sensor presence flags implied by the product's own sensor list.
    pub fn sensor_flags(&self) -> SensorFlags {
        let mut flags = SensorFlags::default();
        for sensor in &self.sensors {
            match sensor {
                Sensor::I2c(s) => match s.model {
                    I2cModel::Mlx90614 => flags.has_mlx90614 = true,
                    I2cModel::Bme688 => flags.has_bme688 = true,
                    I2cModel::Sht41 => flags.has_sht41 = true,
                },
                Sensor::Uart(s) => {
                    flags.has_ld2410_uart = true;
                    if s.out_pin.is_some() {
                        flags.has_ld2410_binary = true;
                    }
                }
                Sensor::Analog(_) => {}
            }
        }
        flags
    }
}

impl Schema for Product {
    const NAME: &'static str = "Product";

    fn check(checker: &mut Checker, value: &Value) {
        check_product(checker, value);
    }

    /// A product may not reuse a pin across its own components.
    fn refine(&self) -> Result<()> {
        let mut registry = PinRegistry::new();
        registry.claim_product(self);
        let report = registry.report();
        if report.is_valid {
            Ok(())
        } else {
            Err(BoardCfgError::PinConflict {
                scope: format!("product {}", self.sku),
                conflicts: report.conflicts,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatingRelay {
    pub id: String,
    pub pin: Pin,
    pub wattage: u32,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightingRelay {
    pub id: String,
    pub pin: Pin,
    #[serde(rename = "type")]
    pub kind: LightingType,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Lighting relay type. `led_strip` and `led_ring` are the names emitted by
/// the legacy migration path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingType {
    Dimmable,
    Rgb,
    Warmth,
    Regular,
    LedStrip,
    LedRing,
}

impl LightingType {
    pub const NAMES: &'static [&'static str] =
        &["dimmable", "rgb", "warmth", "regular", "led_strip", "led_ring"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Led {
    pub id: String,
    pub pin: Pin,
    #[serde(rename = "type")]
    pub kind: LedType,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedType {
    Status,
    Indicator,
    Ambient,
}

impl LedType {
    pub const NAMES: &'static [&'static str] = &["status", "indicator", "ambient"];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub id: String,
    pub pin: Pin,
    #[serde(rename = "type")]
    pub kind: ButtonType,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonType {
    Pairing,
    Switch,
    Reset,
}

impl ButtonType {
    pub const NAMES: &'static [&'static str] = &["pairing", "switch", "reset"];
}

/// Bus a sensor is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    I2c,
    Uart,
    Analog,
}

impl SensorKind {
    pub const TYPE_NAMES: &'static [&'static str] =
        &["mlx90614", "bme688", "sht41", "ld2410", "lm35"];

    /// Discriminant for a sensor `type` string.
    pub fn for_type(type_name: &str) -> Option<Self> {
        match type_name {
            "mlx90614" | "bme688" | "sht41" => Some(SensorKind::I2c),
            "ld2410" => Some(SensorKind::Uart),
            "lm35" => Some(SensorKind::Analog),
            _ => None,
        }
    }
}

/// Sensor attached to a product or shared on a board.
///
/// The JSON form is flat (`{"id", "type", ...}`); the `type` string selects
/// the variant, and each variant only carries the fields valid for its bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Sensor {
    I2c(I2cSensor),
    Uart(UartSensor),
    Analog(AnalogSensor),
}

impl Sensor {
    pub fn id(&self) -> &str {
        match self {
            Sensor::I2c(s) => &s.id,
            Sensor::Uart(s) => &s.id,
            Sensor::Analog(s) => &s.id,
        }
    }

    pub fn kind(&self) -> SensorKind {
        match self {
            Sensor::I2c(_) => SensorKind::I2c,
            Sensor::Uart(_) => SensorKind::Uart,
            Sensor::Analog(_) => SensorKind::Analog,
        }
    }

    /// GPIO pins the sensor occupies, with a sub-pin label where the sensor
    /// has more than one. I2C sensors sit on the board bus and claim none.
    pub fn pins(&self) -> Vec<(Option<&'static str>, Pin)> {
        match self {
            Sensor::I2c(_) => Vec::new(),
            Sensor::Uart(s) => {
                let mut pins = vec![(Some("tx"), s.tx_pin), (Some("rx"), s.rx_pin)];
                if let Some(out) = s.out_pin {
                    pins.push((Some("out"), out));
                }
                pins
            }
            Sensor::Analog(s) => vec![(None, s.pin)],
        }
    }
}

impl<'de> Deserialize<'de> for Sensor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?;
        let kind = SensorKind::for_type(type_name).ok_or_else(|| {
            de::Error::unknown_variant(type_name, SensorKind::TYPE_NAMES)
        })?;
        match kind {
            SensorKind::I2c => serde_json::from_value(value).map(Sensor::I2c),
            SensorKind::Uart => serde_json::from_value(value).map(Sensor::Uart),
            SensorKind::Analog => serde_json::from_value(value).map(Sensor::Analog),
        }
        .map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I2cSensor {
    pub id: String,
    #[serde(rename = "type")]
    pub model: I2cModel,
    #[serde(deserialize_with = "deserialize_i2c_address")]
    pub address: u8,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum I2cModel {
    Mlx90614,
    Bme688,
    Sht41,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UartSensor {
    pub id: String,
    #[serde(rename = "type")]
    pub model: UartModel,
    pub uart_port: u8,
    pub tx_pin: Pin,
    pub rx_pin: Pin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_pin: Option<Pin>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UartModel {
    Ld2410,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogSensor {
    pub id: String,
    #[serde(rename = "type")]
    pub model: AnalogModel,
    pub pin: Pin,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalogModel {
    Lm35,
}

/// I2C addresses appear either as integers or as `"0x5A"` strings.
fn parse_i2c_address(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
            u64::from_str_radix(hex, 16).ok()
        }
        _ => None,
    }
}

fn deserialize_i2c_address<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_i2c_address(&value)
        .filter(|a| I2C_ADDRESS_RANGE.contains(a))
        .map(|a| a as u8)
        .ok_or_else(|| de::Error::custom(format!("invalid I2C address {}", value)))
}

pub(crate) fn check_product(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    c.string(obj, "sku");
    c.string(obj, "variant");
    c.string(obj, "name");

    let mut components = 0;

    if let Some(relays) = c.array(obj, "heatingRelays") {
        components += relays.len();
        c.max_len("heatingRelays", relays, MAX_HEATING_RELAYS);
        c.each("heatingRelays", relays, |c, relay| {
            if let Some(relay) = c.object(relay) {
                c.string(relay, "id");
                c.pin(relay, "pin");
                c.uint_in(relay, "wattage", 0..=u32::MAX as u64);
            }
        });
    }

    if let Some(relays) = c.array(obj, "lightingRelays") {
        components += relays.len();
        c.max_len("lightingRelays", relays, MAX_LIGHTING_RELAYS);
        c.each("lightingRelays", relays, |c, relay| {
            if let Some(relay) = c.object(relay) {
                c.string(relay, "id");
                c.pin(relay, "pin");
                c.one_of(relay, "type", LightingType::NAMES);
            }
        });
    }

    components += check_peripherals(c, obj);

    if components == 0 {
        c.refine("product must declare at least one relay, sensor, LED or button");
    }
}

/// Optional `sensors`/`leds`/`buttons` arrays, shared by products and boards.
/// Returns the number of entries seen.
pub(crate) fn check_peripherals(c: &mut Checker, obj: &Map<String, Value>) -> usize {
    let mut count = 0;
    if let Some(sensors) = c.optional_array(obj, "sensors") {
        count += sensors.len();
        c.each("sensors", sensors, check_sensor);
    }
    if let Some(leds) = c.optional_array(obj, "leds") {
        count += leds.len();
        c.each("leds", leds, |c, led| {
            if let Some(led) = c.object(led) {
                c.string(led, "id");
                c.pin(led, "pin");
                c.one_of(led, "type", LedType::NAMES);
            }
        });
    }
    if let Some(buttons) = c.optional_array(obj, "buttons") {
        count += buttons.len();
        c.each("buttons", buttons, |c, button| {
            if let Some(button) = c.object(button) {
                c.string(button, "id");
                c.pin(button, "pin");
                c.one_of(button, "type", ButtonType::NAMES);
            }
        });
    }
    count
}

fn check_sensor(c: &mut Checker, value: &Value) {
    let Some(obj) = c.object(value) else {
        return;
    };
    c.string(obj, "id");
    let Some(type_name) = c.one_of(obj, "type", SensorKind::TYPE_NAMES) else {
        return;
    };
    match SensorKind::for_type(type_name) {
        Some(SensorKind::I2c) => {
            if let Some(address) = c.required(obj, "address") {
                c.at("address", |c| match parse_i2c_address(address) {
                    Some(a) if I2C_ADDRESS_RANGE.contains(&a) => {}
                    Some(a) => c.report(super::IssueKind::OutOfRange {
                        message: format!("I2C address {:#04x} is outside 0x01..=0x7f", a),
                    }),
                    None => c.report(super::IssueKind::TypeMismatch {
                        expected: "integer or \"0x..\" hex string".to_string(),
                        found: super::checker::json_type_name(address).to_string(),
                    }),
                });
            }
        }
        Some(SensorKind::Uart) => {
            c.uint_in(obj, "uart_port", 0..=u8::MAX as u64);
            c.pin(obj, "tx_pin");
            c.pin(obj, "rx_pin");
            c.optional_pin(obj, "out_pin");
        }
        Some(SensorKind::Analog) => {
            c.pin(obj, "pin");
        }
        None => {}
    }
}
