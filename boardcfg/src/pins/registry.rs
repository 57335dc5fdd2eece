//! Pin → claims registry.
//!
//! A registry lives for one validation call. Components are claimed one pin
//! at a time under a `owner:category:id[:subpin]` label; any pin that ends
//! up with more than one claim is a conflict, whether the claims come from
//! different products or from the same one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::schema::{Board, I2cBus, LegacyBoard, LegacyPinout, Pin, Product, Sensor};

/// Owner label for board-level shared peripherals.
pub const SHARED_OWNER: &str = "shared";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Heating,
    Lighting,
    Sensor,
    Led,
    Button,
    I2c,
    Pinout,
    SensorBoard,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Heating => "heating",
            Category::Lighting => "lighting",
            Category::Sensor => "sensor",
            Category::Led => "led",
            Category::Button => "button",
            Category::I2c => "i2c",
            Category::Pinout => "pinout",
            Category::SensorBoard => "sensor_board",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    owner: String,
    label: String,
}

/// One pin claimed more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinConflict {
    pub pin: Pin,
    /// Distinct owners (product SKUs, or `shared`) in first-claim order.
    pub products: Vec<String>,
    /// Every claiming component label in claim order.
    pub components: Vec<String>,
}

impl fmt::Display for PinConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GPIO {} claimed by {}",
            self.pin,
            self.components.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinReport {
    pub is_valid: bool,
    /// Ordered by the first time each pin was claimed.
    pub conflicts: Vec<PinConflict>,
    /// Every pin in use, ascending.
    pub all_pins: Vec<Pin>,
}

#[derive(Debug, Default)]
pub struct PinRegistry {
    first_seen: Vec<Pin>,
    claims: HashMap<Pin, Vec<Claim>>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn claim(
        &mut self,
        pin: Pin,
        owner: &str,
        category: Category,
        id: &str,
        subpin: Option<&str>,
    ) {
        let mut label = format!("{}:{}:{}", owner, category.as_str(), id);
        if let Some(sub) = subpin {
            label.push(':');
            label.push_str(sub);
        }
        let claims = self.claims.entry(pin).or_default();
        if claims.is_empty() {
            self.first_seen.push(pin);
        }
        claims.push(Claim {
            owner: owner.to_string(),
            label,
        });
    }

    pub fn claim_i2c_bus(&mut self, bus: &I2cBus) {
        self.claim(bus.sda, SHARED_OWNER, Category::I2c, "sda", None);
        self.claim(bus.scl, SHARED_OWNER, Category::I2c, "scl", None);
    }

    pub fn claim_sensor(&mut self, owner: &str, sensor: &Sensor) {
        for (subpin, pin) in sensor.pins() {
            self.claim(pin, owner, Category::Sensor, sensor.id(), subpin);
        }
    }

    pub fn claim_product(&mut self, product: &Product) {
        let owner = product.sku.as_str();
        for relay in &product.heating_relays {
            self.claim(relay.pin, owner, Category::Heating, &relay.id, None);
        }
        for relay in &product.lighting_relays {
            self.claim(relay.pin, owner, Category::Lighting, &relay.id, None);
        }
        for sensor in &product.sensors {
            self.claim_sensor(owner, sensor);
        }
        for led in &product.leds {
            self.claim(led.pin, owner, Category::Led, &led.id, None);
        }
        for button in &product.buttons {
            self.claim(button.pin, owner, Category::Button, &button.id, None);
        }
    }

    /// Every product in catalog order, then shared peripherals, then the
    /// I2C bus.
    pub fn claim_board(&mut self, board: &Board) {
        for product in &board.products {
            self.claim_product(product);
        }
        for sensor in &board.sensors {
            self.claim_sensor(SHARED_OWNER, sensor);
        }
        for led in &board.leds {
            self.claim(led.pin, SHARED_OWNER, Category::Led, &led.id, None);
        }
        for button in &board.buttons {
            self.claim(button.pin, SHARED_OWNER, Category::Button, &button.id, None);
        }
        self.claim_i2c_bus(&board.i2c);
    }

    /// Every wired (non-null) slot of a legacy pinout.
    pub fn claim_legacy_pinout(&mut self, owner: &str, pinout: &LegacyPinout) {
        for (slot, pin) in pinout.slots() {
            if let Some(pin) = pin {
                self.claim(pin, owner, Category::Pinout, slot, None);
            }
        }
    }

    pub fn report(&self) -> PinReport {
        let conflicts: Vec<PinConflict> = self
            .first_seen
            .iter()
            .filter_map(|pin| {
                let claims = &self.claims[pin];
                if claims.len() < 2 {
                    return None;
                }
                let mut owners: Vec<String> = Vec::new();
                for claim in claims {
                    if !owners.contains(&claim.owner) {
                        owners.push(claim.owner.clone());
                    }
                }
                Some(PinConflict {
                    pin: *pin,
                    products: owners,
                    components: claims.iter().map(|c| c.label.clone()).collect(),
                })
            })
            .collect();

        let mut all_pins: Vec<Pin> = self.claims.keys().copied().collect();
        all_pins.sort_unstable();

        PinReport {
            is_valid: conflicts.is_empty(),
            conflicts,
            all_pins,
        }
    }
}

/// Conflict report for one board's scope. Never rejects; see
/// `Board::refine` for the rejecting form.
pub fn detect_conflicts(board: &Board) -> PinReport {
    let mut registry = PinRegistry::new();
    registry.claim_board(board);
    let report = registry.report();
    if !report.is_valid {
        tracing::debug!(
            board = %board.board_type,
            conflicts = report.conflicts.len(),
            "pin conflicts detected"
        );
    }
    report
}

pub fn detect_legacy_conflicts(board: &LegacyBoard) -> PinReport {
    let mut registry = PinRegistry::new();
    registry.claim_legacy_pinout(&board.board_type, &board.pinout);
    registry.report()
}

/// Diagnostic report for a bare product list with no board context.
pub fn detect_product_conflicts<'a>(products: impl IntoIterator<Item = &'a Product>) -> PinReport {
    let mut registry = PinRegistry::new();
    for product in products {
        registry.claim_product(product);
    }
    registry.report()
}
