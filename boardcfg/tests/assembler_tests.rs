//! Final configuration assembly from the fixture catalog

use boardcfg::assemble::{
    assemble_current, assemble_legacy, Credentials, EnvSensor, ManualSensors, PresenceSensor,
    SensorSelection, UnitMeta,
};
use boardcfg::prelude::*;
use boardcfg::schema::{self, BatchDate, BoardRecord, ConfigShape, CONFIG_VERSION_LEGACY};
use std::path::PathBuf;

fn catalog() -> Catalog {
    let source = FsCatalog::new(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("catalog"),
    );
    Catalog::load(&source).expect("fixture catalog should load")
}

fn meta() -> UnitMeta {
    UnitMeta {
        batch_date: BatchDate::parse("32026").unwrap(),
        credentials: Credentials::new("0123456789abcdef0123456789abcdef", "ab".repeat(32)),
    }
}

#[test]
fn test_current_board_defaults() {
    let catalog = catalog();
    let BoardRecord::Current(board) = catalog.find_board("ESP32-HC").unwrap() else {
        panic!("ESP32-HC should be a current board");
    };

    let config = assemble_current(board, "HC-3", &SensorSelection::BoardDefaults, &meta()).unwrap();
    assert_eq!(config.shape(), ConfigShape::Current);
    assert_eq!(config.batch_date, "32026");
    assert_eq!(config.i2c.as_ref().unwrap().sda, 21);
    assert_eq!(config.product.as_ref().unwrap().heating_relays.len(), 3);
    assert!(config.sensor_capabilities.is_none());
    assert!(config.sensor_board.is_none());
    assert!(config.effective_sensor_flags().has_bme688);
}

#[test]
fn test_sensor_board_overrides_legacy_flags() {
    let catalog = catalog();
    let BoardRecord::Legacy(board) = catalog.find_board("legacy-v1").unwrap() else {
        panic!("legacy-v1 should resolve to a legacy board");
    };
    assert!(!board.capabilities.has_bme688);
    assert!(board.capabilities.has_sht41);

    let product = catalog.sku_mapping.as_ref().unwrap().product("CS-3").unwrap();
    let sensor_board = catalog.find_sensor_board("SB-CLIMATE").unwrap().clone();
    let config = assemble_legacy(
        board,
        product,
        &SensorSelection::SensorBoard(sensor_board),
        &meta(),
    )
    .unwrap();

    let caps = config.capabilities.as_ref().unwrap();
    assert!(caps.has_bme688);
    assert!(!caps.has_sht41);
    assert!(caps.has_mlx90614);
    assert!(!caps.has_ld2410_uart, "overrides replace all five flags");
    assert_eq!(caps.heating_circuits, Some(3));
    assert_eq!(config.config_version, CONFIG_VERSION_LEGACY);
    assert_eq!(config.sensor_board.as_deref(), Some("SB-CLIMATE"));

    // The catalog value is left untouched.
    assert!(!board.capabilities.has_bme688);
    assert!(board.capabilities.has_sht41);
}

#[test]
fn test_incompatible_sensor_board_is_rejected() {
    let catalog = catalog();
    let BoardRecord::Current(board) = catalog.find_board("ESP32-HC").unwrap() else {
        panic!("ESP32-HC should be a current board");
    };
    let radar = catalog.find_sensor_board("SB-RADAR").unwrap().clone();

    let err =
        assemble_current(board, "HC-3", &SensorSelection::SensorBoard(radar), &meta()).unwrap_err();
    assert!(matches!(err, BoardCfgError::Incompatible { .. }));
}

#[test]
fn test_sensor_board_ground_switch_on_relay_pin_is_conflict() {
    let catalog = catalog();
    let BoardRecord::Current(board) = catalog.find_board("ESP32-HC").unwrap() else {
        panic!("ESP32-HC should be a current board");
    };
    let mut climate = catalog.find_sensor_board("SB-CLIMATE").unwrap().clone();
    climate.capabilities.has_gnd_sw_mosfet = Some(true);
    climate.capabilities.gnd_sw_gpio = Some(18);

    let err = assemble_current(board, "HC-3", &SensorSelection::SensorBoard(climate), &meta())
        .unwrap_err();
    let BoardCfgError::PinConflict { conflicts, .. } = err else {
        panic!("expected a pin conflict");
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].pin, 18);
    assert!(conflicts[0]
        .components
        .contains(&"SB-CLIMATE:sensor_board:gnd_sw".to_string()));
}

#[test]
fn test_legacy_config_checks_sensor_board_ground_switch() {
    let catalog = catalog();
    let BoardRecord::Legacy(board) = catalog.find_board("ESP32-LEGACY").unwrap() else {
        panic!("ESP32-LEGACY should be a legacy board");
    };
    let product = catalog.sku_mapping.as_ref().unwrap().product("CS-3").unwrap();
    let radar = catalog.find_sensor_board("SB-RADAR").unwrap().clone();

    let config = assemble_legacy(
        board,
        product,
        &SensorSelection::SensorBoard(radar.clone()),
        &meta(),
    )
    .unwrap();
    assert_eq!(config.sensor_capabilities.as_ref().unwrap().gnd_sw_gpio, Some(5));

    let mut clashing = radar;
    clashing.capabilities.gnd_sw_gpio = Some(18);
    let err = assemble_legacy(
        board,
        product,
        &SensorSelection::SensorBoard(clashing),
        &meta(),
    )
    .unwrap_err();
    assert!(matches!(err, BoardCfgError::PinConflict { .. }));
}

#[test]
fn test_manual_override_writes_sensor_capabilities() {
    let catalog = catalog();
    let BoardRecord::Current(board) = catalog.find_board("hc-v2").unwrap() else {
        panic!("hc-v2 should resolve to ESP32-HC");
    };
    let manual = ManualSensors {
        env: EnvSensor::Sht41,
        mlx90614: false,
        presence: PresenceSensor::Uart,
    };

    let config =
        assemble_current(board, "HC-3", &SensorSelection::Manual(manual), &meta()).unwrap();
    let caps = config.sensor_capabilities.as_ref().unwrap();
    assert!(caps.has_sht41);
    assert!(!caps.has_bme688);
    assert!(caps.has_ld2410_uart);
    assert_eq!(config.effective_sensor_flags(), manual.flags());
}

#[test]
fn test_manual_selection_matching_defaults_is_not_written() {
    let catalog = catalog();
    let BoardRecord::Current(board) = catalog.find_board("ESP32-HC").unwrap() else {
        panic!("ESP32-HC should be a current board");
    };
    let manual = ManualSensors {
        env: EnvSensor::Bme688,
        ..ManualSensors::default()
    };
    let config =
        assemble_current(board, "HC-3", &SensorSelection::Manual(manual), &meta()).unwrap();
    assert!(config.sensor_capabilities.is_none());
}

#[test]
fn test_unknown_sku_is_not_found() {
    let catalog = catalog();
    let BoardRecord::Current(board) = catalog.find_board("ESP32-HC").unwrap() else {
        panic!("ESP32-HC should be a current board");
    };
    let err = assemble_current(board, "CS-3", &SensorSelection::BoardDefaults, &meta()).unwrap_err();
    assert!(matches!(err, BoardCfgError::NotFound { .. }));
}

#[test]
fn test_assembled_config_revalidates() {
    let catalog = catalog();
    let BoardRecord::Current(board) = catalog.find_board("ESP32-HC").unwrap() else {
        panic!("ESP32-HC should be a current board");
    };
    let config =
        assemble_current(board, "HC-2-L", &SensorSelection::BoardDefaults, &meta()).unwrap();

    let value = serde_json::to_value(&config).unwrap();
    let again: FinalConfig = schema::validate(&value).unwrap();
    assert_eq!(again, config);
    assert_eq!(value["product"]["factoryNote"], "kept verbatim");
}
