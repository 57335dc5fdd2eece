//! Generation flow driven by a scripted prompter

use boardcfg::assemble::{EnvSensor, ManualSensors, PresenceSensor};
use boardcfg::prelude::*;
use boardcfg::schema::{BatchDate, ConfigShape};
use boardcfg::{run_session, save_config, SensorPreset};
use std::collections::VecDeque;
use std::path::PathBuf;

#[derive(Debug)]
enum Answer {
    Select(usize),
    Confirm(bool),
    Input(&'static str),
    Default,
    Cancel,
}

/// Replays canned answers and records every question asked.
#[derive(Default)]
struct ScriptedPrompter {
    answers: VecDeque<Answer>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: answers.into(),
            asked: Vec::new(),
        }
    }

    fn next(&mut self, prompt: &str) -> Answer {
        self.asked.push(prompt.to_string());
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {}", prompt))
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&mut self, prompt: &str, items: &[String], _default: usize) -> boardcfg::Result<usize> {
        match self.next(prompt) {
            Answer::Select(i) => {
                assert!(i < items.len(), "{} has only {:?}", prompt, items);
                Ok(i)
            }
            Answer::Cancel => Err(BoardCfgError::Cancelled),
            other => panic!("{}: expected select answer, got {:?}", prompt, other),
        }
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> boardcfg::Result<bool> {
        match self.next(prompt) {
            Answer::Confirm(b) => Ok(b),
            Answer::Default => Ok(default),
            Answer::Cancel => Err(BoardCfgError::Cancelled),
            other => panic!("{}: expected confirm answer, got {:?}", prompt, other),
        }
    }

    fn input(
        &mut self,
        prompt: &str,
        default: Option<&str>,
        validate: &dyn Fn(&str) -> Result<(), String>,
    ) -> boardcfg::Result<String> {
        let text = match self.next(prompt) {
            Answer::Input(text) => text.to_string(),
            Answer::Default => default.unwrap_or_default().to_string(),
            Answer::Cancel => return Err(BoardCfgError::Cancelled),
            other => panic!("{}: expected input answer, got {:?}", prompt, other),
        };
        validate(&text).map_err(BoardCfgError::Prompt)?;
        Ok(text)
    }
}

fn catalog() -> Catalog {
    let source = FsCatalog::new(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("catalog"),
    );
    Catalog::load(&source).expect("fixture catalog should load")
}

#[test]
fn test_interactive_current_board_with_sensor_board() {
    let catalog = catalog();
    let mut prompter = ScriptedPrompter::new(vec![
        Answer::Select(0), // Sauna Heater
        Answer::Select(1), // HC-2-L
        Answer::Input("112026"),
        Answer::Select(1), // attach a sensor board
        Answer::Select(0), // SB-CLIMATE
        Answer::Confirm(true),
    ]);

    let generated = run_session(&catalog, &mut prompter, &SessionPresets::default()).unwrap();
    assert!(generated.save);

    let config = generated.config;
    assert_eq!(config.sku, "HC-2-L");
    assert_eq!(config.board_type, "ESP32-HC");
    assert_eq!(config.batch_date, "112026");
    assert_eq!(config.sensor_board.as_deref(), Some("SB-CLIMATE"));
    assert_eq!(config.sensor_capabilities.as_ref().unwrap().has_sensor_led, Some(true));

    // A single compatible board is chosen without asking.
    assert!(!prompter.asked.iter().any(|p| p == "Board"));
    assert_eq!(prompter.asked.len(), 6);
}

#[test]
fn test_interactive_legacy_board_with_manual_sensors() {
    let catalog = catalog();
    let mut prompter = ScriptedPrompter::new(vec![
        Answer::Select(1), // Classic Sauna
        Answer::Select(0), // CS-3
        Answer::Select(1), // ESP32-MINI
        Answer::Default,   // current month
        Answer::Select(1), // manual (no sensor boards fit this board)
        Answer::Select(1), // sht41
        Answer::Confirm(true),
        Answer::Select(0), // uart radar
        Answer::Confirm(false),
    ]);

    let generated = run_session(&catalog, &mut prompter, &SessionPresets::default()).unwrap();
    assert!(!generated.save);

    let config = generated.config;
    assert_eq!(config.shape(), ConfigShape::Legacy);
    assert_eq!(config.board_type, "ESP32-MINI");
    assert_eq!(config.batch_date, BatchDate::current().as_str());

    let flags = config.effective_sensor_flags();
    assert!(flags.has_sht41);
    assert!(flags.has_mlx90614);
    assert!(flags.has_ld2410_uart);
    assert!(!flags.has_bme688);
}

#[test]
fn test_cancel_mid_flow() {
    let catalog = catalog();
    let mut prompter = ScriptedPrompter::new(vec![Answer::Select(0), Answer::Cancel]);

    let err = run_session(&catalog, &mut prompter, &SessionPresets::default()).unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn test_invalid_batch_date_is_rejected_by_validator() {
    let catalog = catalog();
    let mut prompter = ScriptedPrompter::new(vec![Answer::Input("132026")]);
    let presets = SessionPresets {
        sku: Some("HC-3".to_string()),
        ..SessionPresets::default()
    };

    let err = run_session(&catalog, &mut prompter, &presets).unwrap_err();
    assert!(matches!(err, BoardCfgError::Prompt(_)));
}

fn scripted_presets() -> SessionPresets {
    SessionPresets {
        sku: Some("hc-3".to_string()),
        board: Some("hc-v2".to_string()),
        batch_date: Some("012026".to_string()),
        sensors: Some(SensorPreset::Manual(ManualSensors {
            env: EnvSensor::Sht41,
            mlx90614: true,
            presence: PresenceSensor::Binary,
        })),
        save: true,
    }
}

#[test]
fn test_presets_answer_every_question() {
    let catalog = catalog();
    let mut prompter = ScriptedPrompter::default();

    let generated = run_session(&catalog, &mut prompter, &scripted_presets()).unwrap();
    assert!(prompter.asked.is_empty());
    assert!(generated.save);
    assert_eq!(generated.config.sku, "HC-3");
    assert_eq!(generated.config.batch_date, "012026");
}

#[test]
fn test_preset_batch_date_is_stored_without_padding() {
    let catalog = catalog();
    let presets = SessionPresets {
        batch_date: Some(" 32026 ".to_string()),
        ..scripted_presets()
    };

    let generated = run_session(&catalog, &mut ScriptedPrompter::default(), &presets).unwrap();
    assert_eq!(generated.config.batch_date, "32026");
}

#[test]
fn test_generation_is_deterministic_apart_from_credentials() {
    let catalog = catalog();
    let mut first = run_session(&catalog, &mut ScriptedPrompter::default(), &scripted_presets())
        .unwrap()
        .config;
    let mut second = run_session(&catalog, &mut ScriptedPrompter::default(), &scripted_presets())
        .unwrap()
        .config;
    assert_ne!(first.provisioning_key, second.provisioning_key);

    for config in [&mut first, &mut second] {
        config.provisioning_key.clear();
        config.provisioning_secret.clear();
    }
    assert_eq!(first, second);
}

#[test]
fn test_sku_not_offered_on_board() {
    let catalog = catalog();
    let presets = SessionPresets {
        sku: Some("CS-3".to_string()),
        board: Some("ESP32-HC".to_string()),
        ..SessionPresets::default()
    };
    let err = run_session(&catalog, &mut ScriptedPrompter::default(), &presets).unwrap_err();
    assert!(matches!(err, BoardCfgError::NotFound { .. }));
}

#[test]
fn test_saved_config_passes_check() {
    let catalog = catalog();
    let generated =
        run_session(&catalog, &mut ScriptedPrompter::default(), &scripted_presets()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let saved = save_config(dir.path(), &generated.config).unwrap();
    let file_name = saved.json_path.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.starts_with("HC-3_012026_"));

    let reloaded = BoardCfgCore::check_config(&saved.json_path).unwrap();
    assert_eq!(reloaded, generated.config);
}
