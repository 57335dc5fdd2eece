//! Directory-backed catalog source.

use serde_json::Value;
use std::path::{Path, PathBuf};

use super::CatalogSource;
use crate::core::Result;

pub const BOARDS_DIR: &str = "boards";
pub const SENSOR_BOARDS_FILE: &str = "sensor_boards.json";
pub const SKU_MAPPING_FILE: &str = "sku_mapping.json";

/// Reads catalog JSON files from a directory tree.
#[derive(Debug, Clone)]
pub struct FsCatalog {
    root: PathBuf,
}

impl FsCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn boards_dir(&self) -> PathBuf {
        self.root.join(BOARDS_DIR)
    }

    fn board_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.boards_dir();
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "board directory does not exist");
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Board file for `id`: exact name first, then case-insensitive.
    pub fn board_path(&self, id: &str) -> Result<Option<PathBuf>> {
        let exact = self.boards_dir().join(format!("{}.json", id));
        if exact.is_file() {
            return Ok(Some(exact));
        }
        let wanted = id.to_ascii_lowercase();
        Ok(self.board_files()?.into_iter().find(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(|stem| stem.to_ascii_lowercase() == wanted)
                .unwrap_or(false)
        }))
    }

    fn read_optional(&self, path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "optional catalog file absent");
            return Ok(None);
        }
        read_json(path).map(Some)
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)?;
    Ok(value)
}

impl CatalogSource for FsCatalog {
    fn board_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .board_files()?
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect())
    }

    fn read_board(&self, id: &str) -> Result<Option<Value>> {
        match self.board_path(id)? {
            Some(path) => {
                tracing::debug!(board = id, path = %path.display(), "reading board");
                read_json(&path).map(Some)
            }
            None => Ok(None),
        }
    }

    fn read_sensor_boards(&self) -> Result<Option<Value>> {
        self.read_optional(&self.root.join(SENSOR_BOARDS_FILE))
    }

    fn read_sku_mapping(&self) -> Result<Option<Value>> {
        self.read_optional(&self.root.join(SKU_MAPPING_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, rel: &str, value: &Value) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    #[test]
    fn test_board_lookup_falls_back_to_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "boards/ESP32-HC.json", &json!({ "boardType": "ESP32-HC" }));
        let catalog = FsCatalog::new(dir.path());

        assert!(catalog.read_board("ESP32-HC").unwrap().is_some());
        assert!(catalog.read_board("esp32-hc").unwrap().is_some());
        assert!(catalog.read_board("ESP32-XX").unwrap().is_none());
        assert_eq!(catalog.board_ids().unwrap(), vec!["ESP32-HC"]);
    }

    #[test]
    fn test_missing_optional_files_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FsCatalog::new(dir.path());
        assert!(catalog.read_sensor_boards().unwrap().is_none());
        assert!(catalog.read_sku_mapping().unwrap().is_none());
        assert!(catalog.board_ids().unwrap().is_empty());
    }

    #[test]
    fn test_unparseable_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SENSOR_BOARDS_FILE), "{ not json").unwrap();
        let catalog = FsCatalog::new(dir.path());
        assert!(matches!(
            catalog.read_sensor_boards(),
            Err(crate::core::BoardCfgError::Json(_))
        ));
    }
}
