//! Camera list file
//!
//! A JSON array of cameras, each with the id the monitor reports it under:
//!
//! ```json
//! [
//!   { "id": 1, "name": "Front door", "address": "192.168.1.64",
//!     "username": "admin", "password": "secret" }
//! ]
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use camwatch_stream::{CameraConfig, DeviceId};
use serde::Deserialize;

/// One entry of the camera list
#[derive(Debug, Clone, Deserialize)]
pub struct CameraEntry {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl CameraEntry {
    pub fn device_id(&self) -> DeviceId {
        DeviceId::new(self.id)
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig::new(&self.address, &self.username, &self.password)
    }
}

/// Read and check a camera list file
pub fn load(path: &Path) -> Result<Vec<CameraEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read camera list {}", path.display()))?;

    parse(&contents).with_context(|| format!("Invalid camera list {}", path.display()))
}

pub fn parse(contents: &str) -> Result<Vec<CameraEntry>> {
    let entries: Vec<CameraEntry> =
        serde_json::from_str(contents).context("Camera list is not valid JSON")?;

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.id) {
            bail!("Duplicate camera id {}", entry.id);
        }
        if entry.address.trim().is_empty() {
            bail!("Camera {} has an empty address", entry.id);
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camera_list() {
        let entries = parse(
            r#"[
                {"id": 1, "name": "Front door", "address": "192.168.1.64",
                 "username": "admin", "password": "12345"},
                {"id": 2, "address": "cam2.local", "username": "viewer"}
            ]"#,
        )
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].device_id(), DeviceId::new(1));
        assert_eq!(entries[0].name.as_deref(), Some("Front door"));
        assert_eq!(entries[1].name, None);
        assert_eq!(entries[1].password, "");

        let config = entries[0].camera_config();
        assert_eq!(config.address, "192.168.1.64");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "12345");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = parse(
            r#"[
                {"id": 1, "address": "a", "username": "u"},
                {"id": 1, "address": "b", "username": "u"}
            ]"#,
        );
        assert!(result.unwrap_err().to_string().contains("Duplicate camera id 1"));
    }

    #[test]
    fn test_empty_address_rejected() {
        let result = parse(r#"[{"id": 3, "address": " ", "username": "u"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(parse("{not json").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load(Path::new("/nonexistent/cameras.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read camera list"));
    }
}
