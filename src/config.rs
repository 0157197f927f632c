// Run configuration -- static for the process lifetime, no hot reload.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALERT_DISPLAY_SECONDS, DEFAULT_FLASH_INTERVAL_SECONDS, DEFAULT_MIN_REGION_AREA,
    DEFAULT_OUTPUT_DIR, DEFAULT_POST_SECONDS, DEFAULT_PRE_SECONDS, DEFAULT_SUSTAINED_THRESHOLD,
};
use crate::error::{Result, SentryCamError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds of history included in a clip before the trigger.
    pub pre_seconds: f64,
    /// Seconds of footage appended to a clip after the trigger.
    pub post_seconds: f64,
    /// Consecutive motion frames required to start an event.
    pub sustained_threshold: u32,
    /// How long the alert stays active once triggered.
    pub alert_display_seconds: f64,
    /// Flash indicator toggle interval.
    pub flash_interval_seconds: f64,
    /// Minimum region area (px^2) the classifier should report as motion.
    pub min_region_area: u32,
    /// Where snapshots and clips are written.
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pre_seconds: DEFAULT_PRE_SECONDS,
            post_seconds: DEFAULT_POST_SECONDS,
            sustained_threshold: DEFAULT_SUSTAINED_THRESHOLD,
            alert_display_seconds: DEFAULT_ALERT_DISPLAY_SECONDS,
            flash_interval_seconds: DEFAULT_FLASH_INTERVAL_SECONDS,
            min_region_area: DEFAULT_MIN_REGION_AREA,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject values that would otherwise fail in confusing ways later.
    pub fn validate(&self) -> Result<()> {
        if self.sustained_threshold == 0 {
            return Err(SentryCamError::Config(
                "sustained_threshold must be at least 1".to_string(),
            ));
        }
        if !(self.pre_seconds >= 0.0) || !(self.post_seconds >= 0.0) {
            return Err(SentryCamError::Config(
                "pre_seconds and post_seconds must be non-negative".to_string(),
            ));
        }
        if !(self.alert_display_seconds > 0.0) {
            return Err(SentryCamError::Config(
                "alert_display_seconds must be positive".to_string(),
            ));
        }
        if !(self.flash_interval_seconds > 0.0) {
            return Err(SentryCamError::Config(
                "flash_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the output directory and probe it for writability. An output
    /// location we cannot write means recorded events would be silently
    /// lost, so this is fatal at startup.
    pub fn prepare_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            SentryCamError::OutputDir(format!("{}: {}", self.output_dir.display(), e))
        })?;
        let probe = self.output_dir.join(".write_probe");
        fs::write(&probe, b"probe").map_err(|e| {
            SentryCamError::OutputDir(format!("{}: {}", self.output_dir.display(), e))
        })?;
        let _ = fs::remove_file(&probe);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let c = Config::default();
        assert_eq!(c.pre_seconds, 3.0);
        assert_eq!(c.post_seconds, 3.0);
        assert_eq!(c.sustained_threshold, 3);
        assert_eq!(c.alert_display_seconds, 2.0);
        assert_eq!(c.flash_interval_seconds, 0.25);
        assert_eq!(c.min_region_area, 1500);
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"sustained_threshold": 5, "pre_seconds": 1.5}"#).unwrap();
        let c = Config::from_file(&path).unwrap();
        assert_eq!(c.sustained_threshold, 5);
        assert_eq!(c.pre_seconds, 1.5);
        assert_eq!(c.post_seconds, 3.0);
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let c = Config { sustained_threshold: 0, ..Config::default() };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_windows() {
        let c = Config { post_seconds: -1.0, ..Config::default() };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_prepare_output_dir_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let c = Config { output_dir: tmp.path().join("a/b/out"), ..Config::default() };
        c.prepare_output_dir().unwrap();
        assert!(c.output_dir.is_dir());
    }

    #[test]
    fn test_prepare_output_dir_fails_when_path_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocked");
        fs::write(&blocker, b"not a directory").unwrap();
        let c = Config { output_dir: blocker, ..Config::default() };
        let err = c.prepare_output_dir().unwrap_err();
        assert!(matches!(err, SentryCamError::OutputDir(_)));
    }
}
