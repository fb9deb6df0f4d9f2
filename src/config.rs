//! Session configuration surface and on-disk persistence for the optional
//! trace-replay tooling.
//!
//! Grounded on the donor's `SessionConfig` (`network.rs`) and its
//! `config.rs` persistence helpers (`serde`/`serde_json`/`dirs`): the field
//! set here is re-scoped to a smaller surface than the donor's much larger
//! property-bag profile schema, and `TimingProfile`
//! replaces the donor's ad hoc per-purpose timeout fields with one concrete
//! enum. Persistence keeps the donor's shape (JSON file, `dirs`-resolved
//! default directory) but serializes the typed `SessionConfig` directly
//! instead of a loosely typed `HashMap<String, ConfigValue>`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::ScreenSize;

/// Negotiation timing profile: how aggressively the negotiator gives up on
/// an unresponsive peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimingProfile {
    Aggressive,
    Standard,
    Conservative,
}

impl TimingProfile {
    /// `(per-step timeout, overall negotiation deadline)`.
    pub fn durations(self) -> (Duration, Duration) {
        match self {
            TimingProfile::Aggressive => (Duration::from_millis(500), Duration::from_secs(5)),
            TimingProfile::Standard => (Duration::from_secs(2), Duration::from_secs(15)),
            TimingProfile::Conservative => (Duration::from_secs(5), Duration::from_secs(30)),
        }
    }
}

impl Default for TimingProfile {
    fn default() -> Self {
        TimingProfile::Standard
    }
}

/// Which transport mode the caller insists on, bypassing the negotiator's
/// own fallback ladder, or `Auto` to let negotiation decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceMode {
    Auto,
    Tn3270e,
    Tn3270,
    Nvt,
}

impl Default for ForceMode {
    fn default() -> Self {
        ForceMode::Auto
    }
}

/// 3270 terminal models and the screen geometry each implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    M2,
    M3,
    M4,
    M5,
}

impl Model {
    pub fn screen_size(self) -> ScreenSize {
        match self {
            Model::M2 => ScreenSize::Model2,
            Model::M3 => ScreenSize::Model3,
            Model::M4 => ScreenSize::Model4,
            Model::M5 => ScreenSize::Model5,
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::M2
    }
}

/// Full configuration surface a caller can set when opening a session.
/// TLS context material itself is supplied externally — `tls` here only
/// toggles whether the session wraps its stream in one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub rows: Option<u16>,
    pub cols: Option<u16>,
    pub model: Model,
    pub code_page: String,
    pub device_type: String,
    pub lu_name: Option<String>,
    pub tls: bool,
    pub timing_profile: TimingProfile,
    pub overall_timeout: Option<Duration>,
    pub step_timeout: Option<Duration>,
    pub circumvent_protection: bool,
    pub force_mode: ForceMode,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The geometry this config implies.
    pub fn screen_size(&self) -> ScreenSize {
        self.model.screen_size()
    }

    pub fn step_timeout_or_default(&self) -> Duration {
        self.step_timeout.unwrap_or_else(|| self.timing_profile.durations().0)
    }

    pub fn overall_timeout_or_default(&self) -> Duration {
        self.overall_timeout.unwrap_or_else(|| self.timing_profile.durations().1)
    }

    /// Load a configuration from a JSON file on disk.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save this configuration as JSON to disk, creating parent directories
    /// as needed.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, data)
    }

    /// The default per-user config directory, matching the donor's use of
    /// `dirs::config_dir()` for its profile store.
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tn3270-core"))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rows: None,
            cols: None,
            model: Model::default(),
            code_page: "cp037".to_string(),
            device_type: "IBM-3278-2-E".to_string(),
            lu_name: None,
            tls: false,
            timing_profile: TimingProfile::default(),
            overall_timeout: None,
            step_timeout: None,
            circumvent_protection: false,
            force_mode: ForceMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.code_page, "cp037");
        assert_eq!(cfg.device_type, "IBM-3278-2-E");
        assert!(!cfg.tls);
        assert_eq!(cfg.screen_size(), ScreenSize::Model2);
    }

    #[test]
    fn timing_profile_durations_order_by_aggressiveness() {
        let (aggr_step, aggr_overall) = TimingProfile::Aggressive.durations();
        let (cons_step, cons_overall) = TimingProfile::Conservative.durations();
        assert!(aggr_step < cons_step);
        assert!(aggr_overall < cons_overall);
    }

    #[test]
    fn round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut cfg = SessionConfig::default();
        cfg.lu_name = Some("LU1".to_string());
        cfg.model = Model::M4;
        cfg.save(&path).unwrap();
        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded.lu_name.as_deref(), Some("LU1"));
        assert_eq!(loaded.model, Model::M4);
    }
}
