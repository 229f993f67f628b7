//! Unit state persistence.
//!
//! Between hook invocations the unit remembers which flags are set, the
//! state of its relations, whether it holds leadership, and the leader
//! settings it has seen.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Set once configuration has been rendered with all required relations.
pub const CONFIG_COMPLETE_FLAG: &str = "config.complete";

/// Leader setting holding the Swift temp URL secret.
pub const TEMP_URL_SECRET_KEY: &str = "temp_url_secret";

/// Progress of one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationState {
    /// A remote unit has joined.
    Connected,
    /// The remote side has published everything we need.
    Available,
}

/// Leader-scoped key/value settings shared across units.
pub trait LeaderSettings {
    /// Read a leader setting.
    fn leader_get(&self, key: &str) -> Option<String>;

    /// Publish a leader setting.
    ///
    /// # Errors
    /// Returns an error if the setting cannot be stored.
    fn leader_set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Persisted unit state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitState {
    /// Whether this unit is the application leader.
    #[serde(default)]
    pub is_leader: bool,
    /// Flags raised by handlers.
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Relation endpoint name → state.
    #[serde(default)]
    pub relations: BTreeMap<String, RelationState>,
    /// Settings published by the leader.
    #[serde(default)]
    pub leader_settings: BTreeMap<String, String>,
    /// Directory the state file lives in.
    #[serde(skip)]
    pub state_dir: PathBuf,
    /// Timestamp of last update.
    #[serde(default)]
    pub updated_at: String,
}

impl UnitState {
    /// Create empty state stored under `state_dir`.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            is_leader: false,
            flags: BTreeSet::new(),
            relations: BTreeMap::new(),
            leader_settings: BTreeMap::new(),
            state_dir: state_dir.into(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get the state file path.
    #[must_use]
    pub fn state_file(state_dir: &Path) -> PathBuf {
        state_dir.join("charm-state.json")
    }

    /// Load state, starting empty when no state file exists yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::state_file(state_dir);
        if !path.exists() {
            return Ok(Self::new(state_dir));
        }

        let content = std::fs::read_to_string(&path).context("Failed to read state file")?;
        let mut state: Self =
            serde_json::from_str(&content).context("Failed to parse state file")?;
        state.state_dir = state_dir.to_path_buf();

        info!(
            leader = state.is_leader,
            flags = state.flags.len(),
            "Loaded unit state"
        );
        Ok(state)
    }

    /// Save state to file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        self.updated_at = chrono::Utc::now().to_rfc3339();

        std::fs::create_dir_all(&self.state_dir).context("Failed to create state directory")?;
        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        std::fs::write(Self::state_file(&self.state_dir), content)
            .context("Failed to write state file")?;

        Ok(())
    }

    #[must_use]
    pub fn is_flag_set(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Raise a flag and save.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn set_flag(&mut self, flag: &str) -> Result<()> {
        self.flags.insert(flag.to_string());
        self.save()
    }

    /// Record a relation's state and save.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn set_relation(&mut self, name: &str, state: RelationState) -> Result<()> {
        self.relations.insert(name.to_string(), state);
        self.save()
    }

    /// Record a leader setting received from the leader and save.
    ///
    /// Any unit may do this; only publishing through
    /// [`LeaderSettings::leader_set`] requires leadership.
    ///
    /// # Errors
    /// Returns an error if saving fails.
    pub fn record_leader_setting(&mut self, key: &str, value: &str) -> Result<()> {
        self.leader_settings
            .insert(key.to_string(), value.to_string());
        info!(key = %key, "Recorded leader setting");
        self.save()
    }

    #[must_use]
    pub fn config_complete(&self) -> bool {
        self.is_flag_set(CONFIG_COMPLETE_FLAG)
    }

    /// Whether the leader has published the temp URL secret.
    #[must_use]
    pub fn secret_provisioned(&self) -> bool {
        self.leader_get(TEMP_URL_SECRET_KEY)
            .is_some_and(|secret| !secret.is_empty())
    }
}

impl LeaderSettings for UnitState {
    fn leader_get(&self, key: &str) -> Option<String> {
        self.leader_settings.get(key).cloned()
    }

    fn leader_set(&mut self, key: &str, value: &str) -> Result<()> {
        anyhow::ensure!(self.is_leader, "only the leader can publish leader settings");
        self.record_leader_setting(key, value)
    }
}
