//! War system configuration with documented defaults
//!
//! Loaded from `config.json` in the data directory. Every key is optional;
//! anything missing falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::Result;
use crate::core::types::FactionId;

/// Upper bound on declare targets offered in a single menu
pub const MAX_MENU_TARGETS: usize = 64;

/// Configuration for the war system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarConfig {
    // === WAR TIMING ===
    /// Delay between declaration and the war becoming active (seconds)
    ///
    /// At the default of 12 hours, the defending side gets half a day to
    /// prepare before structures become damageable.
    pub war_delay_seconds: i64,

    /// Cooldown after a war ends before either side may be involved in a new one
    pub cooldown_seconds: i64,

    // === STRUCTURE DAMAGE ===
    /// Multiplier applied when damage is allowed by an active war
    ///
    /// 1.0 = normal damage, 0.5 = half damage, 0.0 = no structure damage
    /// during war. Clamped to [0, 10] at use.
    pub structure_damage_multiplier: f32,

    /// Blueprint path fragments exempt from all gating
    ///
    /// Stored normalized (lowercase, without the `Blueprint'...'` wrapper).
    pub excluded_structure_blueprints: Vec<String>,

    // === ABANDONED FACTIONS ===
    /// If a faction has zero members, its structures become attackable by
    /// anyone for `abandoned_structure_window_seconds`
    pub enable_abandoned_structure_window: bool,
    pub abandoned_structure_window_seconds: i64,
    pub abandoned_structure_damage_multiplier: f32,

    // === MENU INTEGRATION ===
    /// Offer war actions in the structure action menu
    pub enable_multiuse_menu: bool,
    /// Only offer the menu on structures owned by the caller's faction
    pub multiuse_require_owned_structure: bool,
    /// Only offer the menu to faction leaders/admins
    pub multiuse_require_leader: bool,
    /// Maximum declare targets listed (capped at [`MAX_MENU_TARGETS`])
    pub multiuse_max_targets: usize,

    // === LEADERSHIP ===
    /// Accept plain membership where leadership flags are required
    ///
    /// Leadership flags can be out of sync after a faction is recreated.
    /// Enabling this lets any member declare or cancel wars.
    pub allow_member_fallback: bool,

    // === PERSISTENCE ===
    /// Minimum interval between two saves of the war data (seconds)
    pub save_interval_seconds: i64,

    // === SELF-TEST ===
    /// Seed a synthetic war and drive it through every phase without players
    pub self_test: bool,
    pub self_test_tribe_a: i64,
    pub self_test_tribe_b: i64,
    /// How long the synthetic war stays active before it is force-ended
    pub self_test_active_seconds: i64,
}

impl Default for WarConfig {
    fn default() -> Self {
        Self {
            war_delay_seconds: 12 * 60 * 60,
            cooldown_seconds: 48 * 60 * 60,

            structure_damage_multiplier: 1.0,
            excluded_structure_blueprints: Vec::new(),

            enable_abandoned_structure_window: false,
            abandoned_structure_window_seconds: 12 * 60 * 60,
            abandoned_structure_damage_multiplier: 1.0,

            enable_multiuse_menu: true,
            multiuse_require_owned_structure: true,
            multiuse_require_leader: true,
            multiuse_max_targets: 24,

            allow_member_fallback: false,

            save_interval_seconds: 30,

            self_test: false,
            self_test_tribe_a: 111_111,
            self_test_tribe_b: 222_222,
            self_test_active_seconds: 15,
        }
    }
}

impl WarConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the config, writing defaults if the file does not exist
    ///
    /// A file that cannot be read or parsed yields the defaults; the host is
    /// never brought down by a bad config.
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to write default config to {}: {}", path.display(), e);
            }
            return config;
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load and normalize a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: WarConfig = serde_json::from_str(json)?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Normalize blueprint paths and clamp values that must not go negative
    pub fn normalize(&mut self) {
        self.excluded_structure_blueprints = self
            .excluded_structure_blueprints
            .iter()
            .map(|p| normalize_blueprint_path(p))
            .filter(|p| !p.is_empty())
            .collect();

        self.war_delay_seconds = self.war_delay_seconds.max(0);
        self.cooldown_seconds = self.cooldown_seconds.max(0);
        self.abandoned_structure_window_seconds = self.abandoned_structure_window_seconds.max(0);
        self.save_interval_seconds = self.save_interval_seconds.max(0);
        self.self_test_active_seconds = self.self_test_active_seconds.max(1);
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.self_test {
            let (a, b) = self.self_test_factions();
            if a.is_none() || b.is_none() || a == b {
                return Err(format!(
                    "self_test factions must be distinct and non-zero (got {} and {})",
                    a, b
                ));
            }
        }

        if !self.structure_damage_multiplier.is_finite() {
            return Err("structure_damage_multiplier must be finite".into());
        }

        Ok(())
    }

    /// War damage multiplier, clamped to [0, 10]
    pub fn war_damage_multiplier(&self) -> f32 {
        if self.structure_damage_multiplier.is_finite() {
            self.structure_damage_multiplier.clamp(0.0, 10.0)
        } else {
            1.0
        }
    }

    /// Abandoned window length, or `None` when the feature is off
    pub fn abandoned_window(&self) -> Option<i64> {
        (self.enable_abandoned_structure_window && self.abandoned_structure_window_seconds > 0)
            .then_some(self.abandoned_structure_window_seconds)
    }

    pub fn menu_target_limit(&self) -> usize {
        self.multiuse_max_targets.min(MAX_MENU_TARGETS)
    }

    pub fn self_test_factions(&self) -> (FactionId, FactionId) {
        (
            FactionId::from_raw(self.self_test_tribe_a),
            FactionId::from_raw(self.self_test_tribe_b),
        )
    }

    /// Does this structure blueprint path bypass war gating?
    pub fn is_excluded_blueprint(&self, path: &str) -> bool {
        if self.excluded_structure_blueprints.is_empty() {
            return false;
        }
        let normalized = normalize_blueprint_path(path);
        if normalized.is_empty() {
            return false;
        }
        self.excluded_structure_blueprints
            .iter()
            .any(|excluded| normalized.contains(excluded.as_str()))
    }
}

/// Lowercase a blueprint path and strip the `Blueprint'...'` wrapper
pub fn normalize_blueprint_path(path: &str) -> String {
    let mut lower = path.trim().to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("blueprint'") {
        lower = rest.to_string();
    }
    if lower.ends_with('\'') {
        lower.pop();
    }
    lower
}
