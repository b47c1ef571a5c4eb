//! Promo code redemption
//!
//! Independent of the war system: a configured list of codes, each granting
//! one item, and a ledger of who redeemed what. A redemption is recorded only
//! after the item was actually handed out.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::error::{Result, TribeWarError};
use crate::core::types::Timestamp;

pub const PROMO_CONFIG_FILE: &str = "promo_config.json";
pub const PROMO_LEDGER_FILE: &str = "promo_data.json";

/// Hands items to players on behalf of the promo ledger
pub trait ItemGranter {
    /// Give the promo's item to the player; false if the host refused
    fn grant_item(&self, player_key: u64, entry: &PromoEntry) -> bool;
}

/// A single redeemable code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoEntry {
    pub code: String,
    /// Item blueprint path handed to the host
    pub blueprint: String,
    pub quantity: u32,
    pub quality: f32,
    pub force_blueprint: bool,
    pub one_time_per_player: bool,
    /// Cap on distinct redeeming players; 0 = unlimited
    ///
    /// The ledger keeps one entry per player and code, so when
    /// `one_time_per_player` is off a player's repeat redemptions refresh
    /// their entry and do not count against the cap.
    pub max_total_uses: u32,
}

impl Default for PromoEntry {
    fn default() -> Self {
        Self {
            code: String::new(),
            blueprint: String::new(),
            quantity: 1,
            quality: 1.0,
            force_blueprint: false,
            one_time_per_player: true,
            max_total_uses: 0,
        }
    }
}

/// Promo configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoConfig {
    /// Chat command that triggers redemption
    pub command: String,
    pub case_sensitive: bool,
    pub promos: Vec<PromoEntry>,
}

impl Default for PromoConfig {
    fn default() -> Self {
        Self {
            command: "/promo".to_string(),
            case_sensitive: false,
            promos: Vec::new(),
        }
    }
}

impl PromoConfig {
    /// Load the config, writing a sample one if the file does not exist
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::sample();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to write default promo config: {}", e);
            }
            return config;
        }

        let loaded = fs::read_to_string(path)
            .map_err(TribeWarError::from)
            .and_then(|content| Self::from_json(&content));
        match loaded {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load promo config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: PromoConfig = serde_json::from_str(json)?;
        if config.command.trim().is_empty() {
            config.command = "/promo".to_string();
        }
        config
            .promos
            .retain(|p| !p.code.is_empty() && !p.blueprint.is_empty());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn sample() -> Self {
        Self {
            promos: vec![PromoEntry {
                code: "OPEN2026".to_string(),
                blueprint: "Blueprint'/Game/Mods/KsMissions/Items/PrimalItem_Goldcoin.PrimalItem_Goldcoin'"
                    .to_string(),
                ..PromoEntry::default()
            }],
            ..Self::default()
        }
    }
}

/// Why a code was not redeemed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemError {
    #[error("Usage: /promo <code>")]
    MissingCode,

    #[error("Invalid promo code.")]
    UnknownCode,

    #[error("Could not determine your player id.")]
    UnknownPlayer,

    #[error("You have already used this promo code.")]
    AlreadyRedeemed,

    #[error("This promo code has reached its usage limit.")]
    UsageLimitReached,

    #[error("The item could not be granted (check the blueprint in the config).")]
    GrantFailed,
}

pub const REDEEMED_TEXT: &str = "Promo code accepted. Item granted!";

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    redeemed: BTreeMap<String, BTreeMap<String, Timestamp>>,
}

/// Redemption ledger: code → player key → redemption time
pub struct PromoLedger {
    config: PromoConfig,
    path: PathBuf,
    redeemed: Mutex<AHashMap<String, AHashMap<String, Timestamp>>>,
}

impl PromoLedger {
    pub fn new(config: PromoConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            path: path.into(),
            redeemed: Mutex::new(AHashMap::new()),
        }
    }

    /// Load config and ledger from the data directory
    pub fn open(data_dir: &Path) -> Self {
        let config = PromoConfig::load_or_create(&data_dir.join(PROMO_CONFIG_FILE));
        let ledger = Self::new(config, data_dir.join(PROMO_LEDGER_FILE));
        ledger.load();
        ledger
    }

    pub fn config(&self) -> &PromoConfig {
        &self.config
    }

    fn normalize(&self, code: &str) -> String {
        if self.config.case_sensitive {
            code.to_string()
        } else {
            code.to_lowercase()
        }
    }

    fn find(&self, normalized: &str) -> Option<&PromoEntry> {
        self.config
            .promos
            .iter()
            .find(|p| self.normalize(&p.code) == normalized)
    }

    /// Load the ledger; a missing or broken file leaves it empty
    pub fn load(&self) {
        if !self.path.exists() {
            return;
        }
        let loaded = fs::read_to_string(&self.path)
            .map_err(TribeWarError::from)
            .and_then(|content| -> Result<LedgerFile> { Ok(serde_json::from_str(&content)?) });
        match loaded {
            Ok(file) => {
                let mut redeemed = self.redeemed.lock();
                redeemed.clear();
                for (code, players) in file.redeemed {
                    redeemed.insert(code, players.into_iter().collect());
                }
            }
            Err(e) => tracing::warn!("Failed to load promo ledger {}: {}", self.path.display(), e),
        }
    }

    pub fn save(&self) -> Result<()> {
        let file = LedgerFile {
            redeemed: self
                .redeemed
                .lock()
                .iter()
                .map(|(code, players)| {
                    let players = players.iter().map(|(k, ts)| (k.clone(), *ts)).collect();
                    (code.clone(), players)
                })
                .collect(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Number of distinct players who redeemed `code`
    pub fn total_uses(&self, code: &str) -> usize {
        let normalized = self.normalize(code);
        self.redeemed.lock().get(&normalized).map_or(0, |p| p.len())
    }

    pub fn has_redeemed(&self, code: &str, player_key: u64) -> bool {
        let normalized = self.normalize(code);
        self.redeemed
            .lock()
            .get(&normalized)
            .is_some_and(|p| p.contains_key(&player_key.to_string()))
    }

    /// Redeem `code` for a player
    pub fn redeem(
        &self,
        granter: &dyn ItemGranter,
        player_key: u64,
        code: &str,
        now: Timestamp,
    ) -> std::result::Result<(), RedeemError> {
        let normalized = self.normalize(code.trim());
        if normalized.is_empty() {
            return Err(RedeemError::MissingCode);
        }
        let entry = self.find(&normalized).ok_or(RedeemError::UnknownCode)?;
        if player_key == 0 {
            return Err(RedeemError::UnknownPlayer);
        }
        let key = player_key.to_string();

        {
            let redeemed = self.redeemed.lock();
            let players = redeemed.get(&normalized);
            if entry.one_time_per_player && players.is_some_and(|p| p.contains_key(&key)) {
                return Err(RedeemError::AlreadyRedeemed);
            }
            let uses = players.map_or(0, |p| p.len());
            if entry.max_total_uses > 0 && uses >= entry.max_total_uses as usize {
                return Err(RedeemError::UsageLimitReached);
            }
        }

        if !granter.grant_item(player_key, entry) {
            return Err(RedeemError::GrantFailed);
        }

        self.redeemed
            .lock()
            .entry(normalized)
            .or_default()
            .insert(key, now);
        if let Err(e) = self.save() {
            tracing::warn!("Failed to save promo ledger: {}", e);
        }
        tracing::info!(player_key, code = %entry.code, "Promo code redeemed");
        Ok(())
    }

    /// Handle a chat line such as `"/promo CODE"` or a bare `"CODE"`
    ///
    /// Returns `None` when the line is a different command.
    pub fn handle_chat(
        &self,
        granter: &dyn ItemGranter,
        player_key: u64,
        message: &str,
        now: Timestamp,
    ) -> Option<String> {
        let mut tokens = message.split_whitespace().peekable();
        if let Some(first) = tokens.peek() {
            if first.starts_with('/') {
                if !first.eq_ignore_ascii_case(&self.config.command) {
                    return None;
                }
                tokens.next();
            }
        }

        let result = match tokens.next() {
            Some(code) => self.redeem(granter, player_key, code, now),
            None => Err(RedeemError::MissingCode),
        };
        Some(match result {
            Ok(()) => REDEEMED_TEXT.to_string(),
            Err(e) => e.to_string(),
        })
    }
}
