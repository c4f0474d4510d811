use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Models accepted by the settings UI and the config sanitizer.
pub const AVAILABLE_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash-latest",
];

/// Fallback model whenever the configured one is not in [`AVAILABLE_MODELS`].
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Default transcription prompt sent alongside every utterance.
pub const DEFAULT_PROMPT: &str = "\
You are a transcription engine converting spoken audio into clean, \
publication-ready text.\n\
\n\
Transcribe the speaker's intended words accurately. Apply standard \
punctuation and capitalization, and write numbers as digits. Strictly omit \
all filler words (um, uh, ah, you know), hesitations, and false starts; when \
the speaker stumbles and corrects themselves, transcribe only the corrected \
phrase. If the audio contains no discernible speech (silence or pure noise), \
output a completely empty string with no placeholder text. Use \
'[unintelligible]' sparingly for genuinely undecipherable segments.\n\
\n\
The result must read as professionally edited written text, ready for \
immediate use.";

/// User-editable settings, persisted under the `"settings"` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub prompt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_owned(),
            prompt: DEFAULT_PROMPT.to_owned(),
        }
    }
}

/// Usage counters, persisted under the `"api_stats"` key.
///
/// `daily_calls` is reset lazily: whenever `last_call_date` differs from the
/// current calendar date at the next access, not via a timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiStats {
    pub daily_calls: u64,
    pub last_call_date: String,
    pub total_calls: u64,
}

impl Default for ApiStats {
    fn default() -> Self {
        Self {
            daily_calls: 0,
            last_call_date: today(),
            total_calls: 0,
        }
    }
}

/// On-disk shape: `{"settings": {...}, "api_stats": {...}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    settings: Settings,
    api_stats: ApiStats,
}

/// Current local date as `YYYY-MM-DD`, the format stored in the config file.
#[must_use]
pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Loads, sanitizes and persists the JSON configuration file.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    pub settings: Settings,
    pub api_stats: ApiStats,
}

impl ConfigStore {
    /// Default config location: `~/.dictation-hotkey.json`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        Ok(home.join(".dictation-hotkey.json"))
    }

    /// Load from the default path, creating the file with defaults if absent.
    pub fn load_or_create() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Load from an explicit path.
    ///
    /// A missing file is created with defaults. An unparseable file is
    /// replaced in memory with defaults (the next save overwrites it),
    /// matching the "warn and continue" failure policy everywhere else.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let mut store = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;

            match serde_json::from_str::<ConfigFile>(&contents) {
                Ok(file) => Self {
                    path,
                    settings: file.settings,
                    api_stats: file.api_stats,
                },
                Err(e) => {
                    warn!(error = %e, "config file unparseable, using defaults");
                    Self {
                        path,
                        settings: Settings::default(),
                        api_stats: ApiStats::default(),
                    }
                }
            }
        } else {
            info!(path = %path.display(), "config file missing, writing defaults");
            let store = Self {
                path,
                settings: Settings::default(),
                api_stats: ApiStats::default(),
            };
            store.save()?;
            store
        };

        let mut dirty = store.sanitize_model();
        dirty |= store.roll_daily(&today());
        if dirty {
            store.save()?;
        }

        Ok(store)
    }

    /// Serialize the current state back to the config file.
    pub fn save(&self) -> Result<()> {
        let file = ConfigFile {
            settings: self.settings.clone(),
            api_stats: self.api_stats.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("failed to serialize config")?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write config file {}", self.path.display()))?;
        Ok(())
    }

    /// Path this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace an out-of-allow-list model with the default. Returns whether
    /// anything changed.
    fn sanitize_model(&mut self) -> bool {
        if AVAILABLE_MODELS.contains(&self.settings.model.as_str()) {
            false
        } else {
            warn!(model = %self.settings.model, "unknown model in config, using default");
            self.settings.model = DEFAULT_MODEL.to_owned();
            true
        }
    }

    /// Reset `daily_calls` when the stored date is not `today`. Returns
    /// whether a reset happened.
    pub fn roll_daily(&mut self, today: &str) -> bool {
        if self.api_stats.last_call_date == today {
            false
        } else {
            self.api_stats.daily_calls = 0;
            self.api_stats.last_call_date = today.to_owned();
            true
        }
    }

    /// Record one successful API call: rollover check, increment both
    /// counters, persist immediately.
    pub fn record_call(&mut self) -> Result<()> {
        self.roll_daily(&today());
        self.api_stats.daily_calls += 1;
        self.api_stats.total_calls += 1;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_config_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("dictation-hotkey-test-{name}.json"))
    }

    #[test]
    fn test_missing_file_creates_defaults() {
        let path = temp_config_path("missing");
        let _ = fs::remove_file(&path);

        let store = ConfigStore::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.settings.model, DEFAULT_MODEL);
        assert_eq!(store.settings.api_key, "");
        assert_eq!(store.api_stats.total_calls, 0);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_round_trip_preserves_settings() {
        let path = temp_config_path("roundtrip");
        let _ = fs::remove_file(&path);

        let mut store = ConfigStore::load_from(&path).unwrap();
        store.settings.api_key = "sk-test-key".to_owned();
        store.settings.model = "gemini-2.0-flash".to_owned();
        store.settings.prompt = "custom prompt".to_owned();
        store.api_stats.daily_calls = 3;
        store.api_stats.total_calls = 42;
        store.api_stats.last_call_date = today();
        store.save().unwrap();

        let reloaded = ConfigStore::load_from(&path).unwrap();
        assert_eq!(reloaded.settings, store.settings);
        assert_eq!(reloaded.api_stats, store.api_stats);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let path = temp_config_path("corrupt");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::load_from(&path).unwrap();
        assert_eq!(store.settings, Settings::default());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_unknown_model_replaced_with_default() {
        let path = temp_config_path("badmodel");
        let json = r#"{"settings": {"api_key": "k", "model": "gpt-9", "prompt": "p"}}"#;
        fs::write(&path, json).unwrap();

        let store = ConfigStore::load_from(&path).unwrap();
        assert_eq!(store.settings.model, DEFAULT_MODEL);
        assert_eq!(store.settings.api_key, "k");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_daily_rollover_resets_counter() {
        let path = temp_config_path("rollover");
        let _ = fs::remove_file(&path);

        let mut store = ConfigStore::load_from(&path).unwrap();
        store.api_stats.daily_calls = 7;
        store.api_stats.total_calls = 7;
        store.api_stats.last_call_date = "2020-01-01".to_owned();

        let reset = store.roll_daily("2020-01-02");
        assert!(reset);
        assert_eq!(store.api_stats.daily_calls, 0);
        assert_eq!(store.api_stats.last_call_date, "2020-01-02");
        // Lifetime counter is never reset.
        assert_eq!(store.api_stats.total_calls, 7);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_daily_rollover_same_day_preserved() {
        let path = temp_config_path("sameday");
        let _ = fs::remove_file(&path);

        let mut store = ConfigStore::load_from(&path).unwrap();
        store.api_stats.daily_calls = 5;
        store.api_stats.last_call_date = "2020-06-15".to_owned();

        let reset = store.roll_daily("2020-06-15");
        assert!(!reset);
        assert_eq!(store.api_stats.daily_calls, 5);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_record_call_increments_and_persists() {
        let path = temp_config_path("record");
        let _ = fs::remove_file(&path);

        let mut store = ConfigStore::load_from(&path).unwrap();
        store.record_call().unwrap();
        store.record_call().unwrap();

        assert_eq!(store.api_stats.daily_calls, 2);
        assert_eq!(store.api_stats.total_calls, 2);
        assert_eq!(store.api_stats.last_call_date, today());

        let reloaded = ConfigStore::load_from(&path).unwrap();
        assert_eq!(reloaded.api_stats.total_calls, 2);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_resets_stale_daily_counter() {
        let path = temp_config_path("staleload");
        let json = r#"{
            "settings": {"api_key": "", "model": "gemini-1.5-flash-latest", "prompt": "p"},
            "api_stats": {"daily_calls": 9, "last_call_date": "1999-12-31", "total_calls": 20}
        }"#;
        fs::write(&path, json).unwrap();

        let store = ConfigStore::load_from(&path).unwrap();
        assert_eq!(store.api_stats.daily_calls, 0);
        assert_eq!(store.api_stats.last_call_date, today());
        assert_eq!(store.api_stats.total_calls, 20);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_default_prompt_is_nonempty() {
        assert!(!DEFAULT_PROMPT.trim().is_empty());
        assert!(AVAILABLE_MODELS.contains(&DEFAULT_MODEL));
    }
}
