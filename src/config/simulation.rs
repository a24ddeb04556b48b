use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::simulation::EngineRules;

/// Engine rules plus how the runner drives them.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f32,
    /// Stop after this many turns; 0 runs until a winner emerges.
    #[serde(default)]
    pub max_turns: u64,
    #[serde(default = "default_food_per_turn")]
    pub food_per_turn: usize,
    #[serde(default = "default_sleep_turns")]
    pub sleep_turns: u32,
    #[serde(default = "default_visibility_radius")]
    pub visibility_radius: u32,
    #[serde(default = "default_strategy_timeout_ms")]
    pub strategy_timeout_ms: u64,
    #[serde(default = "default_strategy_directory")]
    pub strategy_directory: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

/// Slowest accepted tick rate: one turn every 1000 seconds.
pub const MIN_TICK_RATE_HZ: f32 = 0.001;

fn default_tick_rate() -> f32 {
    5.0
}
fn default_food_per_turn() -> usize {
    2
}
fn default_sleep_turns() -> u32 {
    5
}
fn default_visibility_radius() -> u32 {
    10
}
fn default_strategy_timeout_ms() -> u64 {
    100
}
fn default_strategy_directory() -> String {
    "./strategies".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_rate_hz: default_tick_rate(),
            max_turns: 0,
            food_per_turn: default_food_per_turn(),
            sleep_turns: default_sleep_turns(),
            visibility_radius: default_visibility_radius(),
            strategy_timeout_ms: default_strategy_timeout_ms(),
            strategy_directory: default_strategy_directory(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz < MIN_TICK_RATE_HZ {
            errors.push(format!(
                "tick_rate_hz must be a finite value >= {}, got {}. Example: tick_rate_hz = 5.0",
                MIN_TICK_RATE_HZ, self.tick_rate_hz
            ));
        }

        if self.sleep_turns == 0 {
            errors.push(format!(
                "sleep_turns must be > 0, got {}. Example: sleep_turns = 5",
                self.sleep_turns
            ));
        }

        if self.strategy_timeout_ms == 0 {
            errors.push(format!(
                "strategy_timeout_ms must be > 0, got {}. Example: strategy_timeout_ms = 100",
                self.strategy_timeout_ms
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Target wall-clock time between turns.
    pub fn tick_interval(&self) -> Result<Duration, String> {
        Duration::try_from_secs_f32(1.0 / self.tick_rate_hz)
            .map_err(|e| format!("tick_rate_hz {} gives no usable interval: {}", self.tick_rate_hz, e))
    }

    pub fn rules(&self) -> EngineRules {
        EngineRules {
            food_per_turn: self.food_per_turn,
            sleep_turns: self.sleep_turns,
            visibility_radius: self.visibility_radius,
            strategy_timeout_ms: self.strategy_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-config.toml")
    }

    #[test]
    fn valid_config_loads_all_fields() {
        let toml = r#"
            tick_rate_hz = 2.0
            max_turns = 500
            food_per_turn = 4
            sleep_turns = 3
            visibility_radius = 6
            strategy_timeout_ms = 50
            strategy_directory = "./my-strategies"
            log_level = "debug"
            json_logs = true
        "#;
        let config = SimulationConfig::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(config.tick_rate_hz, 2.0);
        assert_eq!(config.max_turns, 500);
        assert_eq!(config.food_per_turn, 4);
        assert_eq!(config.sleep_turns, 3);
        assert_eq!(config.visibility_radius, 6);
        assert_eq!(config.strategy_timeout_ms, 50);
        assert_eq!(config.strategy_directory, "./my-strategies");
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
    }

    #[test]
    fn defaults_applied_for_empty_config() {
        let config = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        assert_eq!(config.tick_rate_hz, 5.0);
        assert_eq!(config.max_turns, 0);
        assert_eq!(config.strategy_directory, "./strategies");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert_eq!(config.rules(), EngineRules::default());
    }

    #[test]
    fn invalid_tick_rate_rejected() {
        let err = SimulationConfig::from_toml_str("tick_rate_hz = -1.0", &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains(">= 0.001"));
    }

    #[test]
    fn vanishing_tick_rate_rejected() {
        let err = SimulationConfig::from_toml_str("tick_rate_hz = 1e-30", &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));

        let config = SimulationConfig {
            tick_rate_hz: 1e-30,
            ..SimulationConfig::default()
        };
        assert!(config.tick_interval().is_err());
    }

    #[test]
    fn tick_interval_follows_rate() {
        let config = SimulationConfig {
            tick_rate_hz: 4.0,
            ..SimulationConfig::default()
        };
        assert_eq!(config.tick_interval().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn zero_sleep_turns_rejected() {
        let err = SimulationConfig::from_toml_str("sleep_turns = 0", &test_path()).unwrap_err();
        assert!(err.contains("sleep_turns"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"log_level = "verbose""#, &test_path()).unwrap_err();
        assert!(err.contains("log_level"));
    }

    #[test]
    fn multiple_errors_reported_together() {
        let toml = "tick_rate_hz = 0.0\nsleep_turns = 0\nstrategy_timeout_ms = 0";
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("tick_rate_hz"));
        assert!(err.contains("sleep_turns"));
        assert!(err.contains("strategy_timeout_ms"));
    }

    #[test]
    fn malformed_toml_includes_source_path() {
        let err =
            SimulationConfig::from_toml_str("tick_rate_hz = [invalid", &test_path()).unwrap_err();
        assert!(err.contains("test-config.toml"));
    }

    #[test]
    fn from_file_loads_valid_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(tmp, "food_per_turn = 0").unwrap();
        let config = SimulationConfig::from_file(tmp.path()).unwrap();
        assert_eq!(config.rules().food_per_turn, 0);
    }

    #[test]
    fn from_file_missing_file_error() {
        let err = SimulationConfig::from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.contains("Cannot read"));
    }
}
