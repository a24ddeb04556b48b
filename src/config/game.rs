use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// One species taking part in a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesEntry {
    /// Species name as reported by its strategy, e.g. "Ant" for `ant.rhai`.
    pub name: String,
    /// Player that owns this species. Defaults to the species name.
    #[serde(default)]
    pub owner: Option<String>,
    /// Overrides `critters_per_species` for this entry.
    #[serde(default)]
    pub count: Option<usize>,
}

/// A species entry with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub species: String,
    pub owner: String,
    pub count: usize,
}

/// Setup of a single game: arena size, seed, starting food and who plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// 0 picks a random seed.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_initial_food")]
    pub initial_food: usize,
    #[serde(default = "default_critters_per_species")]
    pub critters_per_species: usize,
    #[serde(default = "default_species")]
    pub species: Vec<SpeciesEntry>,
}

fn default_width() -> u32 {
    45
}
fn default_height() -> u32 {
    37
}
fn default_initial_food() -> usize {
    37
}
fn default_critters_per_species() -> usize {
    22
}
fn default_species() -> Vec<SpeciesEntry> {
    ["Ant", "Bird"]
        .iter()
        .map(|name| SpeciesEntry {
            name: name.to_string(),
            owner: None,
            count: None,
        })
        .collect()
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            width: default_width(),
            height: default_height(),
            seed: 0,
            initial_food: default_initial_food(),
            critters_per_species: default_critters_per_species(),
            species: default_species(),
        }
    }
}

impl GameConfig {
    /// Load a game setup from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.width == 0 || self.height == 0 {
            errors.push(format!(
                "width and height must be > 0, got {}x{}",
                self.width, self.height
            ));
        }
        if self.species.is_empty() {
            errors.push("species must list at least one entry".to_string());
        }

        let mut seen = BTreeSet::new();
        for entry in self.roster() {
            if entry.species.trim().is_empty() {
                errors.push("species name must not be empty".to_string());
            } else if !seen.insert((entry.owner.clone(), entry.species.clone())) {
                errors.push(format!(
                    "species '{}' listed twice for owner '{}'",
                    entry.species, entry.owner
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    /// Species entries with owner and count resolved.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.species
            .iter()
            .map(|entry| RosterEntry {
                species: entry.name.clone(),
                owner: entry.owner.clone().unwrap_or_else(|| entry.name.clone()),
                count: entry.count.unwrap_or(self.critters_per_species),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        config.validate().unwrap();
        assert_eq!((config.width, config.height), (45, 37));
        assert_eq!(config.roster().len(), 2);
    }

    #[test]
    fn from_toml_string() {
        let toml_str = r#"
width = 60
height = 50
seed = 42
critters_per_species = 10

[[species]]
name = "Hippo"
owner = "alice"

[[species]]
name = "Stone"
count = 3
"#;
        let config: GameConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.initial_food, 37);

        let roster = config.roster();
        assert_eq!(
            roster[0],
            RosterEntry {
                species: "Hippo".to_string(),
                owner: "alice".to_string(),
                count: 10,
            }
        );
        assert_eq!(roster[1].owner, "Stone");
        assert_eq!(roster[1].count, 3);
    }

    #[test]
    fn zero_dimension_rejected() {
        let config = GameConfig {
            width: 0,
            ..GameConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("width"), "Error: {}", err);
    }

    #[test]
    fn duplicate_species_for_same_owner_rejected() {
        let entry = SpeciesEntry {
            name: "Ant".to_string(),
            owner: None,
            count: None,
        };
        let config = GameConfig {
            species: vec![entry.clone(), entry],
            ..GameConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("listed twice"), "Error: {}", err);
    }

    #[test]
    fn empty_roster_and_bad_size_reported_together() {
        let config = GameConfig {
            height: 0,
            species: Vec::new(),
            ..GameConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("height"));
        assert!(err.contains("at least one"));
    }

    #[test]
    fn from_file_valid() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmpfile,
            r#"
width = 20
height = 10

[[species]]
name = "Bird"
"#
        )
        .unwrap();

        let config = GameConfig::from_file(tmpfile.path()).unwrap();
        assert_eq!(config.width, 20);
        assert_eq!(config.roster()[0].species, "Bird");
    }

    #[test]
    fn from_file_missing() {
        let err = GameConfig::from_file(Path::new("/nonexistent/game.toml")).unwrap_err();
        assert!(err.contains("Cannot read"), "Error: {}", err);
    }

    #[test]
    fn from_file_invalid_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "this is not valid toml {{{{").unwrap();

        let err = GameConfig::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("Invalid TOML"), "Error: {}", err);
    }
}
