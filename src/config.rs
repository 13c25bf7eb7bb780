// Run configuration, loaded from config.toml.
use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::features::{FeatureOptions, KoEncoding};
use crate::preprocess::ScalerFit;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory containing `input/<competition>/`.
    pub input_prefix: String,
    pub competition: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub include_effects: bool,
    pub p2_ko_encoding: KoEncoding,
    pub scale_damage: bool,
    pub scaler_fit: ScalerFit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub max_iterations: u64,
    /// L2 penalty strength.
    pub alpha: f64,
    pub gradient_tolerance: f64,
    /// Share of the training set held out for the accuracy report. 0 disables it.
    pub validation_fraction: f64,
    pub seed: u64,
    pub plot_path: String,
    pub top_features: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            input_prefix: ".".to_string(),
            competition: "fds-pokemon-battles-prediction-2025".to_string(),
            output: "submission.csv".to_string(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            include_effects: false,
            p2_ko_encoding: KoEncoding::Any,
            scale_damage: true,
            scaler_fit: ScalerFit::PerTable,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            max_iterations: 10_000,
            alpha: 1.0,
            gradient_tolerance: 1e-4,
            validation_fraction: 0.2,
            seed: 42,
            plot_path: "feature_importances.png".to_string(),
            top_features: 25,
        }
    }
}

impl FeatureConfig {
    pub fn options(&self) -> FeatureOptions {
        FeatureOptions {
            ko_encoding: self.p2_ko_encoding,
            include_effects: self.include_effects,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BattleError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| BattleError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BattleError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = self.model.validation_fraction;
        if !(0.0..1.0).contains(&fraction) {
            return Err(BattleError::Config(format!(
                "validation_fraction must be in [0, 1), got {}",
                fraction
            )));
        }
        if self.model.max_iterations == 0 {
            return Err(BattleError::Config("max_iterations must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn partial_file_keeps_defaults() -> std::result::Result<(), Box<dyn Error>> {
        let config: Config = toml::from_str(
            "[features]\np2_ko_encoding = \"per_slot\"\nscaler_fit = \"train\"\n\n[model]\nseed = 7\n",
        )?;
        assert_eq!(config.features.p2_ko_encoding, KoEncoding::PerSlot);
        assert_eq!(config.features.scaler_fit, ScalerFit::Train);
        assert!(config.features.scale_damage);
        assert_eq!(config.model.seed, 7);
        assert_eq!(config.model.max_iterations, 10_000);
        assert_eq!(config.data, DataConfig::default());
        Ok(())
    }

    #[test]
    fn save_then_load() -> std::result::Result<(), Box<dyn Error>> {
        let path = std::env::temp_dir().join("battle_predictor_config.toml");
        let path = path.to_str().ok_or("non-utf8 temp dir")?;
        let mut config = Config::default();
        config.features.include_effects = true;
        config.save(path)?;
        assert_eq!(Config::load(path)?, config);
        Ok(())
    }

    #[test]
    fn rejects_bad_validation_fraction() {
        let mut config = Config::default();
        config.model.validation_fraction = 1.0;
        assert!(config.validate().is_err());
    }
}
