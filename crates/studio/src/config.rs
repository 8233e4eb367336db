use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Advisory processing estimate attached to every new job
    pub estimated_job_secs: f64,
    /// Cap on jobs in `Processing`; unset means every submission is admitted
    pub max_active_jobs: Option<usize>,
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub start_delay_ms: u64,
    pub tick_interval_ms: u64,
    pub min_increment: f64,
    pub max_increment: f64,
    pub failure_rate: f64,
    pub seed: Option<u64>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            estimated_job_secs: 120.0,
            max_active_jobs: None,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 1000,
            tick_interval_ms: 1000,
            min_increment: 5.0,
            max_increment: 20.0,
            failure_rate: 0.0,
            seed: None,
        }
    }
}

pub fn load_config(path: Option<&std::path::Path>) -> Result<StudioConfig> {
    let config = if let Some(config_path) = path {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

            toml::from_str::<StudioConfig>(&contents)
                .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", config_path);
            StudioConfig::default()
        }
    } else {
        tracing::info!("No config path provided, using defaults");
        StudioConfig::default()
    };

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &StudioConfig) -> Result<()> {
    if !config.estimated_job_secs.is_finite() || config.estimated_job_secs <= 0.0 {
        anyhow::bail!("estimated_job_secs must be a positive number of seconds");
    }

    if config.max_active_jobs == Some(0) {
        anyhow::bail!("max_active_jobs must be at least 1 when set");
    }

    let sim = &config.simulator;
    if sim.tick_interval_ms == 0 {
        anyhow::bail!("simulator.tick_interval_ms must be at least 1");
    }

    if !(sim.min_increment >= 0.0 && sim.min_increment <= sim.max_increment) {
        anyhow::bail!("simulator.min_increment must be between 0 and max_increment");
    }

    if !(sim.max_increment > 0.0 && sim.max_increment.is_finite()) {
        anyhow::bail!("simulator.max_increment must be greater than 0");
    }

    if !(0.0..=1.0).contains(&sim.failure_rate) {
        anyhow::bail!("simulator.failure_rate must be between 0.0 and 1.0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn arb_simulator_config() -> impl Strategy<Value = SimulatorConfig> {
        (
            0_u64..5_000,
            1_u64..5_000,
            0.0_f64..10.0,
            0.0_f64..40.0,
            0.0_f64..=1.0,
            prop::option::of(0_u64..i64::MAX as u64),
        )
            .prop_map(
                |(start_delay_ms, tick_interval_ms, min_increment, extra, failure_rate, seed)| {
                    SimulatorConfig {
                        start_delay_ms,
                        tick_interval_ms,
                        min_increment,
                        max_increment: min_increment + extra + 0.5,
                        failure_rate,
                        seed,
                    }
                },
            )
    }

    fn arb_studio_config() -> impl Strategy<Value = StudioConfig> {
        (
            1.0_f64..3600.0,
            prop::option::of(1_usize..16),
            arb_simulator_config(),
        )
            .prop_map(|(estimated_job_secs, max_active_jobs, simulator)| StudioConfig {
                estimated_job_secs,
                max_active_jobs,
                simulator,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// **Feature: lipsync-studio, Property 12: Configuration loading**
        ///
        /// For any valid StudioConfig, writing it as TOML and loading it back
        /// yields the same configuration.
        #[test]
        fn prop_config_round_trip(config in arb_studio_config()) {
            let toml_string = toml::to_string(&config)
                .expect("Failed to serialize config to TOML");

            let mut temp_file = NamedTempFile::new()
                .expect("Failed to create temp file");
            temp_file.write_all(toml_string.as_bytes())
                .expect("Failed to write to temp file");
            temp_file.flush()
                .expect("Failed to flush temp file");

            let loaded_config = load_config(Some(temp_file.path()))
                .expect("Failed to load config from file");

            prop_assert_eq!(config, loaded_config);
        }
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let non_existent_path = PathBuf::from("/tmp/non_existent_lipsync_config_12345.toml");
        let config = load_config(Some(&non_existent_path)).expect("Should load defaults");
        assert_eq!(config, StudioConfig::default());
    }

    #[test]
    fn test_no_config_path_uses_defaults() {
        let config = load_config(None).expect("Should load defaults");
        assert_eq!(config, StudioConfig::default());
    }

    #[test]
    fn test_invalid_toml_syntax() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(b"this is not valid TOML {{{")
            .expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let result = load_config(Some(temp_file.path()));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parse TOML"));
    }

    #[test]
    fn test_partial_config_with_defaults() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let partial_toml = r#"
max_active_jobs = 2

[simulator]
tick_interval_ms = 250
"#;
        temp_file
            .write_all(partial_toml.as_bytes())
            .expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let config = load_config(Some(temp_file.path())).expect("Should load partial config");

        assert_eq!(config.max_active_jobs, Some(2));
        assert_eq!(config.simulator.tick_interval_ms, 250);

        assert_eq!(
            config.estimated_job_secs,
            StudioConfig::default().estimated_job_secs
        );
        assert_eq!(
            config.simulator.max_increment,
            SimulatorConfig::default().max_increment
        );
    }

    #[test]
    fn test_validation_zero_estimate() {
        let config = StudioConfig {
            estimated_job_secs: 0.0,
            ..Default::default()
        };

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("estimated_job_secs"));
    }

    #[test]
    fn test_validation_zero_active_jobs() {
        let config = StudioConfig {
            max_active_jobs: Some(0),
            ..Default::default()
        };

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_active_jobs"));
    }

    #[test]
    fn test_validation_bad_increments() {
        let config = StudioConfig {
            simulator: SimulatorConfig {
                min_increment: 30.0,
                max_increment: 10.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("min_increment"));
    }

    #[test]
    fn test_validation_failure_rate_out_of_range() {
        let config = StudioConfig {
            simulator: SimulatorConfig {
                failure_rate: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("failure_rate"));
    }
}
