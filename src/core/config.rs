//! Run configuration with documented defaults
//!
//! Every knob of a run lives here. Values come from `Default`, a TOML file,
//! or CLI overrides applied by the binary; `validate` runs before anything
//! touches the lattice.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compression::{Algorithm, CompressionVariant};
use crate::core::error::{Result, SimError};
use crate::lattice::Coord;
use crate::particle::ParticleParams;
use crate::scheduler::{ExecutionMode, SchedulerSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    // === LATTICE ===
    /// Points per lattice row
    pub width: i64,

    /// Number of lattice rows
    pub height: i64,

    /// Coordinate of the first point of row 0
    pub origin: Coord,

    // === INITIAL CONFIGURATION ===
    /// Contracted particles to scatter at random when no placement file is given
    pub particles: usize,

    /// JSON placement file; overrides `particles`
    pub placement: Option<PathBuf>,

    /// Extra wall nodes, added on top of any placement walls
    pub walls: Vec<Coord>,

    // === ALGORITHM ===
    pub algorithm: Algorithm,

    /// Sequential skips the compression-status gate; asynchronous applies it
    pub variant: CompressionVariant,

    /// Metropolis bias
    ///
    /// Uphill moves (more tail neighbors than head neighbors) are accepted
    /// with probability `exp((e_head - e_tail) / tau0)`. Smaller values make
    /// compaction more aggressive.
    pub tau0: f64,

    /// Mean of the Poisson activation clock
    pub mu: f64,

    // === SCHEDULING ===
    pub mode: ExecutionMode,

    /// Sequential mode: passes over the particle table
    pub rounds: u32,

    /// Concurrent mode: total turns across all workers
    pub activation_budget: u64,

    /// Concurrent mode: worker tasks (and runtime threads)
    pub workers: usize,

    /// Seeds placement and every particle's generator
    pub seed: u64,

    /// Verify every particle's footprint after the run
    pub audit: bool,

    /// Write `run-<uuid>/tracks.jsonl` under this directory
    pub track_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            origin: Coord::new(0, 0),

            particles: 30,
            placement: None,
            walls: Vec::new(),

            algorithm: Algorithm::Compress,
            variant: CompressionVariant::Asynchronous,
            tau0: 1.0,
            mu: 1.0,

            mode: ExecutionMode::Sequential,
            rounds: 500,
            activation_budget: 15_000,
            workers: 4,
            seed: 12345,
            audit: true,
            track_dir: None,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Reject values that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.width < 1 || self.height < 1 {
            return Err(SimError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        if !self.tau0.is_finite() || self.tau0 <= 0.0 {
            return Err(SimError::InvalidParameter(format!("tau0 must be positive, got {}", self.tau0)));
        }
        if !self.mu.is_finite() || self.mu <= 0.0 {
            return Err(SimError::InvalidParameter(format!("mu must be positive, got {}", self.mu)));
        }

        if self.mode == ExecutionMode::Concurrent && self.workers == 0 {
            return Err(SimError::InvalidParameter("concurrent mode needs at least one worker".into()));
        }

        Ok(())
    }

    pub fn particle_params(&self) -> ParticleParams {
        ParticleParams {
            mu: self.mu,
            tau0: self.tau0,
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            algorithm: self.algorithm,
            variant: self.variant,
            rounds: self.rounds,
            activation_budget: self.activation_budget,
            workers: self.workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = RunConfig { width: 0, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidDimensions { width: 0, height: 20 })
        ));
    }

    #[test]
    fn test_bad_parameters_rejected() {
        for config in [
            RunConfig { tau0: 0.0, ..Default::default() },
            RunConfig { tau0: f64::INFINITY, ..Default::default() },
            RunConfig { mu: -1.0, ..Default::default() },
            RunConfig {
                mode: ExecutionMode::Concurrent,
                workers: 0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().unwrap_err().is_configuration());
        }
    }

    #[test]
    fn test_sequential_mode_ignores_workers() {
        let config = RunConfig { workers: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = RunConfig::from_toml_str(
            r#"
            width = 8
            height = 6
            mode = "concurrent"
            variant = "sequential"
            algorithm = "random_move"
            tau0 = 0.5
            walls = [[4, 2], [6, 2]]
            "#,
        )
        .unwrap();

        assert_eq!((config.width, config.height), (8, 6));
        assert_eq!(config.mode, ExecutionMode::Concurrent);
        assert_eq!(config.variant, CompressionVariant::Sequential);
        assert_eq!(config.algorithm, Algorithm::RandomMove);
        assert_eq!(config.walls, vec![Coord::new(4, 2), Coord::new(6, 2)]);
        assert_eq!(config.seed, RunConfig::default().seed);
    }

    #[test]
    fn test_toml_unknown_key_rejected() {
        let err = RunConfig::from_toml_str("lambda = 3.0").unwrap_err();
        assert!(matches!(err, SimError::Toml(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_toml_invalid_values_rejected() {
        let err = RunConfig::from_toml_str("height = -2").unwrap_err();
        assert!(matches!(err, SimError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_settings_carry_over() {
        let config = RunConfig { rounds: 7, workers: 2, ..Default::default() };
        let settings = config.scheduler_settings();
        assert_eq!(settings.rounds, 7);
        assert_eq!(settings.workers, 2);
        assert_eq!(config.particle_params().tau0, 1.0);
    }
}
