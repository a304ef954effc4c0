//! Configuration types for a simulation world.
//!
//! Everything here is plain scalar/vector data with defaults, builder-style
//! setters and a `validate` pass. There is no file-based configuration.

use nalgebra::{Point3, Vector3};

use crate::dynamics::Gravity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Fixed timestep for one world update (seconds).
    pub timestep: f64,
    /// Gravity configuration.
    pub gravity: Gravity,
    /// Broad-phase octree configuration.
    pub octree: OctreeConfig,
    /// Contact solver configuration.
    pub solver: SolverConfig,
    /// Upper bound on fixed steps run for one frame of elapsed time.
    pub max_steps_per_frame: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 100.0,
            gravity: Gravity::earth(),
            octree: OctreeConfig::default(),
            solver: SolverConfig::default(),
            max_steps_per_frame: 8,
        }
    }
}

impl SimulationConfig {
    /// Configuration for interactive use (60 Hz).
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            ..Default::default()
        }
    }

    /// Configuration for small steps (240 Hz) with more catch-up headroom.
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 1.0 / 240.0,
            max_steps_per_frame: 16,
            ..Default::default()
        }
    }

    /// Set the timestep.
    #[must_use]
    pub fn with_timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set the gravity.
    #[must_use]
    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the octree configuration.
    #[must_use]
    pub fn with_octree(mut self, octree: OctreeConfig) -> Self {
        self.octree = octree;
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(crate::SimError::InvalidTimestep(self.timestep));
        }

        if self.timestep > 1.0 {
            return Err(crate::SimError::invalid_config(
                "timestep > 1 second is likely an error",
            ));
        }

        if !self.gravity.acceleration.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        if self.max_steps_per_frame == 0 {
            return Err(crate::SimError::invalid_config(
                "max_steps_per_frame must be at least 1",
            ));
        }

        self.octree.validate()?;
        self.solver.validate()?;

        Ok(())
    }
}

/// Broad-phase octree parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OctreeConfig {
    /// Center of the root region.
    pub center: Point3<f64>,
    /// Full edge lengths of the root region.
    pub extent: Vector3<f64>,
    /// A node whose largest edge is at or below this never subdivides.
    pub min_node_size: f64,
    /// Occupancy at which a leaf subdivides.
    pub max_shapes_per_node: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            center: Point3::origin(),
            extent: Vector3::new(1000.0, 1000.0, 1000.0),
            min_node_size: 20.0,
            max_shapes_per_node: 20,
        }
    }
}

impl OctreeConfig {
    /// Cubic root region of edge `size` centered at the origin.
    #[must_use]
    pub fn cube(size: f64) -> Self {
        Self {
            extent: Vector3::new(size, size, size),
            ..Default::default()
        }
    }

    /// Set the minimum node size.
    #[must_use]
    pub fn min_node_size(mut self, size: f64) -> Self {
        self.min_node_size = size;
        self
    }

    /// Set the leaf occupancy threshold.
    #[must_use]
    pub fn max_shapes_per_node(mut self, count: usize) -> Self {
        self.max_shapes_per_node = count;
        self
    }

    /// Validate the configuration.
    ///
    /// A zero occupancy threshold or a non-positive minimum size would let
    /// subdivision recurse without bound. A zero-size root region is allowed;
    /// it simply never subdivides.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_shapes_per_node == 0 {
            return Err(crate::SimError::invalid_config(
                "max_shapes_per_node must be at least 1",
            ));
        }

        if !self.min_node_size.is_finite() || self.min_node_size <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "min_node_size must be positive and finite",
            ));
        }

        if !self.extent.iter().all(|x| x.is_finite() && *x >= 0.0) {
            return Err(crate::SimError::invalid_config(
                "octree extent must be finite and non-negative",
            ));
        }

        if !self.center.coords.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_config("octree center must be finite"));
        }

        Ok(())
    }
}

/// Contact solver parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Closing speed above which restitution adds a bounce bias.
    ///
    /// The bias applies when the relative normal velocity is below
    /// `-restitution_velocity_threshold`.
    pub restitution_velocity_threshold: f64,
    /// Fraction of penetration depth (beyond the slop) removed per step
    /// through a velocity bias. Zero disables penetration recovery.
    pub penetration_bias_factor: f64,
    /// Penetration depth tolerated without any recovery bias.
    pub penetration_slop: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            restitution_velocity_threshold: 1.0,
            penetration_bias_factor: 0.2,
            penetration_slop: 0.005,
        }
    }
}

impl SolverConfig {
    /// Restitution-only biasing. Overlapping bodies at rest stay overlapping.
    #[must_use]
    pub fn restitution_only() -> Self {
        Self {
            penetration_bias_factor: 0.0,
            ..Default::default()
        }
    }

    /// Set the penetration recovery factor.
    #[must_use]
    pub fn penetration_bias_factor(mut self, factor: f64) -> Self {
        self.penetration_bias_factor = factor;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.restitution_velocity_threshold.is_finite()
            || self.restitution_velocity_threshold < 0.0
        {
            return Err(crate::SimError::invalid_config(
                "restitution_velocity_threshold must be non-negative and finite",
            ));
        }

        if !(0.0..=1.0).contains(&self.penetration_bias_factor) {
            return Err(crate::SimError::invalid_config(
                "penetration_bias_factor must be in [0, 1]",
            ));
        }

        if !self.penetration_slop.is_finite() || self.penetration_slop < 0.0 {
            return Err(crate::SimError::invalid_config(
                "penetration_slop must be non-negative and finite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::SimError;

    #[test]
    fn test_default_config_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timestep, 0.01);
        assert_eq!(config.octree.max_shapes_per_node, 20);
        assert_eq!(config.octree.min_node_size, 20.0);
        assert_eq!(config.octree.extent.x, 1000.0);
    }

    #[test]
    fn test_presets_valid() {
        assert!(SimulationConfig::realtime().validate().is_ok());
        assert!(SimulationConfig::high_fidelity().validate().is_ok());
        assert!(SimulationConfig::default().zero_gravity().validate().is_ok());
    }

    #[test]
    fn test_invalid_timestep() {
        let config = SimulationConfig::default().with_timestep(0.0);
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidTimestep(_))
        ));

        let config = SimulationConfig::default().with_timestep(f64::NAN);
        assert!(config.validate().is_err());

        let config = SimulationConfig::default().with_timestep(2.0);
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_octree_validation() {
        assert!(OctreeConfig::cube(100.0).validate().is_ok());
        assert!(OctreeConfig::cube(0.0).validate().is_ok());
        assert!(OctreeConfig::default().max_shapes_per_node(0).validate().is_err());
        assert!(OctreeConfig::default().min_node_size(0.0).validate().is_err());
        assert!(OctreeConfig::default().min_node_size(-1.0).validate().is_err());
    }

    #[test]
    fn test_solver_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::restitution_only().validate().is_ok());
        assert!(SolverConfig::default()
            .penetration_bias_factor(1.5)
            .validate()
            .is_err());
    }
}
