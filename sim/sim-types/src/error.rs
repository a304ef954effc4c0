//! Error types for simulation operations.

use thiserror::Error;

use crate::{BodyId, ShapeId};

/// Errors that can occur while building or stepping a world.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Body handle is stale or was never issued by this world.
    #[error("invalid body ID: {0}")]
    InvalidBodyId(BodyId),

    /// Shape handle is stale or was never issued by this world.
    #[error("invalid shape ID: {0}")]
    InvalidShapeId(ShapeId),

    /// Shape is already owned by a different body.
    #[error("{shape} is already attached to {owner}")]
    ShapeAttachedElsewhere {
        /// The shape being attached.
        shape: ShapeId,
        /// The body that currently owns it.
        owner: BodyId,
    },

    /// Shape geometry or mass is unusable.
    #[error("invalid shape: {reason}")]
    InvalidShape {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Simulation diverged (`NaN` or `Inf` detected).
    #[error("simulation diverged: {reason}")]
    Diverged {
        /// Description of what went wrong.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },
}

impl SimError {
    /// Create a diverged error.
    #[must_use]
    pub fn diverged(reason: impl Into<String>) -> Self {
        Self::Diverged {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create an invalid shape error.
    #[must_use]
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    /// Check if this is a divergence error.
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        matches!(self, Self::Diverged { .. })
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidTimestep(_))
    }

    /// Check if this error comes from a stale or unknown handle.
    #[must_use]
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::InvalidBodyId(_) | Self::InvalidShapeId(_))
    }
}
