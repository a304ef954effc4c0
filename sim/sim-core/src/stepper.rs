//! Fixed-step driver for variable frame times.
//!
//! [`World::update`] always advances by exactly one timestep. The [`Stepper`]
//! turns wall-clock frame durations into a whole number of those steps,
//! carrying the remainder to the next frame.
//!
//! # Example
//!
//! ```
//! use sim_core::{Shape, Stepper, World};
//! use sim_types::{Pose, SimulationConfig};
//! use nalgebra::Point3;
//!
//! let mut world = World::new(SimulationConfig::default()).unwrap();
//! let ball = world.create_rigid_body(false);
//! world.add_shape(ball, Shape::sphere(0.5)).unwrap();
//! world.set_body_pose(ball, Pose::from_position(Point3::new(0.0, 0.0, 10.0))).unwrap();
//!
//! let mut stepper = Stepper::new();
//! // A 25 ms frame at 100 Hz runs two steps and keeps 5 ms for later.
//! let steps = stepper.advance(&mut world, 0.025).unwrap();
//! assert_eq!(steps, 2);
//! assert!((stepper.alpha(&world) - 0.5).abs() < 1e-9);
//! ```

use sim_types::Result;
use tracing::{trace, warn};

use crate::events::StepReport;
use crate::world::World;

/// Accumulates frame time and runs whole world steps.
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    accumulator: f64,
    dropped_time: f64,
}

impl Stepper {
    /// Create a stepper with an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time waiting to be simulated.
    #[must_use]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Total time discarded because a frame needed more than
    /// `max_steps_per_frame` steps.
    #[must_use]
    pub fn dropped_time(&self) -> f64 {
        self.dropped_time
    }

    /// Fraction of a step left in the accumulator, for interpolating
    /// between the previous and current poses.
    #[must_use]
    pub fn alpha(&self, world: &World) -> f64 {
        (self.accumulator / world.timestep()).clamp(0.0, 1.0)
    }

    /// Add `elapsed` seconds and run as many whole steps as fit.
    ///
    /// At most `max_steps_per_frame` steps run; any time beyond that is
    /// dropped so a slow frame cannot snowball. Negative or non-finite
    /// durations are ignored. Returns the number of steps run.
    pub fn advance(&mut self, world: &mut World, elapsed: f64) -> Result<usize> {
        if !elapsed.is_finite() || elapsed <= 0.0 {
            return Ok(0);
        }
        let dt = world.timestep();
        let max_steps = world.config().max_steps_per_frame;
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= dt && steps < max_steps {
            world.update()?;
            self.accumulator -= dt;
            steps += 1;
        }

        if self.accumulator >= dt {
            let excess = self.accumulator - self.accumulator % dt;
            warn!(
                max_steps,
                dropped = excess,
                "frame exceeded step budget, dropping accumulated time"
            );
            self.dropped_time += excess;
            self.accumulator -= excess;
        }

        trace!(steps, remainder = self.accumulator, "frame advanced");
        Ok(steps)
    }

    /// Forget any accumulated time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Run exactly `steps` world updates, returning every report.
pub fn run_steps(world: &mut World, steps: usize) -> Result<Vec<StepReport>> {
    let mut reports = Vec::with_capacity(steps);
    for _ in 0..steps {
        reports.push(world.update()?);
    }
    Ok(reports)
}

/// Run whole steps until at least `duration` seconds have been simulated.
///
/// Returns the number of steps run.
pub fn run_for(world: &mut World, duration: f64) -> Result<u64> {
    if !duration.is_finite() || duration <= 0.0 {
        return Ok(0);
    }
    let start = world.step_count();
    let target = world.time() + duration;
    // Tolerance keeps 1.0 / 0.01 from running a 101st step.
    let tolerance = world.timestep() * 1e-6;
    while world.time() + tolerance < target {
        world.update()?;
    }
    Ok(world.step_count() - start)
}
