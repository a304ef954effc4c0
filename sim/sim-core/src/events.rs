//! Notifications and per-step reports emitted by the world.
//!
//! Events are buffered in the world and drained by the caller with
//! [`World::drain_events`](crate::World::drain_events). Collision events are
//! also handed back in each [`StepReport`]. Nothing in the simulation
//! depends on them being read.

use nalgebra::{Point3, Vector3};
use sim_contact::{ContactConstraint, ContactKey};
use sim_types::{BodyId, ShapeId, ShapePair};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Something observable that happened in the world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WorldEvent {
    /// A shape was attached to a body.
    ShapeAttached {
        /// The shape.
        shape: ShapeId,
        /// Its new owner.
        body: BodyId,
    },
    /// A shape was detached from a body.
    ShapeDetached {
        /// The shape.
        shape: ShapeId,
        /// Its former owner.
        body: BodyId,
    },
    /// A pair started penetrating this step.
    CollisionEntered(ContactReport),
    /// A pair that penetrated last step no longer does.
    CollisionExited {
        /// The shape pair.
        pair: ShapePair,
        /// Owner of `pair.first()` when the contact was last seen.
        body_a: BodyId,
        /// Owner of `pair.second()` when the contact was last seen.
        body_b: BodyId,
    },
}

/// A solved contact, as seen at the end of the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactReport {
    /// Shape pair and owning bodies.
    pub key: ContactKey,
    /// Contact normal, first shape toward second.
    pub normal: Vector3<f64>,
    /// Signed separation at detection time (negative).
    pub separation: f64,
    /// Witness point on the first shape.
    pub point_a: Point3<f64>,
    /// Witness point on the second shape.
    pub point_b: Point3<f64>,
    /// Accumulated normal impulse after the solve.
    pub normal_impulse: f64,
    /// Accumulated tangent impulses after the solve.
    pub tangent_impulse: [f64; 2],
}

impl ContactReport {
    pub(crate) fn new(
        constraint: &ContactConstraint,
        point_a: Point3<f64>,
        point_b: Point3<f64>,
    ) -> Self {
        Self {
            key: constraint.key(),
            normal: constraint.normal(),
            separation: constraint.separation(),
            point_a,
            point_b,
            normal_impulse: constraint.normal_impulse(),
            tangent_impulse: constraint.tangent_impulse(),
        }
    }

    /// The shape pair.
    #[must_use]
    pub fn pair(&self) -> ShapePair {
        self.key.pair
    }

    /// Penetration depth at detection time.
    #[must_use]
    pub fn depth(&self) -> f64 {
        (-self.separation).max(0.0)
    }
}

/// Summary of one fixed step.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Step number (1 for the first step of a world).
    pub step: u64,
    /// Leaf pairs enumerated by the broad phase, duplicates included.
    pub candidate_pairs: usize,
    /// Narrow-phase calls made.
    pub narrow_phase_tests: usize,
    /// Every contact solved this step, in solve order.
    pub contacts: Vec<ContactReport>,
    /// Collisions that started or ended this step.
    pub events: Vec<WorldEvent>,
}

impl StepReport {
    /// Report for a given pair, if it was in contact.
    #[must_use]
    pub fn contact(&self, pair: ShapePair) -> Option<&ContactReport> {
        self.contacts.iter().find(|c| c.key.pair == pair)
    }
}
