//! Simulation world container and fixed-step pipeline.
//!
//! The [`World`] owns every body, shape and broad-phase entry. All mutation
//! goes through its methods so that bounding boxes, the octree and body mass
//! never drift out of sync.
//!
//! # Step pipeline
//!
//! ```text
//! update()
//!   1. detect      octree leaf pairs → AABB overlap → filters → narrow phase
//!                  → one ContactConstraint per penetrating pair
//!   2. simulate    integrate forces → solve (one iterate per contact,
//!                  canonical pair order) → integrate transforms
//!   3. clear       drop contacts, zero force/torque accumulators
//! ```

use std::collections::BTreeMap;

use hashbrown::HashSet;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use slotmap::SlotMap;
use sim_contact::{ContactConstraint, ContactKey, ContactManifold, ContactMaterial};
use sim_types::{BodyId, Gravity, Pose, Result, ShapeId, ShapePair, SimError, SimulationConfig};
use tracing::{debug, trace, warn};

use crate::body::RigidBody;
use crate::broad_phase::{Aabb, Octree};
use crate::events::{ContactReport, StepReport, WorldEvent};
use crate::integrators::{integrate_forces, integrate_pose};
use crate::narrow_phase::{GjkEpa, NarrowPhase};
use crate::raycast::{ray_shape, RayHit};
use crate::shape::{Shape, ShapeKind};

/// A contact built during detection, alive until the end of the step.
#[derive(Debug, Clone)]
struct LiveContact {
    constraint: ContactConstraint,
    manifold: ContactManifold,
}

/// The simulation world.
///
/// # Example
///
/// ```
/// use sim_core::{Shape, World};
/// use sim_types::{Pose, SimulationConfig};
/// use nalgebra::{Point3, Vector3};
///
/// let mut world = World::new(SimulationConfig::default()).unwrap();
///
/// let ground = world.create_rigid_body(true);
/// world.add_shape(ground, Shape::cube(Vector3::new(10.0, 10.0, 1.0))).unwrap();
/// world.set_body_pose(ground, Pose::from_position(Point3::new(0.0, 0.0, -1.0))).unwrap();
///
/// let ball = world.create_rigid_body(false);
/// world.add_shape(ball, Shape::sphere(0.5)).unwrap();
/// world.set_body_pose(ball, Pose::from_position(Point3::new(0.0, 0.0, 2.0))).unwrap();
///
/// for _ in 0..300 {
///     world.update().unwrap();
/// }
///
/// // Settled on the ground instead of falling through.
/// let z = world.body(ball).unwrap().position().z;
/// assert!(z > 0.4 && z < 0.6);
/// ```
#[derive(Debug)]
pub struct World {
    config: SimulationConfig,
    time: f64,
    step_count: u64,
    bodies: SlotMap<BodyId, RigidBody>,
    shapes: SlotMap<ShapeId, Shape>,
    octree: Octree,
    narrow_phase: Box<dyn NarrowPhase>,
    /// Contacts of the current step, ordered by canonical pair.
    contacts: BTreeMap<ShapePair, LiveContact>,
    /// Pairs already handled this step.
    tested_pairs: HashSet<ShapePair>,
    /// Pairs penetrating at the end of the previous step.
    touching: BTreeMap<ShapePair, (BodyId, BodyId)>,
    events: Vec<WorldEvent>,
    buffer_events: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::build(SimulationConfig::default(), Box::new(GjkEpa))
    }
}

impl World {
    /// Create an empty world with the default narrow phase.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Self::with_narrow_phase(config, GjkEpa)
    }

    /// Create an empty world with a custom narrow phase.
    pub fn with_narrow_phase(
        config: SimulationConfig,
        narrow_phase: impl NarrowPhase + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Box::new(narrow_phase)))
    }

    fn build(config: SimulationConfig, narrow_phase: Box<dyn NarrowPhase>) -> Self {
        debug!(
            timestep = config.timestep,
            max_shapes_per_node = config.octree.max_shapes_per_node,
            min_node_size = config.octree.min_node_size,
            "world created"
        );
        Self {
            octree: Octree::new(config.octree),
            config,
            time: 0.0,
            step_count: 0,
            bodies: SlotMap::with_key(),
            shapes: SlotMap::with_key(),
            narrow_phase,
            contacts: BTreeMap::new(),
            tested_pairs: HashSet::new(),
            touching: BTreeMap::new(),
            events: Vec::new(),
            buffer_events: true,
        }
    }

    /// Get the simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulated time in seconds.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Fixed step duration.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Replace the gravity field.
    pub fn set_gravity(&mut self, gravity: Gravity) {
        self.config.gravity = gravity;
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of shapes, attached or not.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// The broad-phase octree.
    #[must_use]
    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    // =========================================================================
    // Bodies
    // =========================================================================

    /// Create a body at the origin, at rest and active.
    pub fn create_rigid_body(&mut self, is_static: bool) -> BodyId {
        let id = self.bodies.insert(RigidBody::new(is_static));
        debug!(body = %id, is_static, "rigid body created");
        id
    }

    /// Remove a body. Its shapes are detached first and stay in the world.
    pub fn remove_rigid_body(&mut self, id: BodyId) -> Result<RigidBody> {
        let shapes = self
            .bodies
            .get(id)
            .ok_or(SimError::InvalidBodyId(id))?
            .shapes()
            .to_vec();
        for shape in shapes {
            self.detach_shape(shape)?;
        }
        let body = self.bodies.remove(id).ok_or(SimError::InvalidBodyId(id))?;
        debug!(body = %id, "rigid body removed");
        Ok(body)
    }

    /// Get a body.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id)
    }

    /// Get a body mutably (forces, velocities, damping).
    #[must_use]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id)
    }

    /// Iterate over bodies in slot order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.bodies.iter()
    }

    /// Move a body. Refreshes world inertia, shape boxes and the octree, and
    /// marks the body active.
    pub fn set_body_pose(&mut self, id: BodyId, pose: Pose) -> Result<()> {
        self.bodies
            .get_mut(id)
            .ok_or(SimError::InvalidBodyId(id))?
            .set_pose(pose);
        self.sync_shapes(id);
        Ok(())
    }

    /// Move a body to a position and orientation.
    pub fn set_body_transform(
        &mut self,
        id: BodyId,
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Result<()> {
        self.set_body_pose(id, Pose::from_position_rotation(position, rotation))
    }

    fn sync_shapes(&mut self, id: BodyId) {
        let Some(body) = self.bodies.get(id) else {
            return;
        };
        let pose = *body.pose();
        for shape_id in body.shapes() {
            if let Some(shape) = self.shapes.get_mut(*shape_id) {
                shape.sync(&pose);
                self.octree.update(*shape_id, *shape.aabb());
            }
        }
    }

    fn refresh_mass(&mut self, id: BodyId) {
        let Some(body) = self.bodies.get_mut(id) else {
            return;
        };
        let contributions: Vec<_> = body
            .shapes()
            .iter()
            .filter_map(|s| self.shapes.get(*s))
            .map(Shape::contribution)
            .collect();
        body.update_mass(contributions.into_iter());
    }

    // =========================================================================
    // Shapes
    // =========================================================================

    /// Register an unattached shape.
    pub fn create_shape(&mut self, mut shape: Shape) -> Result<ShapeId> {
        shape.kind().validate()?;
        shape.detach();
        Ok(self.shapes.insert(shape))
    }

    /// Register a shape and attach it to `body`.
    ///
    /// On failure the shape is not kept.
    pub fn add_shape(&mut self, body: BodyId, shape: Shape) -> Result<ShapeId> {
        let id = self.create_shape(shape)?;
        if let Err(err) = self.attach_shape(body, id) {
            self.shapes.remove(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Attach a registered shape to a body.
    ///
    /// Attaching to the current owner again does nothing. A shape owned by a
    /// different body is rejected with [`SimError::ShapeAttachedElsewhere`].
    pub fn attach_shape(&mut self, body_id: BodyId, shape_id: ShapeId) -> Result<()> {
        let body = self
            .bodies
            .get_mut(body_id)
            .ok_or(SimError::InvalidBodyId(body_id))?;
        let shape = self
            .shapes
            .get_mut(shape_id)
            .ok_or(SimError::InvalidShapeId(shape_id))?;

        match shape.body() {
            Some(owner) if owner == body_id => return Ok(()),
            Some(owner) => {
                warn!(shape = %shape_id, owner = %owner, body = %body_id, "shape already attached elsewhere");
                return Err(SimError::ShapeAttachedElsewhere {
                    shape: shape_id,
                    owner,
                });
            }
            None => {}
        }

        if let Err(err) = shape.validate(!body.is_static()) {
            warn!(shape = %shape_id, body = %body_id, error = %err, "shape rejected");
            return Err(err);
        }

        shape.attach(body_id, body.pose());
        body.push_shape(shape_id);
        self.octree.insert(shape_id, *shape.aabb());
        self.refresh_mass(body_id);

        self.emit(WorldEvent::ShapeAttached {
            shape: shape_id,
            body: body_id,
        });
        debug!(shape = %shape_id, body = %body_id, "shape attached");
        Ok(())
    }

    /// Detach a shape from its body. Unattached shapes are left alone.
    pub fn detach_shape(&mut self, shape_id: ShapeId) -> Result<()> {
        let shape = self
            .shapes
            .get_mut(shape_id)
            .ok_or(SimError::InvalidShapeId(shape_id))?;
        let Some(body_id) = shape.body() else {
            return Ok(());
        };

        shape.detach();
        self.octree.remove(shape_id);
        if let Some(body) = self.bodies.get_mut(body_id) {
            body.remove_shape(shape_id);
        }
        self.refresh_mass(body_id);
        self.forget_touching(shape_id);

        self.emit(WorldEvent::ShapeDetached {
            shape: shape_id,
            body: body_id,
        });
        debug!(shape = %shape_id, body = %body_id, "shape detached");
        Ok(())
    }

    /// Detach (if needed) and delete a shape.
    pub fn remove_shape(&mut self, shape_id: ShapeId) -> Result<Shape> {
        self.detach_shape(shape_id)?;
        self.shapes
            .remove(shape_id)
            .ok_or(SimError::InvalidShapeId(shape_id))
    }

    /// Get a shape.
    #[must_use]
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    /// Iterate over shapes in slot order.
    pub fn shapes(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter()
    }

    /// Change a shape's geometry, refreshing its box, the octree and the
    /// owning body's mass.
    pub fn set_shape_kind(&mut self, shape_id: ShapeId, kind: ShapeKind) -> Result<()> {
        kind.validate()?;
        let shape = self
            .shapes
            .get_mut(shape_id)
            .ok_or(SimError::InvalidShapeId(shape_id))?;
        shape.set_kind(kind);

        if let Some(body_id) = shape.body() {
            let pose = self.bodies.get(body_id).map(|b| *b.pose()).unwrap_or_default();
            shape.sync(&pose);
            self.octree.update(shape_id, *shape.aabb());
            self.refresh_mass(body_id);
        } else {
            shape.detach();
        }
        Ok(())
    }

    /// Change a shape's friction and restitution.
    pub fn set_shape_material(&mut self, shape_id: ShapeId, material: ContactMaterial) -> Result<()> {
        self.shapes
            .get_mut(shape_id)
            .ok_or(SimError::InvalidShapeId(shape_id))?
            .set_material(material);
        Ok(())
    }

    /// Drop a shape from the touching set, reporting the exit.
    fn forget_touching(&mut self, shape_id: ShapeId) {
        let gone: Vec<ShapePair> = self
            .touching
            .keys()
            .filter(|pair| pair.contains(shape_id))
            .copied()
            .collect();
        for pair in gone {
            if let Some((body_a, body_b)) = self.touching.remove(&pair) {
                self.emit(WorldEvent::CollisionExited {
                    pair,
                    body_a,
                    body_b,
                });
            }
        }
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Advance the world by one fixed step.
    ///
    /// Returns [`SimError::Diverged`] if any body ends the step with a
    /// non-finite pose or velocity.
    pub fn update(&mut self) -> Result<StepReport> {
        let dt = self.config.timestep;
        self.step_count += 1;
        let mut report = StepReport {
            step: self.step_count,
            ..StepReport::default()
        };

        self.detect_collisions(&mut report);
        self.integrate_forces(dt);
        self.solve(dt);
        self.integrate_transforms(dt);
        self.collect_contacts(&mut report);
        self.clear();

        self.time += dt;
        trace!(
            step = report.step,
            candidates = report.candidate_pairs,
            tests = report.narrow_phase_tests,
            contacts = report.contacts.len(),
            "step complete"
        );

        self.check_divergence()?;
        Ok(report)
    }

    /// Build one constraint per penetrating candidate pair.
    fn detect_collisions(&mut self, report: &mut StepReport) {
        for (a, b) in self.octree.candidate_pairs() {
            report.candidate_pairs += 1;
            let pair = ShapePair::new(a, b);
            if !self.tested_pairs.insert(pair) {
                continue;
            }

            let (Some(shape_a), Some(shape_b)) =
                (self.shapes.get(pair.first()), self.shapes.get(pair.second()))
            else {
                continue;
            };
            if !shape_a.aabb().overlaps(shape_b.aabb()) {
                continue;
            }
            let (Some(body_a_id), Some(body_b_id)) = (shape_a.body(), shape_b.body()) else {
                continue;
            };
            if body_a_id == body_b_id {
                continue;
            }
            let (Some(body_a), Some(body_b)) =
                (self.bodies.get(body_a_id), self.bodies.get(body_b_id))
            else {
                continue;
            };
            if !body_a.is_active() && !body_b.is_active() {
                continue;
            }
            if body_a.is_static() && body_b.is_static() {
                continue;
            }

            report.narrow_phase_tests += 1;
            let Some(manifold) = self.narrow_phase.test(shape_a, shape_b) else {
                continue;
            };
            if !manifold.is_penetrating() {
                continue;
            }

            let key = ContactKey {
                pair,
                body_a: body_a_id,
                body_b: body_b_id,
            };
            let material = ContactMaterial::combine(&shape_a.material(), &shape_b.material());
            let constraint = ContactConstraint::new(
                key,
                &manifold,
                material,
                body_a,
                body_b,
                &self.config.solver,
            );
            self.contacts.insert(
                pair,
                LiveContact {
                    constraint,
                    manifold,
                },
            );
        }
    }

    fn integrate_forces(&mut self, dt: f64) {
        let gravity = self.config.gravity;
        for body in self.bodies.values_mut() {
            integrate_forces(body, &gravity, dt);
        }
    }

    /// One prepare + iterate per contact, in canonical pair order.
    fn solve(&mut self, dt: f64) {
        for live in self.contacts.values_mut() {
            let key = live.constraint.key();
            let Some([body_a, body_b]) = self.bodies.get_disjoint_mut([key.body_a, key.body_b])
            else {
                continue;
            };
            live.constraint
                .prepare(&*body_a, &*body_b, &self.config.solver, dt);
            live.constraint.iterate(body_a, body_b);
        }
    }

    fn integrate_transforms(&mut self, dt: f64) {
        let moving: Vec<(BodyId, Pose)> = self
            .bodies
            .iter()
            .filter(|(_, body)| !body.is_static() && !body.twist().is_zero())
            .map(|(id, body)| (id, integrate_pose(body.pose(), body.twist(), dt)))
            .collect();

        for (id, pose) in moving {
            if let Some(body) = self.bodies.get_mut(id) {
                body.set_pose(pose);
            }
            self.sync_shapes(id);
        }
    }

    /// Report solved contacts and emit entered/exited events.
    fn collect_contacts(&mut self, report: &mut StepReport) {
        let mut current = BTreeMap::new();
        for (pair, live) in &self.contacts {
            let contact =
                ContactReport::new(&live.constraint, live.manifold.point_a, live.manifold.point_b);
            if !self.touching.contains_key(pair) {
                report.events.push(WorldEvent::CollisionEntered(contact));
            }
            current.insert(*pair, (contact.key.body_a, contact.key.body_b));
            report.contacts.push(contact);
        }

        for (pair, (body_a, body_b)) in &self.touching {
            if !current.contains_key(pair) {
                report.events.push(WorldEvent::CollisionExited {
                    pair: *pair,
                    body_a: *body_a,
                    body_b: *body_b,
                });
            }
        }
        self.touching = current;
        if self.buffer_events {
            self.events.extend(report.events.iter().cloned());
        }
    }

    fn clear(&mut self) {
        self.contacts.clear();
        self.tested_pairs.clear();
        for body in self.bodies.values_mut() {
            body.clear_forces();
        }
    }

    fn check_divergence(&self) -> Result<()> {
        for (id, body) in &self.bodies {
            if !body.pose().is_finite() || !body.twist().is_finite() {
                warn!(body = %id, step = self.step_count, "non-finite body state");
                return Err(SimError::diverged(format!(
                    "{id} has a non-finite pose or velocity after step {}",
                    self.step_count
                )));
            }
        }
        Ok(())
    }

    /// Take every event emitted since the last drain, oldest first.
    ///
    /// The buffer keeps growing until drained. A caller that reads
    /// [`StepReport::events`] instead can turn buffering off with
    /// [`World::set_event_buffering`].
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Enable or disable the event buffer. Disabling drops anything pending.
    pub fn set_event_buffering(&mut self, enabled: bool) {
        self.buffer_events = enabled;
        if !enabled {
            self.events.clear();
        }
    }

    /// Whether events are buffered for [`World::drain_events`].
    #[must_use]
    pub fn event_buffering(&self) -> bool {
        self.buffer_events
    }

    fn emit(&mut self, event: WorldEvent) {
        if self.buffer_events {
            self.events.push(event);
        }
    }

    /// Pairs that were penetrating at the end of the last step.
    pub fn touching_pairs(&self) -> impl Iterator<Item = ShapePair> + '_ {
        self.touching.keys().copied()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Attached shapes whose bounding box overlaps `aabb`, sorted by id.
    #[must_use]
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<ShapeId> {
        self.octree.query_aabb(aabb)
    }

    /// Closest attached shape along a ray.
    ///
    /// `direction` need not be normalized; a zero direction hits nothing.
    #[must_use]
    pub fn ray_cast(
        &self,
        origin: Point3<f64>,
        direction: Vector3<f64>,
        max_distance: f64,
    ) -> Option<RayHit> {
        let direction = direction.try_normalize(f64::EPSILON)?;
        let mut best: Option<RayHit> = None;
        for shape_id in self.octree.query_ray(&origin, &direction, max_distance) {
            let Some(shape) = self.shapes.get(shape_id) else {
                continue;
            };
            let Some(body) = shape.body() else {
                continue;
            };
            let Some((distance, normal)) = ray_shape(shape, &origin, &direction, max_distance)
            else {
                continue;
            };
            if best.map_or(true, |hit| distance < hit.distance) {
                best = Some(RayHit {
                    shape: shape_id,
                    body,
                    point: origin + direction * distance,
                    normal,
                    distance,
                });
            }
        }
        best
    }

    /// Sum of kinetic energy over all bodies.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies.values().map(RigidBody::kinetic_energy).sum()
    }

    /// Sum of linear momentum over all bodies.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        self.bodies.values().map(RigidBody::linear_momentum).sum()
    }
}
