use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::physics::broadphase::collect_pairs;
use crate::physics::error::PhysicsError;
use crate::physics::layers::LayerTable;
use crate::physics::motion;
use crate::physics::narrowphase::test_collision;
use crate::physics::resolve::{ContactSolver, FrictionSolver};
use crate::physics::types::{BodyHandle, RigidBody, RigidBodySpec};

const VELOCITY_ITERATIONS: u32 = 10;

/// World-wide constants governing the solver, substepping, and motion
/// pipeline. Every field has a sensible default; callers typically adjust
/// only gravity and friction-related knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldTunables {
    /// Walkable-slope threshold, in degrees, for the `grounded` classification.
    pub angle_limit_degrees: f32,
    pub baumgarte_factor: f32,
    pub baumgarte_slop: f32,
    pub correction_factor: f32,
    pub friction_multiplier: f32,
    /// Contacts shallower than this are dropped before reaching the solver.
    pub min_penetration_threshold: f32,
    pub low_angular_velocity_factor: f32,
    /// Prospective pair count above which substeps start growing.
    pub collision_threshold: usize,
    pub substep_growth_factor: f32,
    pub max_substeps: u32,
    pub tilt_interval_secs: f32,
    /// Per-60Hz-frame linear velocity decay, `velocity *= factor^(dt*60)`.
    pub linear_damping_factor: f32,
    /// Per-60Hz-frame angular velocity decay applied outside the tilt cone.
    pub angular_damping_factor: f32,
    /// Extra angular damping applied while `angle_to_flat` is inside the
    /// tilt cone (`[2°, 15°)`).
    pub tilt_angular_damping_factor: f32,
    /// Warm-start cache entries survive this many steps without being hit.
    pub warm_start_eviction_steps: u32,
}

impl Default for WorldTunables {
    fn default() -> Self {
        Self {
            angle_limit_degrees: 45.0,
            baumgarte_factor: 0.2,
            baumgarte_slop: 0.01,
            correction_factor: 1.0,
            friction_multiplier: 1.0,
            min_penetration_threshold: 0.0,
            low_angular_velocity_factor: 0.85,
            collision_threshold: 16,
            substep_growth_factor: 0.25,
            max_substeps: 4,
            tilt_interval_secs: 0.05,
            linear_damping_factor: 0.99,
            angular_damping_factor: 0.95,
            tilt_angular_damping_factor: 0.90,
            warm_start_eviction_steps: 4,
        }
    }
}

/// Owns the body pool, the collision-layer table, and the two contact
/// solvers, and drives a full step: broadphase, narrowphase, sequential
/// impulses, friction, then motion integration.
///
/// Bodies live in a dense `Vec`; removal uses swap-removal and updates the
/// moved body's own handle, so a `BodyHandle` stays valid until the body it
/// names is removed, regardless of how many other bodies come and go.
pub struct World {
    bodies: Vec<RigidBody>,
    next_generation: u32,
    layers: LayerTable,
    gravity: Vec3,
    pub tunables: WorldTunables,
    contact_solver: ContactSolver,
    friction_solver: FrictionSolver,
    force_close_handler: Option<Box<dyn FnMut(&str) + Send>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl World {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            bodies: Vec::new(),
            next_generation: 0,
            layers: LayerTable::new(),
            gravity,
            tunables: WorldTunables::default(),
            contact_solver: ContactSolver::new(),
            friction_solver: FrictionSolver::new(),
            force_close_handler: None,
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Componentwise-clamps each axis to `[-100, 100]` — a world whose
    /// gravity exceeds this is almost certainly a unit-mixup bug, not intent.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity.clamp(Vec3::splat(-100.0), Vec3::splat(100.0));
    }

    pub fn layers(&self) -> &LayerTable {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut LayerTable {
        &mut self.layers
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    pub fn create_body(&mut self, spec: &RigidBodySpec) -> BodyHandle {
        let generation = self.next_generation;
        self.next_generation += 1;
        let handle = BodyHandle { index: self.bodies.len() as u32, generation };
        self.bodies.push(RigidBody::new(handle, spec));
        handle
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let idx = handle.index as usize;
        match self.bodies.get(idx) {
            Some(body) if body.handle == handle => {
                self.bodies.swap_remove(idx);
                if let Some(moved) = self.bodies.get_mut(idx) {
                    moved.handle.index = idx as u32;
                }
                Ok(())
            }
            _ => {
                log::warn!("remove_body called with unknown handle {handle}");
                Err(PhysicsError::UnknownBody(handle))
            }
        }
    }

    pub fn get_body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.index as usize).filter(|b| b.handle == handle)
    }

    pub fn get_body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.index as usize).filter(|b| b.handle == handle)
    }

    pub fn set_force_close_handler(&mut self, handler: impl FnMut(&str) + Send + 'static) {
        self.force_close_handler = Some(Box::new(handler));
    }

    /// Unrecoverable-error escape hatch. Notifies the registered handler (if
    /// any), then panics in debug builds (break into the debugger) or aborts
    /// the process in release builds — this never returns.
    pub fn force_close(&mut self, reason: &str) -> ! {
        log::error!("physics world force-closed: {reason}");
        if let Some(handler) = &mut self.force_close_handler {
            handler(reason);
        }
        #[cfg(debug_assertions)]
        panic!("physics world force-closed: {reason}");
        #[cfg(not(debug_assertions))]
        std::process::abort();
    }

    /// Advances the world by `dt`, choosing a substep count from the
    /// prospective pair count and `tunables.substep_growth_factor`.
    pub fn step(&mut self, dt: f32) {
        let pair_count = collect_pairs(&self.bodies, &self.layers).len();
        let substeps = self.substep_count(pair_count);
        self.update(dt, substeps);
    }

    fn substep_count(&self, pair_count: usize) -> u32 {
        if pair_count <= self.tunables.collision_threshold {
            return 1;
        }
        let excess = (pair_count - self.tunables.collision_threshold) as f32;
        let grown = 1.0 + excess * self.tunables.substep_growth_factor;
        (grown.ceil() as u32).clamp(1, self.tunables.max_substeps.max(1))
    }

    /// Runs exactly `substeps.max(1)` fixed substeps of `dt / substeps`.
    pub fn update(&mut self, dt: f32, substeps: u32) {
        let n = substeps.max(1);
        let h = dt / n as f32;
        for _ in 0..n {
            self.step_once(h);
        }
    }

    fn step_once(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        for body in &mut self.bodies {
            body.collider.clear_grounded();
        }

        let pairs = collect_pairs(&self.bodies, &self.layers);

        for (a, b) in pairs {
            let manifold = test_collision(&self.bodies[a], &self.bodies[b]);
            if !manifold.colliding {
                continue;
            }

            for (feature_id, contact) in manifold.contacts.iter().enumerate() {
                if contact.penetration < self.tunables.min_penetration_threshold {
                    continue;
                }

                self.mark_grounded(a, b, contact.normal);

                self.contact_solver.add_contact(
                    &self.bodies,
                    a,
                    b,
                    *contact,
                    feature_id as u32,
                    dt,
                    self.tunables.baumgarte_factor,
                    self.tunables.baumgarte_slop,
                    self.tunables.correction_factor,
                );
                let linked = self.contact_solver.constraints().len() - 1;
                self.friction_solver.add_contact(
                    &self.bodies,
                    a,
                    b,
                    contact.point,
                    contact.normal,
                    self.tunables.friction_multiplier,
                    linked,
                );
            }
        }

        self.contact_solver.solve(&mut self.bodies, VELOCITY_ITERATIONS);
        self.friction_solver.solve(&mut self.bodies, &self.contact_solver, VELOCITY_ITERATIONS);
        self.contact_solver.clear(self.tunables.warm_start_eviction_steps);
        self.friction_solver.clear();

        motion::run(&mut self.bodies, self.gravity, dt, &self.tunables);
    }

    fn mark_grounded(&mut self, a: usize, b: usize, normal: Vec3) {
        let limit = self.tunables.angle_limit_degrees.to_radians().cos();
        if normal.dot(Vec3::Y) >= limit && self.bodies[a].is_dynamic {
            self.bodies[a].collider.grounded = true;
            self.bodies[a].collider.ground_normal = normal;
        } else if (-normal).dot(Vec3::Y) >= limit && self.bodies[b].is_dynamic {
            self.bodies[b].collider.grounded = true;
            self.bodies[b].collider.ground_normal = -normal;
        }
    }

    /// No spatial acceleration structure beyond the broadphase radius cull —
    /// a linear scan over every body's collider is the whole implementation.
    pub fn hit_any(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool {
        self.hit_collider(origin, direction, max_distance).is_some()
    }

    pub fn hit_collider(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(BodyHandle, f32)> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        let mut closest: Option<(BodyHandle, f32)> = None;
        for body in &self.bodies {
            let Some(t) = ray_vs_sphere(origin, dir, body.position, body.collider.bounding_radius) else {
                continue;
            };
            if t < 0.0 || t > max_distance {
                continue;
            }
            if closest.map_or(true, |(_, best)| t < best) {
                closest = Some((body.handle, t));
            }
        }
        closest
    }
}

fn ray_vs_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let projection = to_center.dot(dir);
    let closest_point = origin + dir * projection.max(0.0);
    let closest_dist_sq = (center - closest_point).length_squared();
    if closest_dist_sq > radius * radius {
        return None;
    }
    let offset = (radius * radius - closest_dist_sq).max(0.0).sqrt();
    let t = projection - offset;
    Some(if t >= 0.0 { t } else { projection + offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::types::Shape;

    fn floor_spec() -> RigidBodySpec {
        RigidBodySpec {
            position: Vec3::new(0.0, -1.0, 0.0),
            shape: Shape::Box { half_extents: Vec3::new(10.0, 1.0, 10.0) },
            is_dynamic: false,
            use_gravity: false,
            ..Default::default()
        }
    }

    fn falling_box_spec() -> RigidBodySpec {
        RigidBodySpec {
            position: Vec3::new(0.0, 5.0, 0.0),
            shape: Shape::Box { half_extents: Vec3::splat(0.5) },
            ..Default::default()
        }
    }

    #[test]
    fn handle_stays_valid_after_unrelated_removal() {
        let mut world = World::default();
        let first = world.create_body(&floor_spec());
        let second = world.create_body(&falling_box_spec());
        world.remove_body(first).unwrap();
        assert!(world.get_body(second).is_some());
        assert_eq!(world.get_body(second).unwrap().handle, second);
    }

    #[test]
    fn removed_handle_is_rejected() {
        let mut world = World::default();
        let handle = world.create_body(&falling_box_spec());
        world.remove_body(handle).unwrap();
        assert!(world.get_body(handle).is_none());
        assert!(world.remove_body(handle).is_err());
    }

    #[test]
    fn box_comes_to_rest_on_floor() {
        let mut world = World::default();
        world.create_body(&floor_spec());
        let falling = world.create_body(&falling_box_spec());

        for _ in 0..300 {
            world.step(1.0 / 60.0);
        }

        let body = world.get_body(falling).unwrap();
        assert!((body.position.y - 0.5).abs() < 0.1, "resting height was {}", body.position.y);
    }

    #[test]
    fn gravity_is_clamped_to_sane_range() {
        let mut world = World::default();
        world.set_gravity(Vec3::new(0.0, -1_000.0, 0.0));
        assert_eq!(world.gravity().y, -100.0);
    }

    #[test]
    fn ray_hits_closest_body_along_direction() {
        let mut world = World::default();
        world.create_body(&RigidBodySpec {
            position: Vec3::new(0.0, 0.0, 10.0),
            shape: Shape::Sphere { radius: 0.5 },
            ..Default::default()
        });
        let near = world.create_body(&RigidBodySpec {
            position: Vec3::new(0.0, 0.0, 5.0),
            shape: Shape::Sphere { radius: 0.5 },
            ..Default::default()
        });

        let hit = world.hit_collider(Vec3::ZERO, Vec3::Z, 1000.0);
        assert_eq!(hit.map(|(h, _)| h), Some(near));
        assert!(world.hit_any(Vec3::ZERO, Vec3::Z, 1000.0));
    }

    #[test]
    fn ray_misses_body_off_axis() {
        let mut world = World::default();
        world.create_body(&RigidBodySpec {
            position: Vec3::new(10.0, 10.0, 10.0),
            shape: Shape::Sphere { radius: 0.5 },
            ..Default::default()
        });
        assert!(!world.hit_any(Vec3::ZERO, Vec3::X, 1000.0));
    }

    // `force_close` aborts the process outside debug builds; only exercise the
    // panic path here so `cargo test --release` doesn't kill the test runner.
    #[test]
    #[cfg(debug_assertions)]
    fn force_close_invokes_handler_before_terminating() {
        use std::panic::{self, AssertUnwindSafe};
        use std::sync::{Arc, Mutex};

        let mut world = World::default();
        let invoked = Arc::new(Mutex::new(false));
        let flag = invoked.clone();
        world.set_force_close_handler(move |_reason| *flag.lock().unwrap() = true);

        let result = panic::catch_unwind(AssertUnwindSafe(|| world.force_close("test")));
        assert!(result.is_err());
        assert!(*invoked.lock().unwrap());
    }
}
