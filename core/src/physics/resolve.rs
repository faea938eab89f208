use std::collections::HashMap;

use glam::Vec3;

use crate::physics::types::{BodyHandle, Contact, RigidBody};

const MAX_LAMBDA: f32 = 100.0;
const MAX_BIAS: f32 = 10.0;
const BIAS_PENETRATION_CAP: f32 = 0.1;
/// Below this approach speed, restitution is ignored — avoids jitter from
/// bouncing a body that's merely resting under Baumgarte correction.
const RESTITUTION_VELOCITY_THRESHOLD: f32 = 1.0;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct ContactKey {
    a: BodyHandle,
    b: BodyHandle,
    feature_id: u32,
}

struct WarmStartEntry {
    impulse: f32,
    steps_since_hit: u32,
}

/// One accumulated-impulse row solving the non-penetration constraint along
/// a contact normal. Bodies are referenced by index into the step's body
/// slice — valid only for the lifetime of the step that built it.
pub struct ContactConstraint {
    pub body_a: usize,
    pub body_b: usize,
    key: ContactKey,
    pub point: Vec3,
    pub normal: Vec3,
    r_a: Vec3,
    r_b: Vec3,
    effective_mass: f32,
    bias: f32,
    pub accumulated_impulse: f32,
}

/// One of the two orthogonal tangent rows coupled to a `ContactConstraint`
/// by index into the contact solver's constraint list.
pub struct FrictionConstraint {
    pub body_a: usize,
    pub body_b: usize,
    tangent: Vec3,
    r_a: Vec3,
    r_b: Vec3,
    effective_mass: f32,
    pub accumulated_impulse: f32,
    friction_coefficient: f32,
    linked_contact: usize,
}

fn lever_arms(a: &RigidBody, b: &RigidBody, point: Vec3) -> (Vec3, Vec3) {
    (point - a.world_cog(), point - b.world_cog())
}

fn effective_mass_along(a: &RigidBody, b: &RigidBody, r_a: Vec3, r_b: Vec3, axis: Vec3) -> f32 {
    let cross_a = r_a.cross(axis);
    let cross_b = r_b.cross(axis);
    let angular_a = (cross_a * a.inv_inertia()).dot(cross_a);
    let angular_b = (cross_b * b.inv_inertia()).dot(cross_b);
    let denom = a.inv_mass() + b.inv_mass() + angular_a + angular_b;
    if denom > 0.0 { 1.0 / denom } else { 0.0 }
}

fn relative_velocity_at(a: &RigidBody, b: &RigidBody, r_a: Vec3, r_b: Vec3) -> Vec3 {
    (b.velocity + b.angular_velocity.cross(r_b)) - (a.velocity + a.angular_velocity.cross(r_a))
}

/// Sequential-impulse solver for the non-penetration constraint at each
/// contact, with Baumgarte stabilization and warm starting across steps.
#[derive(Default)]
pub struct ContactSolver {
    constraints: Vec<ContactConstraint>,
    warm_start: HashMap<ContactKey, WarmStartEntry>,
}

impl ContactSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one constraint row per contact. `baumgarte_factor`/`slop` come
    /// from world tunables; `dt` is the current substep delta.
    pub fn add_contact(
        &mut self,
        bodies: &[RigidBody],
        idx_a: usize,
        idx_b: usize,
        contact: Contact,
        feature_id: u32,
        dt: f32,
        baumgarte_factor: f32,
        slop: f32,
        correction_factor: f32,
    ) {
        let a = &bodies[idx_a];
        let b = &bodies[idx_b];
        let (r_a, r_b) = lever_arms(a, b, contact.point);
        let effective_mass = effective_mass_along(a, b, r_a, r_b, contact.normal);

        let penetration_bias = (contact.penetration - slop).max(0.0).min(BIAS_PENETRATION_CAP);
        let baumgarte_bias =
            ((baumgarte_factor / dt) * penetration_bias * correction_factor).clamp(0.0, MAX_BIAS);

        let vn0 = relative_velocity_at(a, b, r_a, r_b).dot(contact.normal);
        let restitution = a.restitution.min(b.restitution);
        let restitution_bias = if -vn0 > RESTITUTION_VELOCITY_THRESHOLD {
            restitution * (-vn0 - RESTITUTION_VELOCITY_THRESHOLD)
        } else {
            0.0
        };

        let key = ContactKey { a: a.handle, b: b.handle, feature_id };
        let accumulated_impulse = match self.warm_start.get_mut(&key) {
            Some(entry) => {
                entry.steps_since_hit = 0;
                entry.impulse
            }
            None => 0.0,
        };

        self.constraints.push(ContactConstraint {
            body_a: idx_a,
            body_b: idx_b,
            key,
            point: contact.point,
            normal: contact.normal,
            r_a,
            r_b,
            effective_mass,
            bias: baumgarte_bias - restitution_bias,
            accumulated_impulse,
        });
    }

    pub fn constraints(&self) -> &[ContactConstraint] {
        &self.constraints
    }

    pub fn solve(&mut self, bodies: &mut [RigidBody], iterations: u32) {
        for c in &self.constraints {
            if c.accumulated_impulse == 0.0 {
                continue;
            }
            let impulse = c.accumulated_impulse * c.normal;
            bodies[c.body_a].apply_impulse(-impulse);
            bodies[c.body_b].apply_impulse(impulse);
        }

        for _ in 0..iterations {
            for c in &mut self.constraints {
                let (a, b) = index_two(bodies, c.body_a, c.body_b);
                let rel_vel = relative_velocity_at(a, b, c.r_a, c.r_b);
                let vn = rel_vel.dot(c.normal);

                let lambda = (-(vn + c.bias) * c.effective_mass).clamp(-MAX_LAMBDA, MAX_LAMBDA);

                let old = c.accumulated_impulse;
                c.accumulated_impulse = (old + lambda).max(0.0);
                let applied = c.accumulated_impulse - old;

                let impulse = applied * c.normal;
                a.apply_impulse(-impulse);
                b.apply_impulse(impulse);
            }
        }
    }

    /// Caches each constraint's final impulse for next step's warm start and
    /// evicts cache entries that haven't been hit in a while.
    pub fn clear(&mut self, eviction_steps: u32) {
        for c in &self.constraints {
            self.warm_start.insert(
                c.key,
                WarmStartEntry { impulse: c.accumulated_impulse, steps_since_hit: 0 },
            );
        }
        for entry in self.warm_start.values_mut() {
            entry.steps_since_hit += 1;
        }
        self.warm_start.retain(|_, entry| entry.steps_since_hit <= eviction_steps);
        self.constraints.clear();
    }
}

fn index_two(bodies: &mut [RigidBody], i: usize, j: usize) -> (&mut RigidBody, &mut RigidBody) {
    assert_ne!(i, j);
    if i < j {
        let (left, right) = bodies.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = bodies.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// Two orthogonal tangent-direction constraints per contact, each clamped to
/// a Coulomb friction cone tied to its contact's current accumulated normal
/// impulse.
#[derive(Default)]
pub struct FrictionSolver {
    constraints: Vec<FrictionConstraint>,
}

impl FrictionSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(
        &mut self,
        bodies: &[RigidBody],
        idx_a: usize,
        idx_b: usize,
        point: Vec3,
        normal: Vec3,
        friction_multiplier: f32,
        linked_contact: usize,
    ) {
        let a = &bodies[idx_a];
        let b = &bodies[idx_b];
        let (r_a, r_b) = lever_arms(a, b, point);

        let rel_vel = relative_velocity_at(a, b, r_a, r_b);
        let mut tangent1 = rel_vel - rel_vel.dot(normal) * normal;
        if tangent1.length_squared() < 1e-6 {
            tangent1 = if normal.x.abs() < 0.9 { normal.cross(Vec3::X) } else { normal.cross(Vec3::Y) };
        }
        tangent1 = tangent1.normalize();
        let tangent2 = normal.cross(tangent1).normalize();

        let friction_coefficient = (a.dynamic_friction + b.dynamic_friction) * friction_multiplier;

        for tangent in [tangent1, tangent2] {
            let effective_mass = effective_mass_along(a, b, r_a, r_b, tangent);
            if effective_mass <= 0.0 {
                continue;
            }
            self.constraints.push(FrictionConstraint {
                body_a: idx_a,
                body_b: idx_b,
                tangent,
                r_a,
                r_b,
                effective_mass,
                accumulated_impulse: 0.0,
                friction_coefficient,
                linked_contact,
            });
        }
    }

    pub fn solve(&mut self, bodies: &mut [RigidBody], contact_solver: &ContactSolver, iterations: u32) {
        for _ in 0..iterations {
            for fc in &mut self.constraints {
                let (a, b) = index_two(bodies, fc.body_a, fc.body_b);
                let rel_vel = relative_velocity_at(a, b, fc.r_a, fc.r_b);
                let vt = rel_vel.dot(fc.tangent);
                let lambda = -vt * fc.effective_mass;

                let max_friction = fc.friction_coefficient
                    * contact_solver.constraints()[fc.linked_contact].accumulated_impulse;

                let old = fc.accumulated_impulse;
                fc.accumulated_impulse = (old + lambda).clamp(-max_friction, max_friction);
                let applied = fc.accumulated_impulse - old;

                let impulse = applied * fc.tangent;
                a.apply_impulse(-impulse);
                b.apply_impulse(impulse);
            }
        }
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }
}
