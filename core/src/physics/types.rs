use glam::{Quat, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable reference to a body slot in the `World`'s pool.
///
/// Mirrors a generational index: `index` addresses a slot, `generation`
/// disambiguates a reused slot from the body that used to live there.
/// A handle whose generation doesn't match the slot's current generation
/// is a lookup miss, not a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyHandle {
    pub index: u32,
    pub generation: u32,
}

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

impl Shape {
    /// Radius of the smallest sphere centered at the origin that contains
    /// every point of the shape. Used for the broadphase radius cull.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Shape::Box { half_extents } => half_extents.length(),
            Shape::Sphere { radius } => *radius,
        }
    }
}

/// Shape data owned by a `RigidBody`. Non-copyable identity: a collider
/// only makes sense attached to the body that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Collider {
    pub shape: Shape,
    pub bounding_radius: f32,
    /// Cleared at the start of every step; set by narrowphase when one of
    /// this body's contacts has a normal inside the walkable-slope cone.
    pub grounded: bool,
    pub ground_normal: Vec3,
}

/// Below this, a box half-extent or sphere radius is treated as degenerate
/// (zero-volume or inverted) and clamped up rather than left to poison the
/// inertia tensor and bounding-radius math downstream.
const MIN_SHAPE_DIMENSION: f32 = 1e-3;

fn sanitize_shape(shape: Shape) -> Shape {
    match shape {
        Shape::Box { half_extents } => {
            if half_extents.x < MIN_SHAPE_DIMENSION
                || half_extents.y < MIN_SHAPE_DIMENSION
                || half_extents.z < MIN_SHAPE_DIMENSION
            {
                log::warn!(
                    "{}",
                    crate::physics::error::PhysicsError::DegenerateShape(
                        "box half-extent must be positive"
                    )
                );
                Shape::Box { half_extents: half_extents.max(Vec3::splat(MIN_SHAPE_DIMENSION)) }
            } else {
                shape
            }
        }
        Shape::Sphere { radius } => {
            if radius < MIN_SHAPE_DIMENSION {
                log::warn!(
                    "{}",
                    crate::physics::error::PhysicsError::DegenerateShape(
                        "sphere radius must be positive"
                    )
                );
                Shape::Sphere { radius: radius.max(MIN_SHAPE_DIMENSION) }
            } else {
                shape
            }
        }
    }
}

impl Collider {
    pub fn new(shape: Shape) -> Self {
        let shape = sanitize_shape(shape);
        Self {
            bounding_radius: shape.bounding_radius(),
            shape,
            grounded: false,
            ground_normal: Vec3::Y,
        }
    }

    pub fn clear_grounded(&mut self) {
        self.grounded = false;
        self.ground_normal = Vec3::Y;
    }
}

/// Creation-time description of a body, consumed by `World::create_body`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodySpec {
    pub position: Vec3,
    pub rotation: Quat,
    pub shape: Shape,
    pub is_dynamic: bool,
    pub use_gravity: bool,
    pub mass: f32,
    pub restitution: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub gravity_factor: f32,
    pub sleep_threshold: f32,
    pub layer: u8,
}

impl Default for RigidBodySpec {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            shape: Shape::Sphere { radius: 0.5 },
            is_dynamic: true,
            use_gravity: true,
            mass: 1.0,
            restitution: 0.3,
            static_friction: 0.5,
            dynamic_friction: 0.3,
            gravity_factor: 1.0,
            sleep_threshold: 0.05,
            layer: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SleepState {
    Awake,
    Sleeping,
}

#[derive(Debug, Clone)]
pub struct RigidBody {
    pub handle: BodyHandle,
    pub layer: u8,

    // Pose
    pub position: Vec3,
    pub rotation: Quat,

    // Kinematics
    pub velocity: Vec3,
    pub angular_velocity: Vec3,

    // Mass properties
    pub mass: f32,
    pub inertia_tensor: Vec3,
    pub center_of_gravity: Vec3,

    // Material
    pub restitution: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,

    // Gravity
    pub use_gravity: bool,
    pub gravity_factor: f32,

    // Flags
    pub is_dynamic: bool,
    pub is_sleeping: bool,

    // Sleep bookkeeping
    pub sleep_threshold: f32,
    pub sleep_timer: f32,

    // Tilt bookkeeping
    pub tilt_timer: f32,
    pub angle_to_flat: f32,
    pub closest_up: Vec3,

    pub collider: Collider,
}

impl RigidBody {
    pub fn new(handle: BodyHandle, spec: &RigidBodySpec) -> Self {
        let mut body = Self {
            handle,
            layer: spec.layer,
            position: spec.position,
            rotation: spec.rotation.normalize(),
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: spec.mass,
            inertia_tensor: Vec3::ONE,
            center_of_gravity: Vec3::ZERO,
            restitution: spec.restitution.clamp(0.0, 1.0),
            static_friction: spec.static_friction.max(0.0),
            dynamic_friction: spec.dynamic_friction.max(0.0),
            use_gravity: spec.use_gravity,
            gravity_factor: spec.gravity_factor,
            is_dynamic: spec.is_dynamic,
            is_sleeping: false,
            sleep_threshold: spec.sleep_threshold,
            sleep_timer: 0.0,
            tilt_timer: 0.0,
            angle_to_flat: 0.0,
            closest_up: Vec3::Y,
            collider: Collider::new(spec.shape),
        };
        body.inertia_tensor = body.compute_inertia_tensor();
        body.update_center_of_gravity();
        body
    }

    pub fn apply_force(&mut self, f: Vec3) {
        if !self.is_dynamic || self.mass <= 0.0 {
            return;
        }
        self.wake_up();
        self.velocity += f / self.mass;
    }

    pub fn apply_impulse(&mut self, j: Vec3) {
        if !self.is_dynamic || self.mass <= 0.0 {
            return;
        }
        self.wake_up();
        self.velocity += j / self.mass;
    }

    pub fn apply_torque(&mut self, tau: Vec3) {
        if !self.is_dynamic {
            return;
        }
        self.wake_up();
        self.angular_velocity += tau / self.inertia_tensor;
    }

    /// Diagonal body-space inertia tensor for this body's collider.
    /// Pure in body state: calling this twice in a row yields the same
    /// result, regardless of how many times it's been called before.
    pub fn compute_inertia_tensor(&self) -> Vec3 {
        if !self.is_dynamic || self.mass <= 0.0 {
            return Vec3::ONE;
        }
        match self.collider.shape {
            Shape::Box { half_extents } => {
                let (hx, hy, hz) = (half_extents.x, half_extents.y, half_extents.z);
                Vec3::new(
                    self.mass * (hy * hy + hz * hz) / 12.0,
                    self.mass * (hx * hx + hz * hz) / 12.0,
                    self.mass * (hx * hx + hy * hy) / 12.0,
                )
            }
            Shape::Sphere { radius } => Vec3::splat(0.4 * self.mass * radius * radius),
        }
    }

    pub fn update_center_of_gravity(&mut self) {
        self.center_of_gravity = match self.collider.shape {
            Shape::Box { half_extents } => {
                let (hx, hy, hz) = (half_extents.x, half_extents.y, half_extents.z);
                if hy >= hx && hy >= hz {
                    Vec3::new(0.0, -0.2 * hy, 0.0)
                } else if hx >= hy && hx >= hz {
                    Vec3::new(0.2 * hx, 0.0, 0.0)
                } else {
                    Vec3::new(0.0, 0.0, 0.2 * hz)
                }
            }
            Shape::Sphere { .. } => Vec3::ZERO,
        };
    }

    pub fn wake_up(&mut self) {
        self.is_sleeping = false;
        self.sleep_timer = 0.0;
    }

    pub fn sleep(&mut self) {
        self.is_sleeping = true;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    pub fn inv_mass(&self) -> f32 {
        if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 }
    }

    pub fn inv_inertia(&self) -> Vec3 {
        Vec3::new(
            if self.inertia_tensor.x > 0.0 { 1.0 / self.inertia_tensor.x } else { 0.0 },
            if self.inertia_tensor.y > 0.0 { 1.0 / self.inertia_tensor.y } else { 0.0 },
            if self.inertia_tensor.z > 0.0 { 1.0 / self.inertia_tensor.z } else { 0.0 },
        )
    }

    /// World-space center of gravity, used as the solver's lever-arm origin.
    pub fn world_cog(&self) -> Vec3 {
        self.position + self.rotation * self.center_of_gravity
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub point: Vec3,
    /// Unit normal, points from body A toward body B.
    pub normal: Vec3,
    pub penetration: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ContactManifold {
    pub colliding: bool,
    pub contacts: Vec<Contact>,
}

impl ContactManifold {
    pub fn empty() -> Self {
        Self { colliding: false, contacts: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_box_half_extent_is_clamped_up() {
        let collider = Collider::new(Shape::Box { half_extents: Vec3::new(0.0, 1.0, -2.0) });
        match collider.shape {
            Shape::Box { half_extents } => {
                assert!(half_extents.x >= MIN_SHAPE_DIMENSION);
                assert!(half_extents.y >= 1.0);
                assert!(half_extents.z >= MIN_SHAPE_DIMENSION);
            }
            _ => panic!("expected a box"),
        }
    }

    #[test]
    fn degenerate_sphere_radius_is_clamped_up() {
        let collider = Collider::new(Shape::Sphere { radius: -1.0 });
        match collider.shape {
            Shape::Sphere { radius } => assert!(radius >= MIN_SHAPE_DIMENSION),
            _ => panic!("expected a sphere"),
        }
    }

    #[test]
    fn inertia_tensor_is_pure() {
        let spec = RigidBodySpec { shape: Shape::Box { half_extents: Vec3::splat(0.5) }, mass: 2.0, ..Default::default() };
        let body = RigidBody::new(BodyHandle { index: 0, generation: 0 }, &spec);
        let first = body.compute_inertia_tensor();
        let second = body.compute_inertia_tensor();
        assert_eq!(first, second);
    }
}
