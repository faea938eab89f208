use glam::{Quat, Vec3};

use crate::physics::types::RigidBody;
use crate::physics::world::WorldTunables;

const SLEEP_DURATION: f32 = 2.0;
const TILT_MIN_ANGLE: f32 = 2.0;
const TILT_MAX_ANGLE: f32 = 15.0;
const TILT_RESIDUAL_ANGULAR_SPEED_SQ: f32 = 0.0025;
const TILT_SNAP_ANGLE: f32 = 1.0;
const TILT_SNAP_ANGULAR_SPEED_SQ: f32 = 0.01;
const TILT_TORQUE_SCALE: f32 = 5.0;

/// Gravity, surface projection, integration, damping, sleep, and tilt
/// correction — run once per step after both solvers have cleared.
pub fn run(bodies: &mut [RigidBody], gravity: Vec3, dt: f32, tunables: &WorldTunables) {
    for body in bodies.iter_mut() {
        if !body.is_dynamic || body.is_sleeping {
            continue;
        }

        apply_gravity(body, gravity, dt);
        project_against_surface(body);
        integrate_pose(body, dt);
        apply_damping(
            body,
            dt,
            tunables.linear_damping_factor,
            tunables.angular_damping_factor,
            tunables.tilt_angular_damping_factor,
            tunables.low_angular_velocity_factor,
        );
        update_sleep_state(body, dt);

        body.tilt_timer += dt;
        if body.tilt_timer >= tunables.tilt_interval_secs {
            body.tilt_timer = 0.0;
            apply_tilt_correction(body);
        }
    }
}

fn apply_gravity(body: &mut RigidBody, gravity: Vec3, dt: f32) {
    if !body.use_gravity {
        return;
    }
    let impulse = gravity * body.gravity_factor * dt;
    body.apply_impulse(impulse * body.mass);
}

fn project_against_surface(body: &mut RigidBody) {
    if !body.collider.grounded {
        return;
    }
    let n = body.collider.ground_normal;
    let into = body.velocity.dot(n);
    if into < 0.0 {
        body.velocity -= n * into;
    }
}

fn integrate_pose(body: &mut RigidBody, dt: f32) {
    body.position += body.velocity * dt;

    if body.angular_velocity.length_squared() > 1e-6 {
        let spin = Quat::from_xyzw(body.angular_velocity.x, body.angular_velocity.y, body.angular_velocity.z, 0.0);
        let delta = spin * body.rotation;
        let next = Quat::from_xyzw(
            body.rotation.x + 0.5 * delta.x * dt,
            body.rotation.y + 0.5 * delta.y * dt,
            body.rotation.z + 0.5 * delta.z * dt,
            body.rotation.w + 0.5 * delta.w * dt,
        );
        body.rotation = next.normalize();
    }
}

fn apply_damping(
    body: &mut RigidBody,
    dt: f32,
    linear_damping_factor: f32,
    angular_damping_factor: f32,
    tilt_angular_damping_factor: f32,
    low_angular_velocity_factor: f32,
) {
    body.velocity *= linear_damping_factor.powf(dt * 60.0);

    if body.angle_to_flat >= TILT_MIN_ANGLE && body.angle_to_flat < TILT_MAX_ANGLE {
        body.angular_velocity *= tilt_angular_damping_factor;
    }

    if body.angular_velocity.length_squared() < TILT_RESIDUAL_ANGULAR_SPEED_SQ {
        body.angular_velocity *= low_angular_velocity_factor;
    } else {
        body.angular_velocity *= angular_damping_factor.powf(dt * 60.0);
    }
}

fn update_sleep_state(body: &mut RigidBody, dt: f32) {
    let threshold_sq = body.sleep_threshold * body.sleep_threshold;
    if body.velocity.length_squared() < threshold_sq && body.angular_velocity.length_squared() < threshold_sq {
        body.sleep_timer += dt;
        if body.sleep_timer > SLEEP_DURATION {
            body.sleep();
        }
    } else {
        body.sleep_timer = 0.0;
        body.wake_up();
    }
}

fn apply_tilt_correction(body: &mut RigidBody) {
    let candidates = [
        body.rotation * Vec3::Y,
        body.rotation * -Vec3::Y,
        body.rotation * Vec3::X,
        body.rotation * -Vec3::X,
        body.rotation * Vec3::Z,
        body.rotation * -Vec3::Z,
    ];

    let mut closest_up = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.dot(Vec3::Y).abs() > closest_up.dot(Vec3::Y).abs() {
            closest_up = *candidate;
        }
    }
    body.closest_up = closest_up;

    body.angle_to_flat = closest_up.dot(Vec3::Y).clamp(-1.0, 1.0).acos().to_degrees();
    if body.angle_to_flat <= TILT_SNAP_ANGLE {
        if body.angular_velocity.length_squared() < TILT_SNAP_ANGULAR_SPEED_SQ {
            body.angular_velocity = Vec3::ZERO;
            body.rotation = body.rotation.normalize();
        }
        return;
    }

    let mut tilt_axis = closest_up.cross(Vec3::Y);
    if tilt_axis.length_squared() < 1e-10 {
        tilt_axis = Vec3::X;
    } else {
        tilt_axis = tilt_axis.normalize();
    }

    let scale = (body.angle_to_flat / TILT_MAX_ANGLE).clamp(0.0, 1.0);
    let torque = tilt_axis * scale * TILT_TORQUE_SCALE;

    if body.angle_to_flat >= TILT_MAX_ANGLE {
        body.apply_torque(torque);
    } else {
        body.apply_torque(torque * 1.25);
    }
}
