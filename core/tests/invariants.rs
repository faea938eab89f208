//! Boundary behavior and round-trip laws from the narrowphase and world
//! contracts, independent of any specific end-to-end scenario.

use approx::assert_relative_eq;
use arcane_core::physics::narrowphase::test_collision;
use arcane_core::physics::types::{BodyHandle, RigidBodySpec, Shape};
use arcane_core::physics::World;
use glam::Vec3;

fn body(position: Vec3, shape: Shape) -> arcane_core::physics::RigidBody {
    let spec = RigidBodySpec { position, shape, ..Default::default() };
    arcane_core::physics::RigidBody::new(BodyHandle { index: 0, generation: 0 }, &spec)
}

// =========================================================================
// Boundary behavior
// =========================================================================

#[test]
fn near_touching_spheres_report_small_penetration() {
    let a = body(Vec3::new(0.0, 0.0, 0.0), Shape::Sphere { radius: 1.0 });
    let b = body(Vec3::new(1.999, 0.0, 0.0), Shape::Sphere { radius: 1.0 });

    let manifold = test_collision(&a, &b);
    assert!(manifold.colliding);
    let contact = &manifold.contacts[0];
    assert_relative_eq!(contact.penetration, 0.001, epsilon = 1e-4);
    assert_relative_eq!(contact.normal, Vec3::X, epsilon = 1e-4);
}

#[test]
fn coincident_spheres_use_fallback_normal() {
    let a = body(Vec3::ZERO, Shape::Sphere { radius: 1.0 });
    let b = body(Vec3::ZERO, Shape::Sphere { radius: 1.0 });

    let manifold = test_collision(&a, &b);
    assert!(manifold.colliding);
    let contact = &manifold.contacts[0];
    assert_relative_eq!(contact.normal, Vec3::Y, epsilon = 1e-6);
    assert_relative_eq!(contact.penetration, 2.0, epsilon = 1e-4);
}

#[test]
fn overlapping_cubes_report_expected_separation() {
    let half = Vec3::splat(0.5);
    let a = body(Vec3::ZERO, Shape::Box { half_extents: half });
    let b = body(Vec3::new(1.9, 0.0, 0.0), Shape::Box { half_extents: half });

    let manifold = test_collision(&a, &b);
    assert!(manifold.colliding);
    assert!(!manifold.contacts.is_empty());
    let contact = &manifold.contacts[0];
    assert_relative_eq!(contact.normal.x.abs(), 1.0, epsilon = 1e-3);
    assert_relative_eq!(contact.penetration, 0.1, epsilon = 1e-3);
}

// =========================================================================
// Round-trip / idempotence laws
// =========================================================================

#[test]
fn add_then_remove_layer_restores_table() {
    let mut world = World::default();
    let before = world.layers().len();
    let id = world.layers_mut().add_layer("Debris").unwrap();
    world.layers_mut().remove_layer(id).unwrap();
    assert_eq!(world.layers().len(), before);
}

#[test]
fn inertia_tensor_is_pure() {
    let b = body(Vec3::ZERO, Shape::Box { half_extents: Vec3::new(1.0, 2.0, 3.0) });
    let first = b.compute_inertia_tensor();
    let second = b.compute_inertia_tensor();
    assert_eq!(first, second);
}

#[test]
fn step_on_all_static_sleeping_world_is_a_no_op() {
    let mut world = World::default();
    let handle = world.create_body(&RigidBodySpec {
        position: Vec3::new(1.0, 2.0, 3.0),
        shape: Shape::Sphere { radius: 1.0 },
        is_dynamic: false,
        use_gravity: false,
        ..Default::default()
    });

    let before = world.get_body(handle).unwrap().clone();
    world.step(1.0 / 60.0);
    let after = world.get_body(handle).unwrap();

    assert_eq!(before.position, after.position);
    assert_eq!(before.rotation, after.rotation);
}
