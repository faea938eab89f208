use arcane_core::physics::types::{RigidBodySpec, Shape};
use arcane_core::physics::World;
use criterion::{criterion_group, criterion_main, Criterion};
use glam::Vec3;

fn stack_world() -> World {
    let mut world = World::default();
    world.create_body(&RigidBodySpec {
        position: Vec3::new(0.0, -1.0, 0.0),
        shape: Shape::Box { half_extents: Vec3::new(10.0, 1.0, 10.0) },
        is_dynamic: false,
        use_gravity: false,
        ..Default::default()
    });
    for i in 0..3 {
        world.create_body(&RigidBodySpec {
            position: Vec3::new(0.02 * i as f32, 0.5 + i as f32 * 1.05, 0.0),
            shape: Shape::Box { half_extents: Vec3::splat(0.5) },
            ..Default::default()
        });
    }
    world
}

fn bench_step(c: &mut Criterion) {
    c.bench_function("step_stack_of_three", |b| {
        b.iter_batched(
            stack_world,
            |mut world| {
                for _ in 0..60 {
                    world.step(1.0 / 60.0);
                }
                world
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
