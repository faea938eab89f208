use anyhow::{Context, Result};
use arcane_core::physics::types::{RigidBodySpec, Shape};
use arcane_core::physics::World;
use glam::Vec3;
use serde::Deserialize;

#[derive(Deserialize)]
struct Scene {
    #[serde(default = "default_gravity")]
    gravity: Vec3,
    bodies: Vec<RigidBodySpec>,
}

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, -9.81, 0.0)
}

/// A box stack: a static floor under two dynamic boxes starting a couple of
/// units apart, matching the engine's stacking scenario.
fn demo_scene() -> Scene {
    Scene {
        gravity: default_gravity(),
        bodies: vec![
            RigidBodySpec {
                position: Vec3::new(0.0, -1.0, 0.0),
                shape: Shape::Box { half_extents: Vec3::new(10.0, 1.0, 10.0) },
                is_dynamic: false,
                use_gravity: false,
                ..Default::default()
            },
            RigidBodySpec {
                position: Vec3::new(0.0, 2.0, 0.0),
                shape: Shape::Box { half_extents: Vec3::splat(0.5) },
                ..Default::default()
            },
            RigidBodySpec {
                position: Vec3::new(0.05, 3.3, 0.0),
                shape: Shape::Box { half_extents: Vec3::splat(0.5) },
                ..Default::default()
            },
        ],
    }
}

pub fn run(scene_path: Option<String>, steps: u32, dt: f32, trace: bool) -> Result<()> {
    let scene = match scene_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading scene file {path}"))?;
            serde_json::from_str(&text).with_context(|| format!("parsing scene file {path}"))?
        }
        None => demo_scene(),
    };

    let mut world = World::new(scene.gravity);
    let handles: Vec<_> = scene.bodies.iter().map(|spec| world.create_body(spec)).collect();

    for step in 0..steps {
        world.step(dt);
        if trace {
            print_poses(&world, &handles, step);
        }
    }

    if !trace {
        print_poses(&world, &handles, steps.saturating_sub(1));
    }

    Ok(())
}

fn print_poses(world: &World, handles: &[arcane_core::physics::BodyHandle], step: u32) {
    for handle in handles {
        let Some(body) = world.get_body(*handle) else { continue };
        println!(
            "step {step:>4} body {handle} pos=({:.3}, {:.3}, {:.3}) asleep={}",
            body.position.x, body.position.y, body.position.z, body.is_sleeping
        );
    }
}
