use crate::physics::layers::LayerTable;
use crate::physics::types::RigidBody;

/// Conservative pair rejection: sleep state, collider presence, static/gravity
/// status, bounding-radius distance, and the layer table. No spatial
/// acceleration structure beyond the radius cull — for the body counts this
/// engine targets, the O(N^2) pair scan is not the bottleneck.
pub fn is_valid_pair(a: &RigidBody, b: &RigidBody, layers: &LayerTable) -> bool {
    if a.is_sleeping && b.is_sleeping {
        return false;
    }

    let a_moves = a.is_dynamic || a.use_gravity;
    let b_moves = b.is_dynamic || b.use_gravity;
    if !a_moves && !b_moves {
        return false;
    }

    let radius_sum = a.collider.bounding_radius + b.collider.bounding_radius;
    if a.position.distance(b.position) > radius_sum {
        return false;
    }

    if !layers.can_collide(a.layer, b.layer) {
        return false;
    }

    true
}

/// Returns every pair (in insertion order) that survives `is_valid_pair`.
/// A sleeping body only wakes when a real contact constraint pushes an
/// impulse into it through `apply_impulse`/`apply_force`/`apply_torque` —
/// broadphase proximity alone never wakes anything.
pub fn collect_pairs(bodies: &[RigidBody], layers: &LayerTable) -> Vec<(usize, usize)> {
    let len = bodies.len();
    let mut pairs = Vec::new();
    for i in 0..len {
        for j in (i + 1)..len {
            if is_valid_pair(&bodies[i], &bodies[j], layers) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::types::{BodyHandle, RigidBodySpec, Shape};
    use glam::Vec3;

    fn body(handle_index: u32, position: Vec3, is_dynamic: bool) -> RigidBody {
        let spec = RigidBodySpec {
            position,
            is_dynamic,
            shape: Shape::Sphere { radius: 0.5 },
            ..Default::default()
        };
        RigidBody::new(BodyHandle { index: handle_index, generation: 0 }, &spec)
    }

    #[test]
    fn sleeping_pair_is_skipped() {
        let layers = LayerTable::new();
        let mut a = body(0, Vec3::ZERO, true);
        let mut b = body(1, Vec3::ZERO, true);
        a.sleep();
        b.sleep();
        assert!(!is_valid_pair(&a, &b, &layers));
    }

    #[test]
    fn far_apart_pair_is_culled() {
        let layers = LayerTable::new();
        let a = body(0, Vec3::ZERO, true);
        let b = body(1, Vec3::new(100.0, 0.0, 0.0), true);
        assert!(!is_valid_pair(&a, &b, &layers));
    }

    #[test]
    fn layer_rule_blocks_pair() {
        let mut layers = LayerTable::new();
        let debris = layers.add_layer("Debris").unwrap();
        layers.set_rule(0, debris, false).unwrap();
        let a = body(0, Vec3::ZERO, true);
        let mut b = body(1, Vec3::new(0.2, 0.0, 0.0), true);
        b.layer = debris;
        assert!(!is_valid_pair(&a, &b, &layers));
    }
}
