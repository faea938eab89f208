use glam::{Mat3, Vec3};

use crate::physics::types::{Contact, ContactManifold, RigidBody, Shape};

const PARALLEL_EPSILON: f32 = 1e-6;
const AXIS_TIE_EPSILON: f32 = 1e-6;

/// Dispatches on the pair's shapes and produces a manifold whose contact
/// normals point from `a` toward `b`. Unknown/degenerate pairings return an
/// empty manifold rather than an error — narrowphase never fails loudly.
pub fn test_collision(a: &RigidBody, b: &RigidBody) -> ContactManifold {
    match (&a.collider.shape, &b.collider.shape) {
        (Shape::Sphere { .. }, Shape::Sphere { .. }) => sphere_vs_sphere(a, b),
        (Shape::Box { .. }, Shape::Box { .. }) => box_vs_box(a, b),
        (Shape::Box { .. }, Shape::Sphere { .. }) => box_vs_sphere(a, b),
        (Shape::Sphere { .. }, Shape::Box { .. }) => flip_manifold(box_vs_sphere(b, a)),
    }
}

fn flip_manifold(mut manifold: ContactManifold) -> ContactManifold {
    for contact in &mut manifold.contacts {
        contact.normal = -contact.normal;
    }
    manifold
}

fn sphere_vs_sphere(a: &RigidBody, b: &RigidBody) -> ContactManifold {
    let (ra, rb) = match (a.collider.shape, b.collider.shape) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => (ra, rb),
        _ => return ContactManifold::empty(),
    };

    let delta = b.position - a.position;
    let combined_radius = ra + rb;
    if delta.length_squared() > combined_radius * combined_radius {
        return ContactManifold::empty();
    }

    let distance = delta.length();
    let normal = if distance > 1e-5 { delta / distance } else { Vec3::Y };
    let point = a.position + normal * ra;
    let penetration = combined_radius - distance;

    ContactManifold {
        colliding: true,
        contacts: vec![Contact { point, normal, penetration }],
    }
}

/// `a` is the box, `b` is the sphere. Normal points from the box toward the
/// sphere (callers flip it back if the pair order was reversed).
fn box_vs_sphere(a: &RigidBody, b: &RigidBody) -> ContactManifold {
    let half_extents = match a.collider.shape {
        Shape::Box { half_extents } => half_extents,
        _ => return ContactManifold::empty(),
    };
    let radius = match b.collider.shape {
        Shape::Sphere { radius } => radius,
        _ => return ContactManifold::empty(),
    };

    let rot = Mat3::from_quat(a.rotation);
    let local = rot.transpose() * (b.position - a.position);
    let clamped = local.clamp(-half_extents, half_extents);
    let closest_world = a.position + rot * clamped;

    let delta = b.position - closest_world;
    if delta.length_squared() > radius * radius {
        return ContactManifold::empty();
    }

    let distance = delta.length();
    let normal = if distance > 1e-5 { delta / distance } else { Vec3::Y };
    let penetration = radius - distance;

    ContactManifold {
        colliding: true,
        contacts: vec![Contact { point: closest_world, normal, penetration }],
    }
}

struct SatResult {
    axis: Vec3,
    overlap: f32,
}

fn box_axes(rotation: glam::Quat) -> [Vec3; 3] {
    let m = Mat3::from_quat(rotation);
    [m.x_axis, m.y_axis, m.z_axis]
}

fn box_radius(axes: &[Vec3; 3], extents: Vec3, axis: Vec3) -> f32 {
    extents.x * axes[0].dot(axis).abs()
        + extents.y * axes[1].dot(axis).abs()
        + extents.z * axes[2].dot(axis).abs()
}

fn box_vs_box(a: &RigidBody, b: &RigidBody) -> ContactManifold {
    let extents_a = match a.collider.shape {
        Shape::Box { half_extents } => half_extents,
        _ => return ContactManifold::empty(),
    };
    let extents_b = match b.collider.shape {
        Shape::Box { half_extents } => half_extents,
        _ => return ContactManifold::empty(),
    };

    let axes_a = box_axes(a.rotation);
    let axes_b = box_axes(b.rotation);
    let t = b.position - a.position;

    // 3 face axes of A, 3 of B, 9 edge cross products, in that priority order
    // so a strict-less-than comparison below implements the spec's tie-break
    // rule (face A > face B > edge, lower index wins) for free.
    let mut candidate_axes: Vec<Vec3> = Vec::with_capacity(15);
    candidate_axes.extend_from_slice(&axes_a);
    candidate_axes.extend_from_slice(&axes_b);
    for ai in &axes_a {
        for bj in &axes_b {
            candidate_axes.push(ai.cross(*bj));
        }
    }

    let mut best: Option<SatResult> = None;
    for axis in candidate_axes {
        let len_sq = axis.length_squared();
        if len_sq < PARALLEL_EPSILON {
            // near-parallel edges: no well-defined axis, skip the test
            continue;
        }
        let axis = axis / len_sq.sqrt();

        let ra = box_radius(&axes_a, extents_a, axis);
        let rb = box_radius(&axes_b, extents_b, axis);
        let distance = t.dot(axis).abs();
        let overlap = ra + rb - distance;
        if overlap < 0.0 {
            return ContactManifold::empty();
        }

        match &best {
            Some(current) if overlap >= current.overlap - AXIS_TIE_EPSILON => {}
            _ => best = Some(SatResult { axis, overlap }),
        }
    }

    let Some(sat) = best else { return ContactManifold::empty() };

    let rot_a = Mat3::from_cols(axes_a[0], axes_a[1], axes_a[2]);
    let rot_b = Mat3::from_cols(axes_b[0], axes_b[1], axes_b[2]);

    let flip = sat.axis.dot(b.position - a.position) < 0.0;
    let (ref_pos, ref_rot, ref_extents) = if flip { (b.position, rot_b, extents_b) } else { (a.position, rot_a, extents_a) };
    let (inc_pos, inc_rot, inc_extents) = if flip { (a.position, rot_a, extents_a) } else { (b.position, rot_b, extents_b) };
    let ref_normal = if flip { -sat.axis } else { sat.axis };

    let ref_cols = [ref_rot.x_axis, ref_rot.y_axis, ref_rot.z_axis];
    let ref_extent_arr = [ref_extents.x, ref_extents.y, ref_extents.z];
    let mut best_ref_face = 0usize;
    let mut max_dot = ref_cols[0].dot(ref_normal);
    for i in 1..3 {
        let d = ref_cols[i].dot(ref_normal);
        if d > max_dot {
            max_dot = d;
            best_ref_face = i;
        }
    }
    let mut world_normal = ref_cols[best_ref_face];
    if world_normal.dot(ref_normal) < 0.0 {
        world_normal = -world_normal;
    }
    let plane_offset = world_normal.dot(ref_pos + world_normal * ref_extent_arr[best_ref_face]);

    let inc_cols = [inc_rot.x_axis, inc_rot.y_axis, inc_rot.z_axis];
    let inc_extent_arr = [inc_extents.x, inc_extents.y, inc_extents.z];
    let mut best_inc_face = 0usize;
    let mut min_dot = inc_cols[0].dot(-ref_normal);
    for i in 1..3 {
        let d = inc_cols[i].dot(-ref_normal);
        if d < min_dot {
            min_dot = d;
            best_inc_face = i;
        }
    }

    let axis_u = inc_cols[(best_inc_face + 1) % 3];
    let axis_v = inc_cols[(best_inc_face + 2) % 3];
    let extent_u = inc_extent_arr[(best_inc_face + 1) % 3];
    let extent_v = inc_extent_arr[(best_inc_face + 2) % 3];
    let face_center = inc_pos - inc_cols[best_inc_face] * inc_extent_arr[best_inc_face];

    let incident_face = vec![
        face_center + axis_u * extent_u + axis_v * extent_v,
        face_center - axis_u * extent_u + axis_v * extent_v,
        face_center - axis_u * extent_u - axis_v * extent_v,
        face_center + axis_u * extent_u - axis_v * extent_v,
    ];

    let mut clipped = clip_face_against_plane(&incident_face, world_normal, plane_offset);

    let ref_u = ref_cols[(best_ref_face + 1) % 3];
    let ref_v = ref_cols[(best_ref_face + 2) % 3];
    let u_extent = ref_extent_arr[(best_ref_face + 1) % 3];
    let v_extent = ref_extent_arr[(best_ref_face + 2) % 3];

    clipped = clip_face_against_plane(&clipped, -ref_u, ref_u.dot(ref_pos + ref_u * u_extent));
    clipped = clip_face_against_plane(&clipped, ref_u, -ref_u.dot(ref_pos - ref_u * u_extent));
    clipped = clip_face_against_plane(&clipped, -ref_v, ref_v.dot(ref_pos + ref_v * v_extent));
    clipped = clip_face_against_plane(&clipped, ref_v, -ref_v.dot(ref_pos - ref_v * v_extent));

    let mut contacts: Vec<Contact> = clipped
        .into_iter()
        .filter_map(|pt| {
            let depth = world_normal.dot(pt) - plane_offset;
            (depth <= 0.0).then_some(Contact { point: pt, normal: ref_normal, penetration: -depth })
        })
        .collect();

    contacts.sort_by(|x, y| y.penetration.partial_cmp(&x.penetration).unwrap());
    contacts.truncate(4);

    if contacts.is_empty() {
        return ContactManifold::empty();
    }
    ContactManifold { colliding: true, contacts }
}

/// Sutherland-Hodgman clip of a convex polygon against the half-space
/// `dot(plane_normal, p) - plane_offset <= 0`.
fn clip_face_against_plane(face: &[Vec3], plane_normal: Vec3, plane_offset: f32) -> Vec<Vec3> {
    if face.is_empty() {
        return Vec::new();
    }

    let mut clipped = Vec::new();
    let mut prev = *face.last().unwrap();
    let mut prev_dist = plane_normal.dot(prev) - plane_offset;

    for &curr in face {
        let curr_dist = plane_normal.dot(curr) - plane_offset;

        if curr_dist <= 0.0 {
            if prev_dist > 0.0 {
                let t = prev_dist / (prev_dist - curr_dist);
                clipped.push(prev + t * (curr - prev));
            }
            clipped.push(curr);
        } else if prev_dist <= 0.0 {
            let t = prev_dist / (prev_dist - curr_dist);
            clipped.push(prev + t * (curr - prev));
        }

        prev = curr;
        prev_dist = curr_dist;
    }

    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::types::{BodyHandle, RigidBodySpec};
    use glam::Quat;

    fn sphere(index: u32, position: Vec3, radius: f32) -> RigidBody {
        let spec = RigidBodySpec { position, shape: Shape::Sphere { radius }, ..Default::default() };
        RigidBody::new(BodyHandle { index, generation: 0 }, &spec)
    }

    fn cube(index: u32, position: Vec3, half_extents: Vec3) -> RigidBody {
        let spec = RigidBodySpec { position, shape: Shape::Box { half_extents }, ..Default::default() };
        RigidBody::new(BodyHandle { index, generation: 0 }, &spec)
    }

    #[test]
    fn spheres_near_touching() {
        let a = sphere(0, Vec3::ZERO, 1.0);
        let b = sphere(1, Vec3::new(1.999, 0.0, 0.0), 1.0);
        let manifold = test_collision(&a, &b);
        assert!(manifold.colliding);
        assert_eq!(manifold.contacts.len(), 1);
        let c = manifold.contacts[0];
        assert!((c.penetration - 0.001).abs() < 1e-3);
        assert!(c.normal.dot(Vec3::X) > 0.99);
    }

    #[test]
    fn coincident_spheres_fall_back_to_up_normal() {
        let a = sphere(0, Vec3::ZERO, 1.0);
        let b = sphere(1, Vec3::ZERO, 1.0);
        let manifold = test_collision(&a, &b);
        assert!(manifold.colliding);
        let c = manifold.contacts[0];
        assert_eq!(c.normal, Vec3::Y);
        assert!((c.penetration - 2.0).abs() < 1e-4);
    }

    #[test]
    fn axis_aligned_boxes_overlap() {
        let a = cube(0, Vec3::ZERO, Vec3::splat(0.5));
        let b = cube(1, Vec3::new(1.9, 0.0, 0.0), Vec3::splat(0.5));
        let manifold = test_collision(&a, &b);
        assert!(manifold.colliding);
        assert!(!manifold.contacts.is_empty());
        for c in &manifold.contacts {
            assert!(c.normal.x.abs() > 0.99);
            assert!((c.penetration - 0.1).abs() < 1e-3);
        }
    }

    #[test]
    fn separated_boxes_do_not_collide() {
        let a = cube(0, Vec3::ZERO, Vec3::splat(0.5));
        let b = cube(1, Vec3::new(5.0, 0.0, 0.0), Vec3::splat(0.5));
        assert!(!test_collision(&a, &b).colliding);
    }

    #[test]
    fn box_rests_on_floor() {
        let floor = cube(0, Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0));
        let box_body = cube(1, Vec3::new(0.0, 0.49, 0.0), Vec3::splat(0.5));
        let manifold = test_collision(&floor, &box_body);
        assert!(manifold.colliding);
        for c in &manifold.contacts {
            assert!(c.normal.y > 0.99);
        }
    }

    #[test]
    fn box_vs_sphere_resting() {
        let floor = cube(0, Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0));
        let ball = sphere(1, Vec3::new(0.0, 0.49, 0.0), 0.5);
        let manifold = test_collision(&floor, &ball);
        assert!(manifold.colliding);
        assert_eq!(manifold.contacts.len(), 1);
        assert!(manifold.contacts[0].normal.y > 0.99);
    }

    #[test]
    fn sphere_vs_box_normal_is_flipped() {
        let ball = sphere(0, Vec3::new(0.0, 0.49, 0.0), 0.5);
        let floor = cube(1, Vec3::new(0.0, -0.5, 0.0), Vec3::new(50.0, 0.5, 50.0));
        let manifold = test_collision(&ball, &floor);
        assert!(manifold.colliding);
        assert!(manifold.contacts[0].normal.y < -0.99);
    }

    #[test]
    fn identity_rotation_sanity() {
        let a = cube(0, Vec3::ZERO, Vec3::splat(0.5));
        assert_eq!(a.rotation, Quat::IDENTITY);
    }
}
