//! Ray queries against individual shapes.

use nalgebra::{Point3, Vector3};
use sim_types::{BodyId, ShapeId};

use crate::broad_phase::Aabb;
use crate::shape::{Shape, ShapeKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Closest shape hit by a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RayHit {
    /// Shape that was hit.
    pub shape: ShapeId,
    /// Its owning body.
    pub body: BodyId,
    /// Hit point in world coordinates.
    pub point: Point3<f64>,
    /// Outward surface normal at the hit point.
    pub normal: Vector3<f64>,
    /// Distance along the (normalized) ray.
    pub distance: f64,
}

/// Distance and outward normal where a ray first enters a shape.
///
/// `direction` must be unit length. A ray starting inside reports distance 0
/// and the reversed ray direction as normal.
#[must_use]
pub fn ray_shape(
    shape: &Shape,
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    max_distance: f64,
) -> Option<(f64, Vector3<f64>)> {
    let pose = shape.pose();
    match shape.kind() {
        ShapeKind::Sphere { radius } => {
            let center = pose.position;
            let m = origin - center;
            let c = m.norm_squared() - radius * radius;
            if c <= 0.0 {
                return Some((0.0, -direction));
            }
            let b = m.dot(direction);
            if b > 0.0 {
                return None;
            }
            let discriminant = b * b - c;
            if discriminant < 0.0 {
                return None;
            }
            let t = -b - discriminant.sqrt();
            if t > max_distance {
                return None;
            }
            let normal = (origin + direction * t - center) / *radius;
            Some((t, normal))
        }
        ShapeKind::Cube { half_extents } => {
            let local_origin = pose.inverse_transform_point(origin);
            let local_dir = pose.inverse_transform_vector(direction);
            let bounds = Aabb::from_center(Point3::origin(), *half_extents);
            if bounds.contains_point(&local_origin) {
                return Some((0.0, -direction));
            }
            let t = bounds.ray_entry(&local_origin, &local_dir, max_distance)?;

            // The entry face is the one whose plane the hit point lies on.
            let hit = local_origin + local_dir * t;
            let gaps = (hit.coords.abs() - half_extents).abs();
            let axis = gaps.imin();
            let mut normal = Vector3::zeros();
            normal[axis] = hit[axis].signum();
            Some((t, pose.transform_vector(&normal)))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use sim_types::Pose;

    fn placed(mut shape: Shape, pose: Pose) -> Shape {
        shape.sync(&pose);
        shape
    }

    #[test]
    fn test_ray_sphere() {
        let s = placed(Shape::sphere(1.0), Pose::from_position(Point3::new(5.0, 0.0, 0.0)));
        let (t, n) = ray_shape(&s, &Point3::origin(), &Vector3::x(), 100.0).unwrap();
        assert_relative_eq!(t, 4.0, epsilon = 1e-12);
        assert_relative_eq!(n, -Vector3::x(), epsilon = 1e-12);

        assert!(ray_shape(&s, &Point3::origin(), &-Vector3::x(), 100.0).is_none());
        assert!(ray_shape(&s, &Point3::origin(), &Vector3::x(), 3.0).is_none());
        assert!(ray_shape(&s, &Point3::new(0.0, 2.0, 0.0), &Vector3::x(), 100.0).is_none());
    }

    #[test]
    fn test_ray_starting_inside() {
        let s = placed(Shape::sphere(1.0), Pose::identity());
        let (t, _) = ray_shape(&s, &Point3::new(0.5, 0.0, 0.0), &Vector3::x(), 10.0).unwrap();
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_ray_cube_top_face() {
        let c = placed(Shape::cube(Vector3::new(2.0, 2.0, 0.5)), Pose::identity());
        let (t, n) = ray_shape(&c, &Point3::new(0.3, -0.2, 10.0), &-Vector3::z(), 100.0).unwrap();
        assert_relative_eq!(t, 9.5, epsilon = 1e-12);
        assert_relative_eq!(n, Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_ray_rotated_cube() {
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_4);
        let c = placed(
            Shape::cube(Vector3::repeat(1.0)),
            Pose::from_position_rotation(Point3::origin(), rotation),
        );
        // Straight at the corner that now points along -x.
        let (t, _) = ray_shape(&c, &Point3::new(-5.0, 0.0, 0.0), &Vector3::x(), 100.0).unwrap();
        assert_relative_eq!(t, 5.0 - 2.0_f64.sqrt(), epsilon = 1e-9);
    }
}
