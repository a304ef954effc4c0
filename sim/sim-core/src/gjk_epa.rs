//! GJK (Gilbert-Johnson-Keerthi) and EPA (Expanding Polytope Algorithm).
//!
//! Generic convex-convex narrow phase over [`Shape`] support mappings.
//!
//! # Algorithm Overview
//!
//! ## GJK
//!
//! Two convex shapes overlap exactly when their Minkowski difference `A - B`
//! contains the origin. GJK builds a simplex (point, line, triangle,
//! tetrahedron) of support points that tries to enclose the origin.
//!
//! ## EPA
//!
//! Once GJK encloses the origin, EPA grows the simplex into a polytope until
//! it finds the boundary face of `A - B` closest to the origin. Its normal is
//! the contact normal (A toward B) and its distance the penetration depth.
//! Every polytope vertex remembers the two shape support points it came from,
//! so the barycentric coordinates of the closest point recover one witness
//! point on each shape.
//!
//! # Example
//!
//! ```
//! use sim_core::gjk_epa::gjk_epa_contact;
//! use sim_core::Shape;
//! use nalgebra::Vector3;
//!
//! // Unattached shapes sit at their mounting offset.
//! let a = Shape::cube(Vector3::repeat(1.0));
//! let b = Shape::cube(Vector3::repeat(1.0)).with_offset(Vector3::new(1.5, 0.2, 0.1));
//!
//! let contact = gjk_epa_contact(&a, &b).unwrap();
//! assert!((contact.separation + 0.5).abs() < 1e-4);
//! assert!(contact.normal.x > 0.99);
//! ```
//!
//! # References
//!
//! - Gilbert, Johnson, Keerthi: "A Fast Procedure for Computing the Distance
//!   Between Complex Objects in Three-Dimensional Space" (1988)
//! - van den Bergen: "Collision Detection in Interactive 3D Environments" (2003)

use nalgebra::{Point3, Vector3};
use sim_contact::ContactManifold;

use crate::shape::Shape;

/// Tolerance for numerical comparisons in GJK/EPA.
const EPSILON: f64 = 1e-8;

/// Maximum iterations for GJK before giving up.
const GJK_MAX_ITERATIONS: usize = 64;

/// Maximum iterations for EPA before giving up.
const EPA_MAX_ITERATIONS: usize = 64;

/// Maximum faces in EPA polytope.
const EPA_MAX_FACES: usize = 128;

/// EPA convergence tolerance.
const EPA_TOLERANCE: f64 = 1e-6;

/// Result of a GJK query.
#[derive(Debug, Clone)]
pub struct GjkResult {
    /// Whether the shapes intersect.
    pub intersecting: bool,
    /// The final simplex (seeds EPA when intersecting).
    pub simplex: Simplex,
    /// Number of iterations used.
    pub iterations: usize,
}

/// Penetration found by EPA.
#[derive(Debug, Clone, Copy)]
pub struct EpaResult {
    /// Penetration depth (positive when overlapping).
    pub depth: f64,
    /// Contact normal, A toward B.
    pub normal: Vector3<f64>,
    /// Deepest point of A inside B.
    pub point_a: Point3<f64>,
    /// Deepest point of B inside A.
    pub point_b: Point3<f64>,
    /// Number of iterations used.
    pub iterations: usize,
}

/// A simplex used in GJK iteration.
///
/// Can be a point (1), line segment (2), triangle (3), or tetrahedron (4).
#[derive(Debug, Clone, Default)]
pub struct Simplex {
    points: [MinkowskiPoint; 4],
    size: usize,
}

/// A point in Minkowski space, with support points from both shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinkowskiPoint {
    /// The point in Minkowski space (`support_a` - `support_b`).
    pub point: Point3<f64>,
    /// Support point from shape A in world space.
    pub support_a: Point3<f64>,
    /// Support point from shape B in world space.
    pub support_b: Point3<f64>,
}

impl MinkowskiPoint {
    fn new(support_a: Point3<f64>, support_b: Point3<f64>) -> Self {
        Self {
            point: Point3::from(support_a - support_b),
            support_a,
            support_b,
        }
    }
}

impl Simplex {
    /// Create a new empty simplex.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a point to the front of the simplex.
    pub fn push(&mut self, point: MinkowskiPoint) {
        for i in (1..=self.size.min(3)).rev() {
            self.points[i] = self.points[i - 1];
        }
        self.points[0] = point;
        self.size = (self.size + 1).min(4);
    }

    /// Get the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if the simplex is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Get points as a slice.
    #[must_use]
    pub fn points(&self) -> &[MinkowskiPoint] {
        &self.points[..self.size]
    }

    fn set(&mut self, points: &[MinkowskiPoint]) {
        self.size = points.len().min(4);
        for (i, p) in points.iter().take(4).enumerate() {
            self.points[i] = *p;
        }
    }
}

// =============================================================================
// GJK Algorithm
// =============================================================================

/// Support point on the Minkowski difference A - B.
fn support_minkowski(a: &Shape, b: &Shape, direction: &Vector3<f64>) -> MinkowskiPoint {
    MinkowskiPoint::new(a.support(direction), b.support(&-direction))
}

/// Check if two shapes intersect using GJK.
#[must_use]
pub fn gjk_intersection(a: &Shape, b: &Shape) -> bool {
    gjk_query(a, b).intersecting
}

/// Run the full GJK algorithm and return detailed results.
#[must_use]
pub fn gjk_query(a: &Shape, b: &Shape) -> GjkResult {
    let mut direction = (b.pose().position - a.pose().position)
        .try_normalize(EPSILON)
        .unwrap_or_else(Vector3::x);

    let mut simplex = Simplex::new();
    let first = support_minkowski(a, b, &direction);
    simplex.push(first);
    direction = -first.point.coords;

    for iteration in 0..GJK_MAX_ITERATIONS {
        if direction.norm_squared() < EPSILON * EPSILON {
            // Origin lies on the simplex: touching or intersecting.
            return GjkResult {
                intersecting: true,
                simplex,
                iterations: iteration,
            };
        }

        direction = direction.normalize();
        let new_point = support_minkowski(a, b, &direction);

        if new_point.point.coords.dot(&direction) < -EPSILON {
            return GjkResult {
                intersecting: false,
                simplex,
                iterations: iteration,
            };
        }

        simplex.push(new_point);
        if do_simplex(&mut simplex, &mut direction) {
            return GjkResult {
                intersecting: true,
                simplex,
                iterations: iteration,
            };
        }
    }

    GjkResult {
        intersecting: false,
        simplex,
        iterations: GJK_MAX_ITERATIONS,
    }
}

/// Reduce the simplex to the feature nearest the origin and update the
/// search direction. Returns true if the origin is enclosed.
fn do_simplex(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    match simplex.len() {
        2 => do_simplex_line(simplex, direction),
        3 => do_simplex_triangle(simplex, direction),
        4 => do_simplex_tetrahedron(simplex, direction),
        _ => false,
    }
}

fn do_simplex_line(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    let a = simplex.points[0].point;
    let b = simplex.points[1].point;

    let ab = b - a;
    let ao = -a.coords;

    if ab.dot(&ao) > 0.0 {
        *direction = triple_product(&ab, &ao, &ab);
    } else {
        simplex.set(&[simplex.points[0]]);
        *direction = ao;
    }

    false
}

fn do_simplex_triangle(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    let a = simplex.points[0].point;
    let b = simplex.points[1].point;
    let c = simplex.points[2].point;

    let ab = b - a;
    let ac = c - a;
    let ao = -a.coords;

    let abc = ab.cross(&ac);

    if abc.cross(&ac).dot(&ao) > 0.0 {
        if ac.dot(&ao) > 0.0 {
            simplex.set(&[simplex.points[0], simplex.points[2]]);
            *direction = triple_product(&ac, &ao, &ac);
        } else {
            return simplex_line_case(simplex, direction, &ab, &ao);
        }
    } else if ab.cross(&abc).dot(&ao) > 0.0 {
        return simplex_line_case(simplex, direction, &ab, &ao);
    } else if abc.dot(&ao) > 0.0 {
        *direction = abc;
    } else {
        // Below the triangle: flip winding.
        simplex.set(&[simplex.points[0], simplex.points[2], simplex.points[1]]);
        *direction = -abc;
    }

    false
}

fn simplex_line_case(
    simplex: &mut Simplex,
    direction: &mut Vector3<f64>,
    ab: &Vector3<f64>,
    ao: &Vector3<f64>,
) -> bool {
    if ab.dot(ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[1]]);
        *direction = triple_product(ab, ao, ab);
    } else {
        simplex.set(&[simplex.points[0]]);
        *direction = *ao;
    }
    false
}

fn do_simplex_tetrahedron(simplex: &mut Simplex, direction: &mut Vector3<f64>) -> bool {
    let a = simplex.points[0].point;
    let b = simplex.points[1].point;
    let c = simplex.points[2].point;
    let d = simplex.points[3].point;

    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let ao = -a.coords;

    let abc = ab.cross(&ac);
    let acd = ac.cross(&ad);
    let adb = ad.cross(&ab);

    if abc.dot(&ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[1], simplex.points[2]]);
        return do_simplex_triangle(simplex, direction);
    }

    if acd.dot(&ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[2], simplex.points[3]]);
        return do_simplex_triangle(simplex, direction);
    }

    if adb.dot(&ao) > 0.0 {
        simplex.set(&[simplex.points[0], simplex.points[3], simplex.points[1]]);
        return do_simplex_triangle(simplex, direction);
    }

    true
}

/// Triple product: (A × B) × C = B(A·C) - A(B·C).
#[inline]
fn triple_product(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> Vector3<f64> {
    b * a.dot(c) - a * b.dot(c)
}

// =============================================================================
// EPA Algorithm
// =============================================================================

#[derive(Debug, Clone)]
struct EpaFace {
    vertices: [usize; 3],
    /// Outward unit normal.
    normal: Vector3<f64>,
    /// Distance from the origin along the normal.
    distance: f64,
}

/// Run EPA on a simplex from an intersecting GJK query.
#[must_use]
pub fn epa_query(a: &Shape, b: &Shape, simplex: &Simplex) -> Option<EpaResult> {
    if simplex.len() < 4 {
        return epa_with_expanded_simplex(a, b, simplex);
    }

    let mut vertices: Vec<MinkowskiPoint> = simplex.points().to_vec();
    let mut faces: Vec<EpaFace> = Vec::with_capacity(EPA_MAX_FACES);

    for indices in [[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]] {
        if let Some(face) = create_face(&vertices, indices) {
            faces.push(face);
        }
    }
    fix_face_orientations(&vertices, &mut faces);

    for iteration in 0..EPA_MAX_ITERATIONS {
        let closest_idx = find_closest_face(&faces)?;
        let closest = faces[closest_idx].clone();

        let new_point = support_minkowski(a, b, &closest.normal);
        let new_distance = new_point.point.coords.dot(&closest.normal);
        if new_distance - closest.distance < EPA_TOLERANCE {
            return Some(face_result(&vertices, &closest, iteration));
        }

        let new_vertex_idx = vertices.len();
        vertices.push(new_point);

        // Remove every face that sees the new point; keep its horizon edges.
        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut i = 0;
        while i < faces.len() {
            let face = &faces[i];
            let to_new = new_point.point - vertices[face.vertices[0]].point;
            if face.normal.dot(&to_new) > 0.0 {
                let v = face.vertices;
                add_edge(&mut edges, v[0], v[1]);
                add_edge(&mut edges, v[1], v[2]);
                add_edge(&mut edges, v[2], v[0]);
                faces.swap_remove(i);
            } else {
                i += 1;
            }
        }

        for (v1, v2) in edges {
            if let Some(face) = create_face(&vertices, [new_vertex_idx, v1, v2]) {
                faces.push(face);
            }
        }

        if faces.len() > EPA_MAX_FACES {
            break;
        }
    }

    let closest_idx = find_closest_face(&faces)?;
    Some(face_result(&vertices, &faces[closest_idx], EPA_MAX_ITERATIONS))
}

/// Grow a simplex with fewer than 4 points into a tetrahedron for EPA.
fn epa_with_expanded_simplex(a: &Shape, b: &Shape, simplex: &Simplex) -> Option<EpaResult> {
    let mut vertices: Vec<MinkowskiPoint> = simplex.points().to_vec();

    let search_dirs = [
        Vector3::x(),
        Vector3::y(),
        Vector3::z(),
        -Vector3::x(),
        -Vector3::y(),
        -Vector3::z(),
    ];

    for dir in &search_dirs {
        if vertices.len() >= 4 {
            break;
        }
        let new_point = support_minkowski(a, b, dir);
        let is_new = vertices
            .iter()
            .all(|v| (v.point - new_point.point).norm() > EPSILON);
        if is_new {
            vertices.push(new_point);
        }
    }

    if vertices.len() < 4 {
        return None;
    }

    let mut expanded = Simplex::new();
    for v in vertices.iter().take(4) {
        expanded.push(*v);
    }
    epa_query(a, b, &expanded)
}

fn create_face(vertices: &[MinkowskiPoint], indices: [usize; 3]) -> Option<EpaFace> {
    let a = vertices[indices[0]].point;
    let b = vertices[indices[1]].point;
    let c = vertices[indices[2]].point;

    let normal = (b - a).cross(&(c - a));
    let norm = normal.norm();
    if norm < EPSILON {
        return None;
    }

    let normal = normal / norm;
    Some(EpaFace {
        vertices: indices,
        normal,
        distance: a.coords.dot(&normal),
    })
}

/// Point every normal away from the polytope centroid.
fn fix_face_orientations(vertices: &[MinkowskiPoint], faces: &mut [EpaFace]) {
    #[allow(clippy::cast_precision_loss)]
    let centroid: Vector3<f64> = vertices
        .iter()
        .map(|v| v.point.coords)
        .sum::<Vector3<f64>>()
        / vertices.len() as f64;

    for face in faces.iter_mut() {
        let to_centroid = centroid - vertices[face.vertices[0]].point.coords;
        if face.normal.dot(&to_centroid) > 0.0 {
            face.normal = -face.normal;
            face.distance = -face.distance;
            face.vertices.swap(1, 2);
        }
    }
}

fn find_closest_face(faces: &[EpaFace]) -> Option<usize> {
    faces
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.distance.abs().total_cmp(&b.distance.abs()))
        .map(|(i, _)| i)
}

/// Add an edge, or drop it if its reverse is already present (shared edge).
fn add_edge(edges: &mut Vec<(usize, usize)>, v1: usize, v2: usize) {
    let existing = edges
        .iter()
        .position(|&(a, b)| (a == v2 && b == v1) || (a == v1 && b == v2));

    if let Some(idx) = existing {
        edges.swap_remove(idx);
    } else {
        edges.push((v1, v2));
    }
}

/// Barycentric coordinates of `p` projected onto triangle `abc`.
fn barycentric(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> [f64; 3] {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(&v0);
    let d01 = v0.dot(&v1);
    let d11 = v1.dot(&v1);
    let d20 = v2.dot(&v0);
    let d21 = v2.dot(&v1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < EPSILON * EPSILON {
        return [1.0, 0.0, 0.0];
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    [1.0 - v - w, v, w]
}

fn face_result(vertices: &[MinkowskiPoint], face: &EpaFace, iterations: usize) -> EpaResult {
    let [i0, i1, i2] = face.vertices;
    let (m0, m1, m2) = (vertices[i0], vertices[i1], vertices[i2]);
    let closest = Point3::from(face.normal * face.distance);
    let [u, v, w] = barycentric(&closest, &m0.point, &m1.point, &m2.point);

    let blend = |p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>| {
        Point3::from(p0.coords * u + p1.coords * v + p2.coords * w)
    };

    EpaResult {
        depth: face.distance,
        normal: face.normal,
        point_a: blend(m0.support_a, m1.support_a, m2.support_a),
        point_b: blend(m0.support_b, m1.support_b, m2.support_b),
        iterations,
    }
}

// =============================================================================
// High-Level API
// =============================================================================

/// Contact manifold between two overlapping shapes using GJK+EPA.
///
/// Returns `None` if the shapes don't intersect or EPA degenerates.
#[must_use]
pub fn gjk_epa_contact(a: &Shape, b: &Shape) -> Option<ContactManifold> {
    let gjk = gjk_query(a, b);
    if !gjk.intersecting {
        return None;
    }

    let epa = epa_query(a, b, &gjk.simplex)?;
    Some(ContactManifold::new(
        epa.point_a,
        epa.point_b,
        epa.normal,
        -epa.depth.max(0.0),
    ))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_types::Pose;

    fn placed(mut shape: Shape, x: f64, y: f64, z: f64) -> Shape {
        shape.sync(&Pose::from_position(Point3::new(x, y, z)));
        shape
    }

    fn unit_cube(x: f64, y: f64, z: f64) -> Shape {
        placed(Shape::cube(Vector3::repeat(1.0)), x, y, z)
    }

    #[test]
    fn test_gjk_separated_cubes() {
        assert!(!gjk_intersection(&unit_cube(0.0, 0.0, 0.0), &unit_cube(2.5, 0.0, 0.0)));
        assert!(!gjk_intersection(&unit_cube(0.0, 0.0, 0.0), &unit_cube(2.1, 2.1, 0.0)));
    }

    #[test]
    fn test_gjk_overlapping_cubes() {
        assert!(gjk_intersection(&unit_cube(0.0, 0.0, 0.0), &unit_cube(1.5, 0.3, 0.2)));
    }

    #[test]
    fn test_gjk_sphere_cube() {
        let cube = unit_cube(0.0, 0.0, 0.0);
        assert!(gjk_intersection(&cube, &placed(Shape::sphere(0.5), 1.4, 0.0, 0.0)));
        assert!(!gjk_intersection(&cube, &placed(Shape::sphere(0.5), 1.6, 0.0, 0.0)));
    }

    #[test]
    fn test_epa_cube_face_contact() {
        let a = unit_cube(0.0, 0.0, 0.0);
        let b = unit_cube(1.8, 0.1, -0.2);
        let contact = gjk_epa_contact(&a, &b).unwrap();

        assert_relative_eq!(contact.normal, Vector3::x(), epsilon = 1e-4);
        assert_relative_eq!(contact.separation, -0.2, epsilon = 1e-4);
        // Witness points differ by the penetration vector.
        let gap = contact.point_b - contact.point_a;
        assert_relative_eq!(gap.dot(&contact.normal), contact.separation, epsilon = 1e-6);
    }

    #[test]
    fn test_epa_normal_points_a_to_b() {
        let a = unit_cube(0.0, 0.0, 0.0);
        let b = unit_cube(0.1, 0.0, -1.7);
        let contact = gjk_epa_contact(&a, &b).unwrap();
        assert_relative_eq!(contact.normal, -Vector3::z(), epsilon = 1e-4);
        assert_relative_eq!(contact.depth(), 0.3, epsilon = 1e-4);
    }

    #[test]
    fn test_barycentric_vertices() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let [u, v, w] = barycentric(&Point3::new(0.25, 0.25, 0.0), &a, &b, &c);
        assert_relative_eq!(u, 0.5, epsilon = 1e-12);
        assert_relative_eq!(v, 0.25, epsilon = 1e-12);
        assert_relative_eq!(w, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_simplex_push_order() {
        let mut s = Simplex::new();
        assert!(s.is_empty());
        for i in 0..5 {
            #[allow(clippy::cast_precision_loss)]
            let p = Point3::new(i as f64, 0.0, 0.0);
            s.push(MinkowskiPoint::new(p, Point3::origin()));
        }
        assert_eq!(s.len(), 4);
        assert_eq!(s.points()[0].point.x, 4.0);
        assert_eq!(s.points()[3].point.x, 1.0);
    }
}
