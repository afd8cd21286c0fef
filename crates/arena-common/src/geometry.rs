//! Vector and shape helpers used by movement, targeting and area effects.
//!
//! All shapes live on the ground plane (`x`, `y`). Height is only tracked for
//! projectiles and knock-up arcs, which use [`Vec3`].

use glam::{Vec2, Vec3};

/// Lengths below this are treated as zero.
pub const EPSILON: f32 = 1e-4;

/// Rotates `v` counter-clockwise by `radians`.
#[must_use]
pub fn rotate(v: Vec2, radians: f32) -> Vec2 {
    Vec2::from_angle(radians).rotate(v)
}

/// Heading angle in radians of a direction vector.
#[must_use]
pub fn heading(direction: Vec2) -> f32 {
    direction.y.atan2(direction.x)
}

/// Unit vector from `from` toward `to`, or zero if they coincide.
#[must_use]
pub fn direction_to(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalize_or_zero()
}

/// Circle overlap test: `distance² ≤ (r1 + r2)²`.
#[must_use]
pub fn circles_collide(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let reach = ra + rb;
    a.distance_squared(b) <= reach * reach
}

/// Gap between two circles' edges. Negative when they overlap.
#[must_use]
pub fn edge_distance(a: Vec2, ra: f32, b: Vec2, rb: f32) -> f32 {
    a.distance(b) - ra - rb
}

/// Closest point to `p` on the segment `a`-`b`.
#[must_use]
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON * EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Whether the segment `a`-`b` touches the circle at `center`.
#[must_use]
pub fn segment_intersects_circle(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> bool {
    closest_point_on_segment(a, b, center).distance_squared(center) <= radius * radius
}

/// Parameter `t` in `[0, 1]` at which travelling from `a` to `b` first
/// touches the circle, or `None` if the segment misses it.
///
/// Returns `Some(0.0)` when `a` already lies inside the circle.
#[must_use]
pub fn segment_circle_entry(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let d = b - a;
    let f = a - center;
    let c = f.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let qa = d.length_squared();
    if qa < EPSILON * EPSILON {
        return None;
    }
    let qb = 2.0 * f.dot(d);
    let disc = qb * qb - 4.0 * qa * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-qb - disc.sqrt()) / (2.0 * qa);
    (0.0..=1.0).contains(&t).then_some(t)
}

/// Whether a mover that went from `old` to `new` has gone past `target`.
///
/// The target is behind the mover once the vectors `old→target` and
/// `new→target` stop pointing the same way. Landing exactly on the target
/// counts as passing it.
#[must_use]
pub fn has_passed(old: Vec3, new: Vec3, target: Vec3) -> bool {
    (target - old).dot(target - new) <= 0.0
}

/// A convex ground-plane shape used for area sweeps.
pub trait Area {
    /// Corners in winding order.
    fn vertices(&self) -> &[Vec2];

    /// Axis-aligned bounding box as `(min, max)`.
    fn bounds(&self) -> (Vec2, Vec2) {
        self.vertices()
            .iter()
            .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            })
    }

    /// Whether `point` is inside or on the boundary.
    fn contains(&self, point: Vec2) -> bool {
        let verts = self.vertices();
        let mut sign = 0.0_f32;
        for (i, a) in verts.iter().enumerate() {
            let b = verts[(i + 1) % verts.len()];
            let cross = (b - *a).perp_dot(point - *a);
            if cross.abs() <= EPSILON {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Whether a circle overlaps the shape.
    fn intersects_circle(&self, center: Vec2, radius: f32) -> bool {
        if self.contains(center) {
            return true;
        }
        let verts = self.vertices();
        verts.iter().enumerate().any(|(i, a)| {
            let b = verts[(i + 1) % verts.len()];
            segment_intersects_circle(*a, b, center, radius)
        })
    }
}

/// Oriented rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    corners: [Vec2; 4],
}

impl Rect {
    /// Rectangle starting at `origin` and extending `length` along
    /// `direction`, `width` wide and centred on that axis.
    #[must_use]
    pub fn along(origin: Vec2, direction: Vec2, length: f32, width: f32) -> Self {
        let dir = direction.normalize_or_zero();
        let side = dir.perp() * (width * 0.5);
        let tip = origin + dir * length;
        Self {
            corners: [origin + side, tip + side, tip - side, origin - side],
        }
    }

    /// Axis-aligned rectangle from min and max corners.
    #[must_use]
    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self {
            corners: [
                min,
                Vec2::new(max.x, min.y),
                max,
                Vec2::new(min.x, max.y),
            ],
        }
    }
}

impl Area for Rect {
    fn vertices(&self) -> &[Vec2] {
        &self.corners
    }
}

/// Triangle, typically a cone opening from an apex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    corners: [Vec2; 3],
}

impl Triangle {
    /// Creates a triangle from three corners.
    #[must_use]
    pub const fn new(a: Vec2, b: Vec2, c: Vec2) -> Self {
        Self { corners: [a, b, c] }
    }

    /// Cone with its apex at `apex`, opening `spread` radians around
    /// `direction`, with sides `length` long.
    #[must_use]
    pub fn cone(apex: Vec2, direction: Vec2, length: f32, spread: f32) -> Self {
        let dir = direction.normalize_or_zero();
        let half = spread * 0.5;
        Self::new(
            apex,
            apex + rotate(dir, half) * length,
            apex + rotate(dir, -half) * length,
        )
    }
}

impl Area for Triangle {
    fn vertices(&self) -> &[Vec2] {
        &self.corners
    }
}
