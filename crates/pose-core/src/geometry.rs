use serde::Serialize;

/// Point in normalized image coordinates (`0.0..=1.0` on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Project onto a pixel grid of the given size, clamped to the last row/column.
    pub fn to_pixel(self, width: u32, height: u32) -> (i32, i32) {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        let px = (self.x * width as f32).clamp(0.0, max_x);
        let py = (self.y * height as f32).clamp(0.0, max_y);
        (px.round() as i32, py.round() as i32)
    }
}

impl From<(f32, f32)> for Point2D {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Angle in degrees at vertex `b` between the rays `b→a` and `b→c`.
///
/// Computed from the difference of the two rays' polar angles and folded into
/// `0.0..=180.0`. Coincident points produce `0.0`.
pub fn joint_angle(a: Point2D, b: Point2D, c: Point2D) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let degrees = radians.to_degrees().abs();
    let folded = if degrees > 180.0 {
        360.0 - degrees
    } else {
        degrees
    };
    folded.clamp(0.0, 180.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn p(x: f32, y: f32) -> Point2D {
        Point2D::new(x, y)
    }

    #[test]
    fn same_ray_is_zero() {
        assert!(joint_angle(p(1.0, 0.0), p(0.0, 0.0), p(1.0, 0.0)).abs() < EPS);
    }

    #[test]
    fn opposite_rays_are_straight() {
        let angle = joint_angle(p(1.0, 0.0), p(0.0, 0.0), p(-1.0, 0.0));
        assert!((angle - 180.0).abs() < EPS, "got {angle}");
    }

    #[test]
    fn perpendicular_rays_are_right_angle() {
        let angle = joint_angle(p(1.0, 0.0), p(0.0, 0.0), p(0.0, 1.0));
        assert!((angle - 90.0).abs() < EPS, "got {angle}");
    }

    #[test]
    fn reflex_difference_is_folded() {
        // Polar angles -170° and +170° differ by 340°, which folds to 20°.
        let a = p(-(10f32.to_radians().cos()), -(10f32.to_radians().sin()));
        let c = p(-(10f32.to_radians().cos()), 10f32.to_radians().sin());
        let angle = joint_angle(a, p(0.0, 0.0), c);
        assert!((angle - 20.0).abs() < 1e-3, "got {angle}");
    }

    #[test]
    fn symmetric_and_bounded() {
        let points = [
            p(0.1, 0.9),
            p(0.5, 0.5),
            p(0.9, 0.2),
            p(0.0, 0.0),
            p(1.0, 1.0),
            p(0.3, 0.7),
            p(0.5, 0.5),
        ];
        for a in points {
            for b in points {
                for c in points {
                    let forward = joint_angle(a, b, c);
                    let backward = joint_angle(c, b, a);
                    assert_eq!(forward, backward);
                    assert!((0.0..=180.0).contains(&forward), "{forward} out of range");
                }
            }
        }
    }

    #[test]
    fn coincident_points_are_zero() {
        let x = p(0.4, 0.4);
        assert_eq!(joint_angle(x, x, x), 0.0);
    }

    #[test]
    fn pixel_projection_clamps() {
        assert_eq!(p(0.5, 0.5).to_pixel(100, 50), (50, 25));
        assert_eq!(p(1.5, -0.2).to_pixel(100, 50), (99, 0));
    }
}
