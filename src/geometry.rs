use kurbo::Point;

use crate::error::{FrameupError, FrameupResult};

/// Destination corners of a frame opening, in background pixel coordinates,
/// ordered clockwise from top-left.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CornerQuad {
    pub corners: [Point; 4],
}

impl CornerQuad {
    pub fn new(corners: [Point; 4]) -> FrameupResult<Self> {
        let quad = Self { corners };
        quad.validate()?;
        Ok(quad)
    }

    /// Rejects quads that would make the homography singular or the warp
    /// non-physical: non-finite coordinates, any three corners collinear,
    /// or a self-intersecting (bowtie) outline.
    pub fn validate(&self) -> FrameupResult<()> {
        for (i, p) in self.corners.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(FrameupError::degenerate_geometry(format!(
                    "corner {i} is not finite"
                )));
            }
        }

        let scale = self.extent().max(1.0);
        let area_eps = 1e-6 * scale * scale;
        let c = &self.corners;
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            let d = c[(i + 2) % 4];
            if cross(b - a, d - a).abs() <= area_eps {
                return Err(FrameupError::degenerate_geometry(format!(
                    "corners {}, {}, {} are collinear",
                    i,
                    (i + 1) % 4,
                    (i + 2) % 4
                )));
            }
        }

        if segments_cross(c[0], c[1], c[2], c[3]) || segments_cross(c[1], c[2], c[3], c[0]) {
            return Err(FrameupError::degenerate_geometry(
                "corner quadrilateral is self-intersecting",
            ));
        }

        Ok(())
    }

    /// True when opposite edges are parallel, i.e. the pure
    /// scale/rotate/skew case with no perspective foreshortening.
    pub fn is_parallelogram(&self) -> bool {
        let c = &self.corners;
        let px = c[0].x - c[1].x + c[2].x - c[3].x;
        let py = c[0].y - c[1].y + c[2].y - c[3].y;
        let tol = 1e-9 * self.extent().max(1.0);
        px.abs() <= tol && py.abs() <= tol
    }

    /// Point-in-quad test against the clockwise outline.
    pub fn contains(&self, p: Point) -> bool {
        let c = &self.corners;
        (0..4).all(|i| cross(c[(i + 1) % 4] - c[i], p - c[i]) >= 0.0)
    }

    pub fn bounding_box(&self) -> kurbo::Rect {
        let xs = self.corners.map(|p| p.x);
        let ys = self.corners.map(|p| p.y);
        kurbo::Rect::new(
            xs.iter().copied().fold(f64::INFINITY, f64::min),
            ys.iter().copied().fold(f64::INFINITY, f64::min),
            xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    }

    pub fn center(&self) -> Point {
        let c = &self.corners;
        Point::new(
            (c[0].x + c[1].x + c[2].x + c[3].x) / 4.0,
            (c[0].y + c[1].y + c[2].y + c[3].y) / 4.0,
        )
    }

    fn extent(&self) -> f64 {
        let bb = self.bounding_box();
        bb.width().abs().max(bb.height().abs())
    }
}

fn cross(a: kurbo::Vec2, b: kurbo::Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Proper intersection of open segments (shared endpoints do not count).
fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = cross(b - a, c - a);
    let d2 = cross(b - a, d - a);
    let d3 = cross(d - c, a - c);
    let d4 = cross(d - c, b - c);
    (d1 > 0.0) != (d2 > 0.0) && (d3 > 0.0) != (d4 > 0.0) && d1 != 0.0 && d2 != 0.0
}

/// A 3x3 projective transform, row-major. The perspective row is `0, 0, 1`
/// whenever the destination is a parallelogram, in which case the affine
/// solve and the general solve agree exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub m: [f64; 9],
}

impl Homography {
    /// Maps the artwork rectangle `(0,0),(W,0),(W,H),(0,H)` onto the
    /// destination corners, clockwise from top-left.
    pub fn rect_to_quad(width: f64, height: f64, quad: &CornerQuad) -> FrameupResult<Self> {
        if !(width > 0.0 && height > 0.0) || !width.is_finite() || !height.is_finite() {
            return Err(FrameupError::validation(
                "source rectangle dimensions must be finite and > 0",
            ));
        }
        quad.validate()?;

        let unit = Self::unit_square_to_quad(quad)?;
        // Prepend the (1/W, 1/H) scale that takes pixel coordinates to the
        // unit square.
        let m = unit.m;
        Ok(Self {
            m: [
                m[0] / width,
                m[1] / height,
                m[2],
                m[3] / width,
                m[4] / height,
                m[5],
                m[6] / width,
                m[7] / height,
                m[8],
            ],
        })
    }

    /// Square-to-quad solve after Heckbert. The parallelogram branch is an
    /// optimization with results identical to the general one.
    fn unit_square_to_quad(quad: &CornerQuad) -> FrameupResult<Self> {
        let [p0, p1, p2, p3] = quad.corners;
        let px = p0.x - p1.x + p2.x - p3.x;
        let py = p0.y - p1.y + p2.y - p3.y;

        if quad.is_parallelogram() {
            return Ok(Self {
                m: [
                    p1.x - p0.x,
                    p3.x - p0.x,
                    p0.x,
                    p1.y - p0.y,
                    p3.y - p0.y,
                    p0.y,
                    0.0,
                    0.0,
                    1.0,
                ],
            });
        }

        let dx1 = p1.x - p2.x;
        let dx2 = p3.x - p2.x;
        let dy1 = p1.y - p2.y;
        let dy2 = p3.y - p2.y;
        let den = dx1 * dy2 - dy1 * dx2;
        if den.abs() < 1e-12 {
            return Err(FrameupError::degenerate_geometry(
                "perspective solve denominator vanishes",
            ));
        }

        let g = (px * dy2 - py * dx2) / den;
        let h = (dx1 * py - dy1 * px) / den;
        Ok(Self {
            m: [
                p1.x - p0.x + g * p1.x,
                p3.x - p0.x + h * p3.x,
                p0.x,
                p1.y - p0.y + g * p1.y,
                p3.y - p0.y + h * p3.y,
                p0.y,
                g,
                h,
                1.0,
            ],
        })
    }

    pub fn apply(&self, p: Point) -> Point {
        let m = &self.m;
        let w = m[6] * p.x + m[7] * p.y + m[8];
        Point::new(
            (m[0] * p.x + m[1] * p.y + m[2]) / w,
            (m[3] * p.x + m[4] * p.y + m[5]) / w,
        )
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6])
    }

    /// Adjugate inverse for per-destination-pixel sampling.
    pub fn inverse(&self) -> FrameupResult<Self> {
        let det = self.determinant();
        let norm = self.m.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if det.abs() <= 1e-12 * norm * norm * norm {
            return Err(FrameupError::degenerate_geometry(
                "homography is singular (determinant ~ 0)",
            ));
        }

        let m = &self.m;
        let adj = [
            m[4] * m[8] - m[5] * m[7],
            m[2] * m[7] - m[1] * m[8],
            m[1] * m[5] - m[2] * m[4],
            m[5] * m[6] - m[3] * m[8],
            m[0] * m[8] - m[2] * m[6],
            m[2] * m[3] - m[0] * m[5],
            m[3] * m[7] - m[4] * m[6],
            m[1] * m[6] - m[0] * m[7],
            m[0] * m[4] - m[1] * m[3],
        ];
        Ok(Self {
            m: adj.map(|v| v / det),
        })
    }
}
