//! Exact attribute interpolation for scan conversion.
//!
//! Setup works on the same 24.8 snapped coordinates as the edge functions and
//! evaluates plane equations in `i128` at pixel centres. Perspective mode keeps
//! the numerator planes (`varying * oow`) and the `oow` plane separately and
//! divides them at each evaluation; depth is always screen-linear.

use super::vertex::{FragmentData, ScreenVertex, MAX_VARYINGS};
use crate::fixed::{snap_subpixel, Fixed, SUBPIXEL_HALF, SUBPIXEL_ONE};

/// Anything that can produce the fragment state at a pixel centre.
pub trait Interpolant {
    fn fragment_at(&self, px: i32, py: i32) -> FragmentData;
}

/// `base + dx * ex + dy * ey`, scaled by the setup's denominator.
#[derive(Clone, Copy, Debug, Default)]
struct Plane {
    base: i128,
    dx: i128,
    dy: i128,
}

impl Plane {
    #[inline(always)]
    fn eval(&self, ex: i128, ey: i128) -> i128 {
        self.base + self.dx * ex + self.dy * ey
    }
}

#[inline(always)]
fn div_or_zero(n: i128, d: i128) -> Fixed {
    if d <= 0 {
        0
    } else {
        (n / d) as Fixed
    }
}

/// Plane setup for one triangle.
pub struct TriangleSetup {
    x0: i64,
    y0: i64,
    area2: i128,
    perspective: bool,
    varying_count: usize,
    with_z: bool,
    z: Plane,
    q: Plane,
    v: [Plane; MAX_VARYINGS],
}

impl TriangleSetup {
    /// `v0, v1, v2` must be ordered so that their snapped doubled area is positive.
    pub fn new(
        v0: &ScreenVertex,
        v1: &ScreenVertex,
        v2: &ScreenVertex,
        perspective: bool,
        varying_count: usize,
        with_z: bool,
    ) -> Self {
        let (x0, y0) = (snap_subpixel(v0.x), snap_subpixel(v0.y));
        let (x1, y1) = (snap_subpixel(v1.x) - x0, snap_subpixel(v1.y) - y0);
        let (x2, y2) = (snap_subpixel(v2.x) - x0, snap_subpixel(v2.y) - y0);
        let (x1, y1, x2, y2) = (x1 as i128, y1 as i128, x2 as i128, y2 as i128);
        let area2 = x1 * y2 - x2 * y1;
        debug_assert!(area2 > 0);

        // Plane through (0, a0), (p1, a1), (p2, a2), scaled by area2.
        let plane = |a0: i128, a1: i128, a2: i128| {
            let (d1, d2) = (a1 - a0, a2 - a0);
            Plane {
                base: a0 * area2,
                dx: d1 * y2 - d2 * y1,
                dy: d2 * x1 - d1 * x2,
            }
        };

        let mut setup = Self {
            x0,
            y0,
            area2,
            perspective,
            varying_count,
            with_z,
            z: Plane::default(),
            q: Plane::default(),
            v: [Plane::default(); MAX_VARYINGS],
        };
        if with_z {
            setup.z = plane(v0.z as i128, v1.z as i128, v2.z as i128);
        }
        if perspective {
            let (q0, q1, q2) = (v0.oow as i128, v1.oow as i128, v2.oow as i128);
            setup.q = plane(q0, q1, q2);
            for i in 0..varying_count {
                setup.v[i] = plane(
                    v0.varyings[i] as i128 * q0,
                    v1.varyings[i] as i128 * q1,
                    v2.varyings[i] as i128 * q2,
                );
            }
        } else {
            for i in 0..varying_count {
                setup.v[i] = plane(
                    v0.varyings[i] as i128,
                    v1.varyings[i] as i128,
                    v2.varyings[i] as i128,
                );
            }
        }
        setup
    }

    pub fn is_perspective(&self) -> bool {
        self.perspective
    }
}

impl Interpolant for TriangleSetup {
    #[inline]
    fn fragment_at(&self, px: i32, py: i32) -> FragmentData {
        let ex = (px as i64 * SUBPIXEL_ONE + SUBPIXEL_HALF - self.x0) as i128;
        let ey = (py as i64 * SUBPIXEL_ONE + SUBPIXEL_HALF - self.y0) as i128;
        let mut fd = FragmentData::default();
        if self.with_z {
            fd.z = div_or_zero(self.z.eval(ex, ey), self.area2);
        }
        let denom = if self.perspective {
            self.q.eval(ex, ey)
        } else {
            self.area2
        };
        for i in 0..self.varying_count {
            fd.varyings[i] = div_or_zero(self.v[i].eval(ex, ey), denom);
        }
        fd
    }
}

/// Setup for a line: interpolation along the major axis only.
pub struct LineSetup {
    x_major: bool,
    origin: i64,
    len: i128,
    perspective: bool,
    varying_count: usize,
    with_z: bool,
    z: (i128, i128),
    q: (i128, i128),
    v: [(i128, i128); MAX_VARYINGS],
}

impl LineSetup {
    /// The endpoints must differ along the major axis after snapping.
    pub fn new(
        v0: &ScreenVertex,
        v1: &ScreenVertex,
        x_major: bool,
        perspective: bool,
        varying_count: usize,
        with_z: bool,
    ) -> Self {
        let (m0, m1) = if x_major {
            (snap_subpixel(v0.x), snap_subpixel(v1.x))
        } else {
            (snap_subpixel(v0.y), snap_subpixel(v1.y))
        };
        let len = (m1 - m0) as i128;
        debug_assert!(len != 0);
        // (value at m0 scaled by len, slope numerator)
        let line = |a0: i128, a1: i128| (a0 * len, a1 - a0);

        let mut setup = Self {
            x_major,
            origin: m0,
            len,
            perspective,
            varying_count,
            with_z,
            z: (0, 0),
            q: (0, 0),
            v: [(0, 0); MAX_VARYINGS],
        };
        if with_z {
            setup.z = line(v0.z as i128, v1.z as i128);
        }
        if perspective {
            let (q0, q1) = (v0.oow as i128, v1.oow as i128);
            setup.q = line(q0, q1);
            for i in 0..varying_count {
                setup.v[i] = line(v0.varyings[i] as i128 * q0, v1.varyings[i] as i128 * q1);
            }
        } else {
            for i in 0..varying_count {
                setup.v[i] = line(v0.varyings[i] as i128, v1.varyings[i] as i128);
            }
        }
        setup
    }
}

impl Interpolant for LineSetup {
    #[inline]
    fn fragment_at(&self, px: i32, py: i32) -> FragmentData {
        let p = if self.x_major { px } else { py };
        let e = (p as i64 * SUBPIXEL_ONE + SUBPIXEL_HALF - self.origin) as i128;
        // Normalize so the shared denominator is positive.
        let sign = if self.len < 0 { -1 } else { 1 };
        let mut fd = FragmentData::default();
        if self.with_z {
            fd.z = div_or_zero(sign * (self.z.0 + self.z.1 * e), sign * self.len);
        }
        let denom = if self.perspective {
            sign * (self.q.0 + self.q.1 * e)
        } else {
            sign * self.len
        };
        for i in 0..self.varying_count {
            let (base, slope) = self.v[i];
            fd.varyings[i] = div_or_zero(sign * (base + slope * e), denom);
        }
        fd
    }
}
