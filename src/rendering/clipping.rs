//! Homogeneous clip-space clipping.
//!
//! Triangles go through Sutherland–Hodgman against every active plane and
//! come out as a convex polygon; lines are shortened in place; points are
//! accepted or rejected by outcode. The x/y planes sit at a guard band of
//! `GUARD_BAND * w`, so geometry that only pokes a little past the viewport
//! is left to the rasterizer's clip rect instead of being split here.

use super::vertex::VertexOutput;
use crate::fixed::{self, Fixed, FIX_SHIFT};

/// Guard band half-extent as a multiple of `w`.
pub const GUARD_BAND: i64 = 4;
/// Smallest `w` that survives clipping (16.16, 1/256).
pub const NEAR_W_EPSILON: Fixed = 1 << 8;
/// Largest polygon a triangle can become: 3 vertices plus one per plane.
pub const CLIP_BUFFER: usize = 16;

const PLANE_COUNT: usize = 7;

/// Signed distance of `v` to plane `plane`; `>= 0` is inside.
#[inline(always)]
fn distance(v: &VertexOutput, plane: usize) -> i64 {
    let (x, y, z, w) = (v.x as i64, v.y as i64, v.z as i64, v.w as i64);
    match plane {
        0 => w - NEAR_W_EPSILON as i64,
        1 => z + w,
        2 => w - z,
        3 => x + GUARD_BAND * w,
        4 => GUARD_BAND * w - x,
        5 => y + GUARD_BAND * w,
        _ => GUARD_BAND * w - y,
    }
}

/// One bit per plane the vertex is outside of.
#[inline]
pub fn outcode(v: &VertexOutput) -> u8 {
    let mut code = 0;
    for plane in 0..PLANE_COUNT {
        if distance(v, plane) < 0 {
            code |= 1 << plane;
        }
    }
    code
}

/// Vertex on the segment `inside -> outside` where the plane distance is zero.
///
/// Always interpolates from the inside vertex so an edge shared by two
/// triangles produces the same crossing no matter which way it is walked.
#[inline]
fn intersect(
    inside: &VertexOutput,
    outside: &VertexOutput,
    d_in: i64,
    d_out: i64,
    varying_count: usize,
) -> VertexOutput {
    debug_assert!(d_in >= 0 && d_out < 0);
    let t = ((d_in << FIX_SHIFT) / (d_in - d_out)) as Fixed;
    let mut r = VertexOutput {
        x: fixed::lerp(inside.x, outside.x, t),
        y: fixed::lerp(inside.y, outside.y, t),
        z: fixed::lerp(inside.z, outside.z, t),
        w: fixed::lerp(inside.w, outside.w, t),
        ..VertexOutput::default()
    };
    for i in 0..varying_count {
        r.varyings[i] = fixed::lerp(inside.varyings[i], outside.varyings[i], t);
    }
    r
}

/// Reusable scratch space for polygon clipping.
pub struct Clipper {
    a: [VertexOutput; CLIP_BUFFER],
    b: [VertexOutput; CLIP_BUFFER],
}

impl Clipper {
    pub fn new() -> Self {
        Self {
            a: [VertexOutput::default(); CLIP_BUFFER],
            b: [VertexOutput::default(); CLIP_BUFFER],
        }
    }

    /// Clip a triangle and return the resulting convex polygon in the
    /// original winding order. Empty when the triangle is entirely outside.
    pub fn clip_triangle(
        &mut self,
        v0: &VertexOutput,
        v1: &VertexOutput,
        v2: &VertexOutput,
        varying_count: usize,
    ) -> &[VertexOutput] {
        let codes = [outcode(v0), outcode(v1), outcode(v2)];
        self.a[0] = *v0;
        self.a[1] = *v1;
        self.a[2] = *v2;
        if codes[0] & codes[1] & codes[2] != 0 {
            return &self.a[..0];
        }
        let spanning = codes[0] | codes[1] | codes[2];
        if spanning == 0 {
            return &self.a[..3];
        }

        let mut len = 3;
        // `a` holds the current polygon, `b` receives the next one.
        for plane in 0..PLANE_COUNT {
            if spanning & (1 << plane) == 0 {
                continue;
            }
            let mut out = 0;
            let mut prev = len - 1;
            let mut prev_d = distance(&self.a[prev], plane);
            for curr in 0..len {
                let curr_d = distance(&self.a[curr], plane);
                match (prev_d >= 0, curr_d >= 0) {
                    (true, true) => {
                        self.b[out] = self.a[curr];
                        out += 1;
                    }
                    (true, false) => {
                        self.b[out] =
                            intersect(&self.a[prev], &self.a[curr], prev_d, curr_d, varying_count);
                        out += 1;
                    }
                    (false, true) => {
                        self.b[out] =
                            intersect(&self.a[curr], &self.a[prev], curr_d, prev_d, varying_count);
                        self.b[out + 1] = self.a[curr];
                        out += 2;
                    }
                    (false, false) => {}
                }
                prev = curr;
                prev_d = curr_d;
            }
            std::mem::swap(&mut self.a, &mut self.b);
            len = out;
            if len < 3 {
                return &self.a[..0];
            }
        }
        &self.a[..len]
    }
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

/// Clip a segment against all planes. `None` when nothing remains.
pub fn clip_line(
    a: &VertexOutput,
    b: &VertexOutput,
    varying_count: usize,
) -> Option<(VertexOutput, VertexOutput)> {
    let (ca, cb) = (outcode(a), outcode(b));
    if ca & cb != 0 {
        return None;
    }
    let (mut a, mut b) = (*a, *b);
    if ca | cb == 0 {
        return Some((a, b));
    }
    for plane in 0..PLANE_COUNT {
        if (ca | cb) & (1 << plane) == 0 {
            continue;
        }
        let da = distance(&a, plane);
        let db = distance(&b, plane);
        match (da >= 0, db >= 0) {
            (true, true) => {}
            (false, false) => return None,
            (true, false) => b = intersect(&a, &b, da, db, varying_count),
            (false, true) => a = intersect(&b, &a, db, da, varying_count),
        }
    }
    Some((a, b))
}

/// Points are never split, only kept or dropped.
#[inline]
pub fn point_visible(v: &VertexOutput) -> bool {
    outcode(v) == 0
}
