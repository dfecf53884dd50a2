// Clipping through the full geometry path: shared edges stay watertight after
// clipping, the near plane cuts lines at the exact crossing, and triangles
// inside the guard band are left to the rasterizer.

use subdiv_raster::fixed::{from_int, snap_subpixel, Fixed, FIX_ONE};
use subdiv_raster::*;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Clip([f32; 4]);

/// Passes the clip position through and exposes x as varying 0.
struct PassVs;

impl VertexShader for PassVs {
    const ATTRIBUTE_COUNT: usize = 1;
    const VARYING_COUNT: usize = 1;

    fn shade(&self, input: &VertexInput<'_>, out: &mut VertexOutput) {
        let p: Clip = input.read(0);
        out.set_position(glam::Vec4::from_array(p.0));
        out.varyings[0] = out.x;
    }
}

struct CountFs;

impl FragmentShader for CountFs {
    const VARYING_COUNT: usize = 1;
    const INTERPOLATE_Z: bool = false;
}

impl<T: PixelTarget<Pixel = u32>> SingleSampleShader<T> for CountFs {
    fn single_fragment(&self, x: i32, y: i32, _fd: &FragmentData, target: &mut T) {
        *target.pixel_mut(x as usize, y as usize) += 1;
    }
}

/// Sink that keeps the screen-space primitives it receives.
#[derive(Default)]
struct Capture {
    lines: Vec<(ScreenVertex, ScreenVertex)>,
    triangles: Vec<[ScreenVertex; 3]>,
}

impl PrimitiveSink for Capture {
    fn varying_count(&self) -> usize {
        1
    }
    fn bounds(&self) -> Rect {
        Rect::new(0, 0, 64, 64)
    }
    fn draw_triangle(&mut self, v0: &ScreenVertex, v1: &ScreenVertex, v2: &ScreenVertex) {
        self.triangles.push([*v0, *v1, *v2]);
    }
    fn draw_line(&mut self, v0: &ScreenVertex, v1: &ScreenVertex) {
        self.lines.push((*v0, *v1));
    }
    fn draw_point(&mut self, _: &ScreenVertex) {}
}

fn render_counts(size: i32, verts: &[Clip], indices: &[u32]) -> Vec<u32> {
    let mut counts = vec![0u32; (size * size) as usize];
    {
        let target = PixelBuffer::packed(&mut counts[..], size as usize, size as usize).unwrap();
        let bounds = Rect::new(0, 0, size, size);
        let r = Rasterizer::new(GenericSpanDrawer::new(CountFs, target), bounds).unwrap();
        let mut gp = GeometryProcessor::new(PassVs, r).unwrap();
        gp.set_cull_mode(CullMode::None);
        let attribs = VertexAttribs::single(AttributeStream::from_slice(verts));
        gp.draw_triangles(&attribs, indices).unwrap();
    }
    counts
}

#[test]
fn quad_far_past_the_guard_band_covers_every_pixel_once() {
    let verts = [
        Clip([-10.0, -10.0, 0.0, 1.0]),
        Clip([10.0, -10.0, 0.0, 1.0]),
        Clip([10.0, 10.0, 0.0, 1.0]),
        Clip([-10.0, 10.0, 0.0, 1.0]),
    ];
    let counts = render_counts(64, &verts, &[0, 1, 2, 0, 2, 3]);
    assert!(counts.iter().all(|&n| n == 1));
}

#[test]
fn mesh_crossing_the_near_plane_has_no_overlap() {
    // A floor strip running from in front of the camera to behind it.
    let mut verts = Vec::new();
    let mut indices = Vec::new();
    for i in 0..6 {
        let w = 3.0 - i as f32;
        verts.push(Clip([-1.5, -0.8, 0.0, w]));
        verts.push(Clip([1.5, -0.8, 0.0, w]));
        if i > 0 {
            let b = 2 * (i - 1) as u32;
            indices.extend_from_slice(&[b, b + 1, b + 3, b, b + 3, b + 2]);
        }
    }
    let counts = render_counts(64, &verts, &indices);
    assert!(counts.iter().all(|&n| n <= 1));
    assert!(counts.iter().filter(|&&n| n == 1).count() > 200);
}

#[test]
fn near_plane_cuts_lines_at_the_exact_crossing() {
    // w runs from 2 down to -2 and x stays inside the guard band at the cut.
    let verts = [Clip([0.0, 0.0, 0.0, 2.0]), Clip([1.0 / 64.0, 0.0, 0.0, -2.0])];
    let mut gp = GeometryProcessor::new(PassVs, Capture::default()).unwrap();
    gp.draw_lines(&VertexAttribs::single(AttributeStream::from_slice(&verts)), &[0, 1]).unwrap();
    let sink = gp.into_sink();
    assert_eq!(sink.lines.len(), 1);
    let (a, b) = sink.lines[0];
    assert_eq!((a.x, a.y), (from_int(32), from_int(32)));

    // Distances to w = 1/256 are 2 - 1/256 and -2 - 1/256, so
    // t = (130816 << 16) / 262144 = 32704 and the cut lands exactly on w = 256.
    let t: i64 = 32704;
    let x = (1024 * t) >> 16;
    assert_eq!(x, 511);
    assert_eq!(b.varyings[0] as i64, x);
    assert_eq!(b.oow, subdiv_raster::rendering::vertex::oow_from_w(256));
    // Screen x = 32 + 32 * x / w.
    let expected_x = from_int(32) as i64 + (x * (32 * FIX_ONE) as i64).div_euclid(256);
    assert_eq!(b.x as i64, expected_x);
    assert_eq!(b.y, from_int(32));
}

#[test]
fn triangles_inside_the_guard_band_are_not_split() {
    // Screen (x + 1) * 32, (1 - y) * 32 on a 64 × 64 viewport: all integer positions.
    let verts = [
        Clip([-2.0, -1.5, 0.0, 1.0]),
        Clip([1.5, 2.0, 0.0, 1.0]),
        Clip([0.5, -3.0, 0.0, 1.0]),
    ];
    let mut gp = GeometryProcessor::new(PassVs, Capture::default()).unwrap();
    gp.set_cull_mode(CullMode::None);
    let attribs = VertexAttribs::single(AttributeStream::from_slice(&verts));
    gp.draw_triangles(&attribs, &[0, 1, 2]).unwrap();
    let tris = gp.into_sink().triangles;
    assert_eq!(tris.len(), 1);
    let corners: Vec<(Fixed, Fixed)> = tris[0].iter().map(|v| (v.x, v.y)).collect();
    assert_eq!(
        corners,
        vec![
            (from_int(-32), from_int(80)),
            (from_int(80), from_int(-32)),
            (from_int(48), from_int(128)),
        ]
    );
}

#[test]
fn guard_band_triangle_matches_direct_rasterization() {
    let verts = [
        Clip([-2.0, -1.5, 0.0, 1.0]),
        Clip([1.5, 2.0, 0.0, 1.0]),
        Clip([0.5, -3.0, 0.0, 1.0]),
    ];
    let via_pipeline = render_counts(64, &verts, &[0, 1, 2]);

    let mut direct = vec![0u32; 64 * 64];
    {
        let target = PixelBuffer::packed(&mut direct[..], 64, 64).unwrap();
        let bounds = Rect::new(0, 0, 64, 64);
        let mut r = Rasterizer::new(GenericSpanDrawer::new(CountFs, target), bounds).unwrap();
        let sv = |x: i32, y: i32| ScreenVertex::new(from_int(x), from_int(y));
        r.draw_triangle(&sv(-32, 80), &sv(80, -32), &sv(48, 128));
    }
    assert_eq!(via_pipeline, direct);
    assert!(direct.iter().any(|&n| n == 1));
    assert!(direct.iter().all(|&n| n <= 1));
}

#[test]
fn split_polygon_vertices_lie_on_the_guard_plane() {
    let verts = [
        Clip([0.0, 0.0, 0.0, 1.0]),
        Clip([9.0, 0.5, 0.0, 1.0]),
        Clip([0.0, 1.0, 0.0, 1.0]),
    ];
    let mut gp = GeometryProcessor::new(PassVs, Capture::default()).unwrap();
    gp.set_cull_mode(CullMode::None);
    let attribs = VertexAttribs::single(AttributeStream::from_slice(&verts));
    gp.draw_triangles(&attribs, &[0, 1, 2]).unwrap();
    let tris = gp.into_sink().triangles;
    // The x = 4w plane turns the triangle into a quad, drawn as a fan of two.
    assert_eq!(tris.len(), 2);
    // Screen x of the plane is 32 + 4 * 32.
    let plane_x = snap_subpixel(from_int(160));
    let on_plane = tris
        .iter()
        .flatten()
        .filter(|v| (snap_subpixel(v.x) - plane_x).abs() <= 1)
        .count();
    assert!(on_plane >= 2);
    assert!(tris.iter().flatten().all(|v| snap_subpixel(v.x) <= plane_x + 1));
}
