// Tile-parallel and replica-parallel rendering must match the sequential
// pipeline pixel for pixel.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use subdiv_raster::fixed::{from_int, Fixed};
use subdiv_raster::*;

/// Writes varying 0 (an integer id in 16.16) into a `u32` target.
struct IdFs;

impl FragmentShader for IdFs {
    const VARYING_COUNT: usize = 1;
    const INTERPOLATE_Z: bool = false;
}

impl<T: PixelTarget<Pixel = u32>> SingleSampleShader<T> for IdFs {
    fn single_fragment(&self, x: i32, y: i32, fd: &FragmentData, target: &mut T) {
        *target.pixel_mut(x as usize, y as usize) = (fd.varyings[0] >> 16) as u32;
    }
}

/// Overlapping random triangles, each flat-shaded with its own id.
fn random_scene(seed: u64, count: usize, width: i32, height: i32) -> Vec<[ScreenVertex; 3]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let id = [from_int(i as i32 + 1)];
            let mut point = || {
                let x: Fixed = rng.gen_range(from_int(-10)..from_int(width + 10));
                let y: Fixed = rng.gen_range(from_int(-10)..from_int(height + 10));
                ScreenVertex::new(x, y).with_varyings(&id)
            };
            [point(), point(), point()]
        })
        .collect()
}

fn sequential(scene: &[[ScreenVertex; 3]], width: i32, height: i32) -> Vec<u32> {
    let mut pixels = vec![0u32; (width * height) as usize];
    {
        let target = PixelBuffer::packed(&mut pixels[..], width as usize, height as usize).unwrap();
        let bounds = Rect::new(0, 0, width, height);
        let mut r = Rasterizer::new(GenericSpanDrawer::new(IdFs, target), bounds).unwrap();
        for [a, b, c] in scene {
            r.draw_triangle(a, b, c);
        }
    }
    pixels
}

#[test]
fn tile_grid_partitions_the_bounds() {
    let bounds = Rect::new(3, 5, 101, 67);
    let grid = TileGrid::new(bounds, 4, 6).unwrap();
    assert_eq!(grid.len(), 24);

    let mut area = 0;
    for (i, a) in grid.tiles().iter().enumerate() {
        assert!(!a.is_empty());
        assert_eq!(a.intersect(&bounds), *a);
        area += a.area();
        for b in &grid.tiles()[i + 1..] {
            assert!(a.intersect(b).is_empty(), "{a:?} overlaps {b:?}");
        }
    }
    assert_eq!(area, bounds.area());

    // The last column and row take the remainder.
    let last = grid.tiles()[23];
    assert_eq!(last.right(), bounds.right());
    assert_eq!(last.bottom(), bounds.bottom());
    assert_eq!(last.width, 101 - 5 * 16);
    assert_eq!(last.height, 67 - 3 * 16);
}

#[test]
fn invalid_tile_grids_are_rejected() {
    let bounds = Rect::new(0, 0, 8, 4);
    assert!(TileGrid::new(bounds, 0, 1).is_err());
    assert!(TileGrid::new(bounds, 5, 1).is_err());
    assert!(TileGrid::new(bounds, 1, 9).is_err());
    assert!(TileGrid::new(Rect::new(0, 0, 0, 4), 1, 1).is_err());
    assert!(TileGrid::new(bounds, 4, 8).is_ok());
}

#[test]
fn tiled_rasterizer_matches_sequential() {
    let (w, h) = (97, 61);
    let scene = random_scene(11, 60, w, h);
    let expected = sequential(&scene, w, h);

    let mut pixels = vec![0u32; (w * h) as usize];
    {
        let mut target = PixelBuffer::packed(&mut pixels[..], w as usize, h as usize).unwrap();
        let grid = TileGrid::new(target.bounds(), 3, 5).unwrap();
        let drawers = target
            .split_into_tiles(&grid)
            .unwrap()
            .into_iter()
            .map(|tile| GenericSpanDrawer::new(IdFs, tile))
            .collect();
        let mut tiled = TiledRasterizer::from_drawers(grid, 4, drawers).unwrap();
        for [a, b, c] in &scene {
            tiled.draw_triangle(a, b, c);
        }
        assert_eq!(tiled.pending(), scene.len());
        tiled.flush();
        assert_eq!(tiled.pending(), 0);
    }
    assert_eq!(pixels, expected);
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    pos: [f32; 2],
    id: i32,
}

struct IdVs;

impl VertexShader for IdVs {
    const ATTRIBUTE_COUNT: usize = 1;
    const VARYING_COUNT: usize = 1;

    fn shade(&self, input: &VertexInput<'_>, out: &mut VertexOutput) {
        let v: Vertex = input.read(0);
        out.set_position(glam::Vec4::new(v.pos[0], v.pos[1], 0.0, 1.0));
        out.varyings[0] = v.id << 16;
    }
}

/// Flat triangles in NDC; every vertex is unique so ids stay constant per triangle.
fn ndc_scene(seed: u64, count: usize) -> (Vec<Vertex>, Vec<u32>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let vertices: Vec<Vertex> = (0..count * 3)
        .map(|i| Vertex {
            pos: [rng.gen_range(-1.3..1.3), rng.gen_range(-1.3..1.3)],
            id: (i / 3) as i32 + 1,
        })
        .collect();
    let indices = (0..vertices.len() as u32).collect();
    (vertices, indices)
}

fn render_sequential(vertices: &[Vertex], indices: &[u32], size: usize) -> Vec<u32> {
    let mut pixels = vec![0u32; size * size];
    {
        let target = PixelBuffer::packed(&mut pixels[..], size, size).unwrap();
        let config = PipelineConfig::new(size as i32, size as i32).with_cull_mode(CullMode::None);
        let r = config.rasterizer(GenericSpanDrawer::new(IdFs, target)).unwrap();
        let mut gp = GeometryProcessor::new(IdVs, r).unwrap();
        config.apply(&mut gp).unwrap();
        let attribs = VertexAttribs::single(AttributeStream::from_slice(vertices));
        gp.draw_triangles(&attribs, indices).unwrap();
    }
    pixels
}

#[test]
fn tiled_pipeline_flushes_at_the_end_of_each_draw() {
    let size = 80;
    let (vertices, indices) = ndc_scene(3, 40);
    let expected = render_sequential(&vertices, &indices, size);

    let mut pixels = vec![0u32; size * size];
    {
        let mut target = PixelBuffer::packed(&mut pixels[..], size, size).unwrap();
        let config = PipelineConfig::new(size as i32, size as i32)
            .with_cull_mode(CullMode::None)
            .with_tile_grid(4, 4)
            .with_thread_count(3);
        let grid = config.tile_grid().unwrap();
        let drawers = target
            .split_into_tiles(&grid)
            .unwrap()
            .into_iter()
            .map(|tile| GenericSpanDrawer::new(IdFs, tile))
            .collect();
        let tiled = TiledRasterizer::from_drawers(grid, config.thread_count, drawers).unwrap();
        let mut gp = GeometryProcessor::new(IdVs, tiled).unwrap();
        config.apply_tiled(&mut gp).unwrap();
        let attribs = VertexAttribs::single(AttributeStream::from_slice(&vertices));
        gp.draw_triangles(&attribs, &indices).unwrap();
        assert_eq!(gp.sink().pending(), 0);
    }
    assert_eq!(pixels, expected);
}

/// Records covered pixels and checks they stay inside the tile it was built for.
struct RecordFs;

impl FragmentShader for RecordFs {
    const VARYING_COUNT: usize = 0;
    const INTERPOLATE_Z: bool = false;
}

impl SingleSampleShader<(Rect, Vec<(i32, i32)>)> for RecordFs {
    fn single_fragment(
        &self,
        x: i32,
        y: i32,
        _: &FragmentData,
        target: &mut (Rect, Vec<(i32, i32)>),
    ) {
        assert!(target.0.contains(x, y), "({x}, {y}) outside {:?}", target.0);
        target.1.push((x, y));
    }
}

#[test]
fn tiled_rasterizer_from_closure_tracks_tile_rects() {
    let bounds = Rect::new(0, 0, 40, 30);
    let grid = TileGrid::new(bounds, 2, 3).unwrap();
    let mut tiled = TiledRasterizer::new(grid.clone(), 2, |_, rect| {
        GenericSpanDrawer::new(RecordFs, (rect, Vec::<(i32, i32)>::new()))
    })
    .unwrap();
    assert_eq!(tiled.tiles().len(), 6);
    for (tile, rect) in tiled.tiles().iter().zip(grid.tiles()) {
        assert_eq!(tile.clip_rect(), *rect);
    }

    let sv = |x, y| ScreenVertex::new(from_int(x), from_int(y));
    let (a, b, c) = (sv(0, 0), sv(40, 0), sv(0, 30));
    tiled.draw_triangle(&a, &b, &c);
    tiled.flush();
    let mut covered: Vec<(i32, i32)> = tiled
        .into_drawers()
        .into_iter()
        .flat_map(|d| d.into_target().1)
        .collect();
    covered.sort_by_key(|&(x, y)| (y, x));

    let recorder = GenericSpanDrawer::new(RecordFs, (bounds, Vec::<(i32, i32)>::new()));
    let mut whole = Rasterizer::new(recorder, bounds).unwrap();
    whole.draw_triangle(&a, &b, &c);
    let expected = whole.into_drawer().into_target().1;
    assert!(expected.len() > 500);
    assert_eq!(covered, expected);
}

#[test]
fn replicas_each_render_the_full_scene() {
    let size = 48;
    let (vertices, indices) = ndc_scene(9, 25);
    let expected = render_sequential(&vertices, &indices, size);

    let mut buffers = vec![vec![0u32; size * size]; 3];
    {
        let mut replicas = ReplicaPipelines::new(3).unwrap();
        for buf in buffers.iter_mut() {
            let target = PixelBuffer::packed(&mut buf[..], size, size).unwrap();
            let bounds = Rect::new(0, 0, size as i32, size as i32);
            let r = Rasterizer::new(GenericSpanDrawer::new(IdFs, target), bounds).unwrap();
            replicas.add(GeometryProcessor::new(IdVs, r).unwrap());
        }
        assert_eq!(replicas.len(), 3);
        replicas.set_cull_mode(CullMode::None);
        let attribs = VertexAttribs::single(AttributeStream::from_slice(&vertices));
        replicas.draw_triangles(&attribs, &indices).unwrap();
    }
    for buf in &buffers {
        assert_eq!(buf, &expected);
    }
}

#[test]
fn replicas_can_split_the_screen_by_viewport() {
    let size = 32;
    let (vertices, indices) = ndc_scene(5, 10);
    let attribs = VertexAttribs::single(AttributeStream::from_slice(&vertices));

    let mut buffers = vec![vec![0u32; size * size]; 2];
    {
        let mut replicas = ReplicaPipelines::new(2).unwrap();
        for (i, buf) in buffers.iter_mut().enumerate() {
            let target = PixelBuffer::packed(&mut buf[..], size, size).unwrap();
            // Each replica clips to its own half of the target.
            let half = Rect::new(0, i as i32 * 16, size as i32, 16);
            let r = Rasterizer::new(GenericSpanDrawer::new(IdFs, target), half).unwrap();
            let mut gp = GeometryProcessor::new(IdVs, r).unwrap();
            gp.set_viewport(0, 0, size as i32, size as i32).unwrap();
            replicas.add(gp);
        }
        replicas.for_each(|_, gp| gp.set_cull_mode(CullMode::None));
        assert!(replicas.replicas().iter().all(|gp| gp.cull_mode() == CullMode::None));
        replicas
            .try_for_each(|_, gp| gp.draw_triangles(&attribs, &indices))
            .unwrap();
    }
    let expected = render_sequential(&vertices, &indices, size);
    for (i, buf) in buffers.iter().enumerate() {
        for y in 0..size {
            let row = &buf[y * size..(y + 1) * size];
            if y / 16 == i {
                assert_eq!(row, &expected[y * size..(y + 1) * size]);
            } else {
                assert!(row.iter().all(|&p| p == 0));
            }
        }
    }
}

/// Folds every emission into the pixel so a second emission, a different
/// mask or a different triangle order all change the result.
struct MaskHashFs;

impl FragmentShader for MaskHashFs {
    const VARYING_COUNT: usize = 1;
    const INTERPOLATE_Z: bool = false;
}

impl<T: PixelTarget<Pixel = u32>> MultisampleShader<T> for MaskHashFs {
    fn multisample_fragment(&self, x: i32, y: i32, fd: &FragmentData, mask: u32, target: &mut T) {
        let id = (fd.varyings[0] >> 16) as u32;
        let pixel = target.pixel_mut(x as usize, y as usize);
        *pixel = pixel.wrapping_mul(31).wrapping_add((id << 4) | mask);
    }
}

/// Multisampled render of a sample-space scene into `width × height` pixels.
fn multisample_sequential(scene: &[[ScreenVertex; 3]], width: usize, height: usize) -> Vec<u32> {
    let mut pixels = vec![0u32; width * height];
    {
        let target = PixelBuffer::packed(&mut pixels[..], width, height).unwrap();
        let config = PipelineConfig::new(width as i32, height as i32).scaled(2);
        let drawer = MultisampleSpanDrawer::<_, _, 2>::new(MaskHashFs, target);
        let mut r = config.rasterizer(drawer).unwrap();
        for [a, b, c] in scene {
            r.draw_triangle(a, b, c);
        }
    }
    pixels
}

fn multisample_tiled(
    scene: &[[ScreenVertex; 3]],
    config: &PipelineConfig,
    width: usize,
    height: usize,
) -> Vec<u32> {
    let mut pixels = vec![0u32; width * height];
    {
        let mut target = PixelBuffer::packed(&mut pixels[..], width, height).unwrap();
        let grid = config.tile_grid().unwrap();
        let drawers = target
            .split_into_tiles(&grid.downscaled())
            .unwrap()
            .into_iter()
            .map(|tile| MultisampleSpanDrawer::<_, _, 2>::new(MaskHashFs, tile))
            .collect();
        let mut tiled = TiledRasterizer::from_drawers(grid, config.thread_count, drawers).unwrap();
        for [a, b, c] in scene {
            tiled.draw_triangle(a, b, c);
        }
        tiled.flush();
    }
    pixels
}

#[test]
fn tiled_multisampling_matches_sequential() {
    let (w, h) = (37, 23);
    let scene = random_scene(17, 50, 2 * w as i32, 2 * h as i32);
    let expected = multisample_sequential(&scene, w, h);
    assert!(expected.iter().filter(|&&p| p != 0).count() > 300);

    let config = PipelineConfig::new(w as i32, h as i32)
        .scaled(2)
        .with_tile_grid(3, 4)
        .with_thread_count(4);
    config.validate().unwrap();
    assert_eq!(multisample_tiled(&scene, &config, w, h), expected);
}

#[test]
fn tile_edges_never_cut_through_an_output_pixel() {
    // Three output pixels over two tile columns: the seam has to fall between
    // pixels, never through the middle one.
    let sv = |x, y| ScreenVertex::new(from_int(x), from_int(y)).with_varyings(&[from_int(1)]);
    let (a, b, c, d) = (sv(0, 0), sv(6, 0), sv(6, 2), sv(0, 2));
    let scene = [[a, b, c], [a, c, d]];
    let expected = multisample_sequential(&scene, 3, 1);

    let config = PipelineConfig::new(3, 1).scaled(2).with_tile_grid(1, 2);
    let grid = config.tile_grid().unwrap();
    assert!(grid.tiles().iter().all(|t| t.x % 2 == 0 && t.width % 2 == 0));
    assert_eq!(multisample_tiled(&scene, &config, 3, 1), expected);
}

/// Depth-tested colour writes; colour is varying 0 in 16.16.
struct DepthFs;

impl FragmentShader for DepthFs {
    const VARYING_COUNT: usize = 1;
    const INTERPOLATE_Z: bool = true;
}

impl ColorDepthShader for DepthFs {
    type Color = u32;
    type Depth = i32;

    fn color_depth_fragment(&self, fd: &FragmentData, color: &mut u32, depth: &mut i32) {
        if fd.z < *depth {
            *depth = fd.z;
            *color = (fd.varyings[0] >> 16) as u32;
        }
    }
}

/// Overlapping triangles, each at its own constant depth.
fn depth_scene(seed: u64, count: usize, width: i32, height: i32) -> Vec<[ScreenVertex; 3]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    random_scene(seed, count, width, height)
        .into_iter()
        .map(|tri| {
            let z = rng.gen_range(1..FIX_ONE);
            tri.map(|v| v.with_depth(z))
        })
        .collect()
}

#[test]
fn tiled_color_depth_matches_sequential() {
    let (w, h) = (71, 45);
    let scene = depth_scene(23, 80, w as i32, h as i32);

    let mut expected = rendering::Framebuffer::new(w, h);
    {
        let target = expected.color_depth_view();
        let drawer = ColorDepthSpanDrawer::new(DepthFs, target);
        let mut r = Rasterizer::new(drawer, Rect::new(0, 0, w as i32, h as i32)).unwrap();
        for [a, b, c] in &scene {
            r.draw_triangle(a, b, c);
        }
    }
    assert!(expected.depth_buffer.iter().filter(|&&z| z != i32::MAX).count() > 1000);

    let mut tiled_fb = rendering::Framebuffer::new(w, h);
    {
        let config = PipelineConfig::new(w as i32, h as i32).with_tile_grid(4, 3);
        let grid = config.tile_grid().unwrap();
        let mut target = tiled_fb.color_depth_view();
        let drawers = target
            .split_into_tiles(&grid)
            .unwrap()
            .into_iter()
            .map(|tile| ColorDepthSpanDrawer::new(DepthFs, tile))
            .collect();
        let mut tiled = TiledRasterizer::from_drawers(grid, 3, drawers).unwrap();
        for [a, b, c] in &scene {
            tiled.draw_triangle(a, b, c);
        }
        tiled.flush();
    }
    assert_eq!(tiled_fb.color_buffer, expected.color_buffer);
    assert_eq!(tiled_fb.depth_buffer, expected.depth_buffer);
}
