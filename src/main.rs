/// Headless demo and timing harness
/// Renders the seven-vertex colour wheel through every rasterization path
use bytemuck::{Pod, Zeroable};
use clap::{Parser, ValueEnum};
use glam::{Mat4, Vec4};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use subdiv_raster::perf::PerfStats;
use subdiv_raster::rendering::rgb_to_u32;
use subdiv_raster::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Standard,
    Supersampled,
    Multisample,
    Tiled,
    All,
}

#[derive(Parser, Debug)]
#[command(about = "Fixed-point software rasterizer demo")]
struct Args {
    /// Output width and height in pixels
    #[arg(long, default_value_t = 512)]
    size: i32,

    /// Frames rendered per mode
    #[arg(long, default_value_t = 100)]
    frames: u32,

    #[arg(long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Worker threads for the tiled path (0 = all cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Tile grid rows and columns for the tiled path
    #[arg(long, default_value_t = 4)]
    tiles: usize,

    /// Write the last frame of each mode as binary PPM into this directory
    #[arg(long)]
    output: Option<PathBuf>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Vertex {
    x: f32,
    y: f32,
    rgb: [i32; 3],
}

const fn vertex(x: f32, y: f32, r: i32, g: i32, b: i32) -> Vertex {
    Vertex { x, y, rgb: [r, g, b] }
}

const WHEEL_VERTICES: [Vertex; 7] = [
    vertex(0.00, 0.00, 255, 255, 255),
    vertex(0.50, 0.00, 255, 0, 0),
    vertex(0.25, 0.43, 255, 255, 0),
    vertex(-0.25, 0.43, 0, 255, 0),
    vertex(-0.50, 0.00, 0, 255, 255),
    vertex(-0.25, -0.43, 0, 0, 255),
    vertex(0.25, -0.43, 255, 0, 255),
];

const WHEEL_INDICES: [u32; 18] = [0, 1, 2, 0, 2, 3, 0, 3, 4, 0, 4, 5, 0, 5, 6, 0, 6, 1];

#[derive(Clone, Copy)]
struct WheelVs {
    transform: Mat4,
}

impl VertexShader for WheelVs {
    const ATTRIBUTE_COUNT: usize = 1;
    const VARYING_COUNT: usize = 3;

    fn shade(&self, input: &VertexInput<'_>, out: &mut VertexOutput) {
        let v: Vertex = input.read(0);
        out.set_position(self.transform * Vec4::new(v.x, v.y, 0.0, 1.0));
        for (varying, c) in out.varyings.iter_mut().zip(v.rgb) {
            *varying = c << 16;
        }
    }
}

#[inline]
fn channel(v: Fixed) -> u8 {
    (v >> 16).clamp(0, 255) as u8
}

#[inline]
fn fragment_color(fd: &FragmentData) -> u32 {
    rgb_to_u32(channel(fd.varyings[0]), channel(fd.varyings[1]), channel(fd.varyings[2]))
}

/// Writes the interpolated colour straight into any `u32` target.
struct WheelFs;

impl FragmentShader for WheelFs {
    const VARYING_COUNT: usize = 3;
    const INTERPOLATE_Z: bool = false;
}

impl<T: PixelTarget<Pixel = u32>> SingleSampleShader<T> for WheelFs {
    #[inline]
    fn single_fragment(&self, x: i32, y: i32, fd: &FragmentData, target: &mut T) {
        *target.pixel_mut(x as usize, y as usize) = fragment_color(fd);
    }
}

/// Adds the colour weighted by coverage; adjacent triangles sum to full weight.
struct WheelMsaaFs;

impl FragmentShader for WheelMsaaFs {
    const VARYING_COUNT: usize = 3;
    const INTERPOLATE_Z: bool = false;
}

impl<T: PixelTarget<Pixel = u32>> MultisampleShader<T> for WheelMsaaFs {
    fn multisample_fragment(&self, x: i32, y: i32, fd: &FragmentData, mask: u32, target: &mut T) {
        let weight = mask.count_ones();
        let src = fragment_color(fd);
        let dst = target.pixel_mut(x as usize, y as usize);
        let mut out = 0;
        for shift in [0, 8, 16] {
            let s = (src >> shift) & 0xFF;
            let d = (*dst >> shift) & 0xFF;
            out |= (d + s * weight / 4).min(255) << shift;
        }
        *dst = out;
    }
}

fn wheel_shader(frame: u32) -> WheelVs {
    WheelVs {
        transform: Mat4::from_rotation_z(frame as f32 * 0.01),
    }
}

/// Average `n × n` blocks of `src` into `dst`.
fn downsample(src: &[u32], dst: &mut [u32], width: usize, n: usize) {
    let src_width = width * n;
    for (i, out) in dst.iter_mut().enumerate() {
        let (ox, oy) = (i % width, i / width);
        let mut sum = [0u32; 3];
        for sy in oy * n..(oy + 1) * n {
            for &p in &src[sy * src_width + ox * n..sy * src_width + (ox + 1) * n] {
                sum[0] += (p >> 16) & 0xFF;
                sum[1] += (p >> 8) & 0xFF;
                sum[2] += p & 0xFF;
            }
        }
        let div = (n * n) as u32;
        *out = rgb_to_u32((sum[0] / div) as u8, (sum[1] / div) as u8, (sum[2] / div) as u8);
    }
}

fn write_ppm(path: &Path, pixels: &[u32], width: usize, height: usize) -> std::io::Result<()> {
    subdiv_raster::perf_scope!("write_ppm");
    let mut w = BufWriter::new(File::create(path)?);
    write!(w, "P6\n{} {}\n255\n", width, height)?;
    for &p in pixels {
        w.write_all(&[(p >> 16) as u8, (p >> 8) as u8, p as u8])?;
    }
    w.flush()
}

struct Demo {
    args: Args,
    attribs_data: [Vertex; 7],
}

impl Demo {
    fn save(&self, name: &str, pixels: &[u32]) -> Result<(), Box<dyn Error>> {
        if let Some(dir) = &self.args.output {
            let size = self.args.size as usize;
            let path = dir.join(format!("{name}.ppm"));
            write_ppm(&path, pixels, size, size)?;
            println!("  wrote {}", path.display());
        }
        Ok(())
    }

    fn standard(&self) -> Result<PerfStats, Box<dyn Error>> {
        let size = self.args.size as usize;
        let config = PipelineConfig::new(self.args.size, self.args.size);
        config.validate()?;
        let attribs = VertexAttribs::single(AttributeStream::from_slice(&self.attribs_data));
        let mut pixels = vec![0u32; size * size];
        let mut stats = PerfStats::new();

        for frame in 0..self.args.frames {
            pixels.fill(0);
            let start = Instant::now();
            let target = PixelBuffer::packed(&mut pixels[..], size, size)?;
            let raster = config.rasterizer(GenericSpanDrawer::new(WheelFs, target))?;
            let mut gp = GeometryProcessor::new(wheel_shader(frame), raster)?;
            config.apply(&mut gp)?;
            gp.draw_triangles(&attribs, &WHEEL_INDICES)?;
            stats.record(start.elapsed());
        }
        self.save("standard", &pixels)?;
        Ok(stats)
    }

    fn supersampled(&self) -> Result<PerfStats, Box<dyn Error>> {
        const SCALE: usize = 2;
        let size = self.args.size as usize;
        let config = PipelineConfig::new(self.args.size, self.args.size).scaled(SCALE as i32);
        config.validate()?;
        let attribs = VertexAttribs::single(AttributeStream::from_slice(&self.attribs_data));
        let big = size * SCALE;
        let mut samples = vec![0u32; big * big];
        let mut pixels = vec![0u32; size * size];
        let mut stats = PerfStats::new();

        for frame in 0..self.args.frames {
            samples.fill(0);
            let start = Instant::now();
            {
                let target = PixelBuffer::packed(&mut samples[..], big, big)?;
                let raster = config.rasterizer(GenericSpanDrawer::new(WheelFs, target))?;
                let mut gp = GeometryProcessor::new(wheel_shader(frame), raster)?;
                config.apply(&mut gp)?;
                gp.draw_triangles(&attribs, &WHEEL_INDICES)?;
            }
            downsample(&samples, &mut pixels, size, SCALE);
            stats.record(start.elapsed());
        }
        self.save("supersampled", &pixels)?;
        Ok(stats)
    }

    fn multisample(&self) -> Result<PerfStats, Box<dyn Error>> {
        let size = self.args.size as usize;
        let config = PipelineConfig::new(self.args.size, self.args.size).scaled(2);
        config.validate()?;
        let attribs = VertexAttribs::single(AttributeStream::from_slice(&self.attribs_data));
        let mut pixels = vec![0u32; size * size];
        let mut stats = PerfStats::new();

        for frame in 0..self.args.frames {
            pixels.fill(0);
            let start = Instant::now();
            let target = PixelBuffer::packed(&mut pixels[..], size, size)?;
            let drawer: MultisampleSpanDrawer<_, _, 2> =
                MultisampleSpanDrawer::new(WheelMsaaFs, target);
            let raster = config.rasterizer(drawer)?;
            let mut gp = GeometryProcessor::new(wheel_shader(frame), raster)?;
            config.apply(&mut gp)?;
            gp.draw_triangles(&attribs, &WHEEL_INDICES)?;
            stats.record(start.elapsed());
        }
        self.save("multisample", &pixels)?;
        Ok(stats)
    }

    fn tiled(&self) -> Result<PerfStats, Box<dyn Error>> {
        let size = self.args.size as usize;
        let config = PipelineConfig::new(self.args.size, self.args.size)
            .with_thread_count(self.args.threads)
            .with_tile_grid(self.args.tiles, self.args.tiles);
        config.validate()?;
        let grid = config.tile_grid()?;
        let attribs = VertexAttribs::single(AttributeStream::from_slice(&self.attribs_data));
        let mut pixels = vec![0u32; size * size];
        let mut stats = PerfStats::new();

        for frame in 0..self.args.frames {
            pixels.fill(0);
            let start = Instant::now();
            let mut target = PixelBuffer::packed(&mut pixels[..], size, size)?;
            let drawers = target
                .split_into_tiles(&grid)?
                .into_iter()
                .map(|tile| GenericSpanDrawer::new(WheelFs, tile))
                .collect();
            let raster = TiledRasterizer::from_drawers(grid.clone(), config.thread_count, drawers)?;
            let mut gp = GeometryProcessor::new(wheel_shader(frame), raster)?;
            config.apply_tiled(&mut gp)?;
            gp.draw_triangles(&attribs, &WHEEL_INDICES)?;
            stats.record(start.elapsed());
        }
        self.save("tiled", &pixels)?;
        Ok(stats)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    println!("=== Subdivided affine rasterizer ===");
    println!(
        "{}x{} colour wheel, {} frames per mode",
        args.size, args.size, args.frames
    );
    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)?;
    }

    let mode = args.mode;
    let demo = Demo {
        args,
        attribs_data: WHEEL_VERTICES,
    };
    let run = |m: Mode| mode == Mode::All || mode == m;

    FUNCTION_COUNTERS.reset();
    let mut results = Vec::new();
    if run(Mode::Standard) {
        results.push(("standard", demo.standard()?));
    }
    if run(Mode::Supersampled) {
        results.push(("supersampled 2x2", demo.supersampled()?));
    }
    if run(Mode::Multisample) {
        results.push(("multisample 2x2", demo.multisample()?));
    }
    if run(Mode::Tiled) {
        results.push(("tiled", demo.tiled()?));
    }

    for (name, stats) in &results {
        stats.log_summary(name);
        println!(
            "{:<18} mean {:>9.1}μs  min {:>9.1}μs  max {:>9.1}μs",
            name,
            stats.mean_us(),
            stats.min_us,
            stats.max_us
        );
    }
    FUNCTION_COUNTERS.snapshot().log_report();
    Ok(())
}
