use thiserror::Error;

/// Setup-time contract violations.
///
/// Degenerate geometry and buffer growth are never reported; they are normal
/// traffic. Only configuration that would otherwise corrupt output ends up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("shader uses {count} attribute streams, at most {max} are supported")]
    TooManyAttributes { count: usize, max: usize },
    #[error("shader uses {count} varyings, at most {max} are supported")]
    TooManyVaryings { count: usize, max: usize },
    #[error("vertex shader outputs {vertex} varyings but the fragment stage expects {fragment}")]
    VaryingCountMismatch { vertex: usize, fragment: usize },
    #[error("attribute stream index {index} out of range (max {max})")]
    AttributeIndexOutOfRange { index: usize, max: usize },
    #[error("vertex shader reads {count} attribute streams but slot {slot} is unbound")]
    UnboundAttribute { slot: usize, count: usize },
    #[error("viewport {width}x{height} at ({x}, {y}) is empty or negative")]
    InvalidViewport { x: i32, y: i32, width: i32, height: i32 },
    #[error("viewport extends to ({right}, {bottom}), limit is {limit}")]
    ViewportTooLarge { right: i32, bottom: i32, limit: i32 },
    #[error("clip rect {width}x{height} at ({x}, {y}) is invalid")]
    InvalidClipRect { x: i32, y: i32, width: i32, height: i32 },
    #[error("depth range [{near}, {far}] is outside [0, 1] in 16.16")]
    InvalidDepthRange { near: i32, far: i32 },
    #[error("buffer holds {actual} elements, {required} required")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("colour plane {color:?} and depth plane {depth:?} differ in size")]
    PlaneSizeMismatch { color: (usize, usize), depth: (usize, usize) },
    #[error("stride {stride} is smaller than the row width {width}")]
    InvalidStride { stride: usize, width: usize },
    #[error("tile grid {rows}x{cols} does not fit a {width}x{height} clip rect")]
    InvalidTileGrid { rows: usize, cols: usize, width: i32, height: i32 },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}
