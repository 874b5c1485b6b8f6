//! Geometry coprocessor pipeline: the master unit expanding display lists,
//! the transfer queue, the slave feeding quads to the rasterizer, and the
//! single-stage variant used by the earlier board.

pub mod board;
pub mod fault;
pub mod flat;
pub mod kickstart;
pub mod master;
pub mod mesh;
pub mod pipeline;
pub mod point_ram;
pub mod point_rom;
pub mod reference_slave;
pub mod shared_ram;
pub mod slave;
pub mod transfer;

use fault::PipelineFault;

pub const FRAME_WIDTH: i32 = 496;
pub const FRAME_HEIGHT: i32 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenVertex {
    pub x: i32,
    pub y: i32,
    pub z: u16,
}

impl ScreenVertex {
    /// Coprocessor output is centred on the frame.
    pub fn from_offsets(dx: u16, dy: u16, z: u16) -> ScreenVertex {
        ScreenVertex {
            x: FRAME_WIDTH / 2 + i32::from(dx as i16),
            y: FRAME_HEIGHT / 2 + i32::from(dy as i16),
            z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quad {
    /// 15-bit palette index.
    pub color: u16,
    /// Drawn without depth cueing.
    pub direct_draw: bool,
    pub vertices: [ScreenVertex; 4],
}

/// Z-buffered frame buffer fill. Lives outside the pipeline.
pub trait Rasterizer {
    /// `depth_cue` is the point RAM depth-cue bank selected when the quad was
    /// dispatched.
    fn draw_quad(&mut self, quad: &Quad, depth_cue: &[u8]);
    fn clear(&mut self);
}

/// Rasterizer that only remembers what it was asked to draw.
#[derive(Debug, Default)]
pub struct QuadLog {
    pub quads: Vec<Quad>,
    pub clears: usize,
}

impl Rasterizer for QuadLog {
    fn draw_quad(&mut self, quad: &Quad, _depth_cue: &[u8]) {
        self.quads.push(*quad);
    }

    fn clear(&mut self) {
        self.clears += 1;
    }
}

/// What the machine needs from either board topology.
pub trait GeometryPipeline {
    /// One consumer poll.
    fn poll(&mut self, rasterizer: &mut dyn Rasterizer);
    fn vblank(&mut self, rasterizer: &mut dyn Rasterizer);
    fn kickstart(&mut self, rasterizer: &mut dyn Rasterizer);
    /// Set by an overflow until the next kickstart.
    fn is_halted(&self) -> bool;
    fn take_faults(&mut self) -> Vec<PipelineFault>;
}
