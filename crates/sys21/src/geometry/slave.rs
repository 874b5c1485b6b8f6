use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use tracing::trace;

use crate::bits::Bits;

use super::{
    fault::{Buffer, Desync, FaultLog, FaultReason},
    point_ram::{PointRam, POINT_RAM_SIZE, QUAD_RECORD_SIZE},
    transfer::TransferQueue,
    Quad, Rasterizer, ScreenVertex,
};

pub const SLAVE_OUTPUT_MAX: usize = 4096;
/// Color word plus four `(dx, dy, z)` triples.
pub const DIRECT_DRAW_WORDS: usize = 13;

/// How a quad chain record's bytes form the quad color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainColor {
    /// `code` supplies bits 8..14.
    WithCode,
    /// Only the record's color byte.
    ColorByte,
}

/// Draws a completed payload. `payload[0]` is either a direct-draw color
/// (bit 15 set) or a quad chain index into point RAM; the remaining words
/// are `(dx, dy, z)` vertex triples. Returns the number of quads drawn.
pub fn dispatch_payload(
    payload: &[u16],
    point_ram: &PointRam,
    chain_color: ChainColor,
    rasterizer: &mut dyn Rasterizer,
    faults: &mut FaultLog,
) -> usize {
    let Some((&head, vertex_words)) = payload.split_first() else {
        return 0;
    };
    if head.bit(15) {
        if payload.len() != DIRECT_DRAW_WORDS {
            faults.record(Desync::DirectDrawLength { len: payload.len() }.into());
            return 0;
        }
        let vertex = |j: usize| {
            ScreenVertex::from_offsets(
                vertex_words[3 * j],
                vertex_words[3 * j + 1],
                vertex_words[3 * j + 2],
            )
        };
        let quad = Quad {
            color: head & 0x7FFF,
            direct_draw: true,
            vertices: [vertex(0), vertex(1), vertex(2), vertex(3)],
        };
        rasterizer.draw_quad(&quad, point_ram.depth_cue());
        return 1;
    }

    let vertex = |index: u8| {
        let base = index as usize * 3;
        match vertex_words.get(base..base + 3) {
            Some(&[dx, dy, z]) => ScreenVertex::from_offsets(dx, dy, z),
            _ => {
                trace!("quad references vertex {index} beyond the payload");
                ScreenVertex::from_offsets(0, 0, 0)
            }
        }
    };
    let index = head as usize * QUAD_RECORD_SIZE;
    let (start, wrapped) = PointRam::wrap(index);
    if wrapped {
        faults.record(FaultReason::IndexWrap { index });
    }
    let mut offset = start;
    for drawn in 1..=POINT_RAM_SIZE / QUAD_RECORD_SIZE {
        let record = point_ram.quad_record(offset);
        let color = match chain_color {
            ChainColor::WithCode => (u16::from(record.code) << 8 | u16::from(record.color)) & 0x7FFF,
            ChainColor::ColorByte => u16::from(record.color),
        };
        let quad = Quad {
            color,
            direct_draw: false,
            vertices: record.vertices.map(&vertex),
        };
        rasterizer.draw_quad(&quad, point_ram.depth_cue());
        if record.is_last() {
            return drawn;
        }
        offset = (offset + QUAD_RECORD_SIZE) & (POINT_RAM_SIZE - 1);
    }
    faults.record(Desync::UnterminatedQuadChain { offset: start }.into());
    POINT_RAM_SIZE / QUAD_RECORD_SIZE
}

/// Collects the words the slave writes to its output port and hands each
/// completed payload to the rasterizer.
///
/// The first word of a payload is its length, excluding itself.
#[derive(Debug, Default)]
pub struct SlaveRasterFeeder {
    accumulator: Vec<u16>,
}

impl SlaveRasterFeeder {
    pub fn new() -> SlaveRasterFeeder {
        SlaveRasterFeeder {
            accumulator: Vec::with_capacity(SLAVE_OUTPUT_MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.accumulator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulator.is_empty()
    }

    pub fn on_word(
        &mut self,
        word: u16,
        point_ram: &PointRam,
        rasterizer: &mut dyn Rasterizer,
        faults: &mut FaultLog,
    ) -> Result<usize, FaultReason> {
        if self.accumulator.len() >= SLAVE_OUTPUT_MAX {
            self.accumulator.clear();
            return Err(FaultReason::Overflow(Buffer::SlaveAccumulator));
        }
        self.accumulator.push(word);

        let declared = self.accumulator[0] as usize;
        if declared == 0 {
            faults.record(Desync::ZeroDeclaredCount.into());
            self.accumulator.clear();
            return Ok(0);
        }
        if self.accumulator.len() <= declared {
            return Ok(0);
        }
        let drawn = dispatch_payload(
            &self.accumulator[1..],
            point_ram,
            ChainColor::WithCode,
            rasterizer,
            faults,
        );
        self.accumulator.clear();
        Ok(drawn)
    }

    /// Pulsed reset line.
    pub fn reset(&mut self) {
        self.accumulator.clear();
    }
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum SlavePort {
    Data = 0x0,
    Credit = 0x2,
    Ready = 0x3,
}

/// The slave's view of the pipeline, lent to a [`SlaveProgram`] for one
/// poll.
pub struct SlavePorts<'a> {
    queue: &'a mut TransferQueue,
    feeder: &'a mut SlaveRasterFeeder,
    point_ram: &'a mut PointRam,
    rasterizer: &'a mut dyn Rasterizer,
    faults: &'a mut FaultLog,
    active: &'a mut bool,
}

impl<'a> SlavePorts<'a> {
    pub fn new(
        queue: &'a mut TransferQueue,
        feeder: &'a mut SlaveRasterFeeder,
        point_ram: &'a mut PointRam,
        rasterizer: &'a mut dyn Rasterizer,
        faults: &'a mut FaultLog,
        active: &'a mut bool,
    ) -> SlavePorts<'a> {
        SlavePorts {
            queue,
            feeder,
            point_ram,
            rasterizer,
            faults,
            active,
        }
    }

    pub fn read(&mut self, port: u16) -> u16 {
        match SlavePort::from_u16(port) {
            Some(SlavePort::Data) => self.dequeue(),
            Some(SlavePort::Credit) => self.credit().min(u16::MAX as usize) as u16,
            Some(SlavePort::Ready) => 1,
            None => {
                trace!("slave read from unmapped port {port:#x}");
                0
            }
        }
    }

    pub fn write(&mut self, port: u16, data: u16) -> Result<(), FaultReason> {
        match SlavePort::from_u16(port) {
            Some(SlavePort::Data) => self.emit(data).map(|_| ()),
            Some(SlavePort::Ready) => Ok(()),
            _ => {
                trace!("slave write {data:#06x} to unmapped port {port:#x}");
                Ok(())
            }
        }
    }

    /// Words the slave may read this poll.
    pub fn credit(&self) -> usize {
        self.queue.credit()
    }

    /// Next queued word, or 0 when the queue is empty.
    pub fn dequeue(&mut self) -> u16 {
        match self.queue.pop() {
            Some(word) => {
                *self.active = true;
                word
            }
            None => 0,
        }
    }

    pub fn emit(&mut self, word: u16) -> Result<usize, FaultReason> {
        self.feeder
            .on_word(word, self.point_ram, self.rasterizer, self.faults)
    }

    pub fn point_ram(&mut self) -> &mut PointRam {
        self.point_ram
    }

    pub fn record_fault(&mut self, reason: FaultReason) {
        self.faults.record(reason);
    }
}

/// The program running on the slave unit.
pub trait SlaveProgram {
    fn poll(&mut self, ports: &mut SlavePorts<'_>) -> Result<(), FaultReason>;
    fn reset(&mut self);
}
