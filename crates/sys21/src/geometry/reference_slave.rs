//! Stand-in for the slave unit's program, for boards whose meshes are
//! already in screen space.
//!
//! It decodes the transfer stream block by block. A block is a header word
//! (payload length + 1) followed by the payload; a zero word before a header
//! marks the block as part of an object (transform, then primitive). Blocks
//! without that marker are immediate data.

use tracing::trace;

use crate::bits::Bits;

use super::{
    fault::{Desync, FaultReason},
    mesh::PolygonRecord,
    point_ram::{QuadRecord, QUAD_RECORD_SIZE},
    slave::{SlavePorts, SlaveProgram, DIRECT_DRAW_WORDS},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Header,
    Payload { remaining: usize },
}

#[derive(Debug)]
pub struct ReferenceSlave {
    state: BlockState,
    padded: bool,
    block: Vec<u16>,
    transform: Option<Vec<u16>>,
    camera: Vec<u16>,
}

impl ReferenceSlave {
    pub fn new() -> ReferenceSlave {
        ReferenceSlave {
            state: BlockState::Header,
            padded: false,
            block: Vec::new(),
            transform: None,
            camera: Vec::new(),
        }
    }

    /// Most recent immediate block that was not a direct-draw quad.
    pub fn camera(&self) -> &[u16] {
        &self.camera
    }

    fn accept(&mut self, word: u16, ports: &mut SlavePorts<'_>) -> Result<(), FaultReason> {
        match self.state {
            BlockState::Header => {
                if word == 0 {
                    self.padded = true;
                    return Ok(());
                }
                self.block.clear();
                match word - 1 {
                    0 => self.finish_block(ports),
                    len => {
                        self.state = BlockState::Payload {
                            remaining: len as usize,
                        };
                        Ok(())
                    }
                }
            }
            BlockState::Payload { remaining } => {
                self.block.push(word);
                if remaining == 1 {
                    self.state = BlockState::Header;
                    self.finish_block(ports)
                } else {
                    self.state = BlockState::Payload {
                        remaining: remaining - 1,
                    };
                    Ok(())
                }
            }
        }
    }

    fn finish_block(&mut self, ports: &mut SlavePorts<'_>) -> Result<(), FaultReason> {
        let padded = std::mem::take(&mut self.padded);
        let block = std::mem::take(&mut self.block);
        if !padded {
            return self.immediate(block, ports);
        }
        match self.transform.take() {
            None => {
                self.transform = Some(block);
                Ok(())
            }
            Some(transform) => primitive(&transform, &block, ports),
        }
    }

    fn immediate(&mut self, block: Vec<u16>, ports: &mut SlavePorts<'_>) -> Result<(), FaultReason> {
        if block.len() == DIRECT_DRAW_WORDS && block[0].bit(15) {
            ports.emit(DIRECT_DRAW_WORDS as u16)?;
            for word in block {
                ports.emit(word)?;
            }
        } else {
            trace!("immediate block of {} words", block.len());
            self.camera = block;
        }
        Ok(())
    }
}

/// Uploads the record's quads as a point RAM chain and emits its vertices,
/// offset by the first three transform words.
fn primitive(
    transform: &[u16],
    block: &[u16],
    ports: &mut SlavePorts<'_>,
) -> Result<(), FaultReason> {
    let Some(record) = PolygonRecord::parse(block) else {
        ports.record_fault(Desync::MalformedPolygon { words: block.len() }.into());
        return Ok(());
    };
    if record.quads.is_empty() {
        trace!("polygon record {:#x} has no quads", record.quad_index);
        return Ok(());
    }

    let base = record.quad_index as usize * QUAD_RECORD_SIZE;
    let last = record.quads.len() - 1;
    for (k, quad) in record.quads.iter().enumerate() {
        let end = if k == last { 0x80 } else { 0 };
        ports.point_ram().store_quad_record(
            base + k * QUAD_RECORD_SIZE,
            QuadRecord {
                code: (quad.color >> 8) as u8 & 0x7F | end,
                color: quad.color as u8,
                vertices: quad.vertices,
            },
        );
    }

    let offset = |i: usize| transform.get(i).copied().unwrap_or(0);
    let (tx, ty, tz) = (offset(0), offset(1), offset(2));
    ports.emit(1 + 3 * record.vertices.len() as u16)?;
    ports.emit(record.quad_index & 0x7FFF)?;
    for vertex in &record.vertices {
        ports.emit((vertex.x as u16).wrapping_add(tx))?;
        ports.emit((vertex.y as u16).wrapping_add(ty))?;
        ports.emit(record.z_code(vertex).wrapping_add(tz))?;
    }
    Ok(())
}

impl Default for ReferenceSlave {
    fn default() -> Self {
        ReferenceSlave::new()
    }
}

impl SlaveProgram for ReferenceSlave {
    fn poll(&mut self, ports: &mut SlavePorts<'_>) -> Result<(), FaultReason> {
        for _ in 0..ports.credit() {
            let word = ports.dequeue();
            self.accept(word, ports)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        *self = ReferenceSlave::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{
        fault::FaultLog,
        mesh::{MeshQuad, MeshVertex},
        point_ram::PointRam,
        slave::SlaveRasterFeeder,
        transfer::TransferQueue,
        QuadLog, ScreenVertex,
    };

    struct Bench {
        queue: TransferQueue,
        feeder: SlaveRasterFeeder,
        point_ram: PointRam,
        log: QuadLog,
        faults: FaultLog,
        active: bool,
        slave: ReferenceSlave,
    }

    impl Bench {
        fn new() -> Bench {
            Bench {
                queue: TransferQueue::new(),
                feeder: SlaveRasterFeeder::new(),
                point_ram: PointRam::new(),
                log: QuadLog::default(),
                faults: FaultLog::default(),
                active: false,
                slave: ReferenceSlave::new(),
            }
        }

        fn run(&mut self, words: &[u16]) {
            for &word in words {
                self.queue.push(word).unwrap();
            }
            while self.queue.tick() {}
            let mut ports = SlavePorts::new(
                &mut self.queue,
                &mut self.feeder,
                &mut self.point_ram,
                &mut self.log,
                &mut self.faults,
                &mut self.active,
            );
            self.slave.poll(&mut ports).unwrap();
        }
    }

    fn record() -> PolygonRecord {
        PolygonRecord {
            quad_index: 3,
            bias: 1,
            vertices: vec![
                MeshVertex { x: 0, y: 0, z: 10 },
                MeshVertex { x: 8, y: 0, z: 10 },
                MeshVertex { x: 8, y: 8, z: 11 },
                MeshVertex { x: 0, y: 8, z: 11 },
            ],
            quads: vec![
                MeshQuad {
                    color: 0x0234,
                    vertices: [0, 1, 2, 3],
                },
                MeshQuad {
                    color: 0x0235,
                    vertices: [3, 2, 1, 0],
                },
            ],
        }
    }

    fn object_stream(transform: &[u16], record: &PolygonRecord) -> Vec<u16> {
        let body = record.to_words();
        let mut words = vec![0, transform.len() as u16 + 1];
        words.extend_from_slice(transform);
        words.extend([0, body.len() as u16 + 1]);
        words.extend(body);
        words
    }

    #[test]
    fn object_block_pair_uploads_and_draws() {
        let mut bench = Bench::new();
        bench.run(&object_stream(&[], &record()));

        assert!(bench.active);
        assert_eq!(bench.log.quads.len(), 2);
        assert_eq!(bench.log.quads[0].color, 0x0234);
        assert_eq!(bench.log.quads[1].color, 0x0235);
        assert_eq!(
            bench.log.quads[0].vertices[2],
            ScreenVertex {
                x: 256,
                y: 248,
                z: 12
            }
        );
        let first = bench.point_ram.quad_record(3 * QUAD_RECORD_SIZE);
        assert_eq!(first.code, 0x02);
        assert!(!first.is_last());
        assert!(bench.point_ram.quad_record(4 * QUAD_RECORD_SIZE).is_last());
        assert!(bench.faults.take().is_empty());
    }

    #[test]
    fn transform_offsets_vertices() {
        let mut bench = Bench::new();
        bench.run(&object_stream(&[4, 0xfffe, 100, 7], &record()));
        assert_eq!(
            bench.log.quads[0].vertices[0],
            ScreenVertex {
                x: 252,
                y: 238,
                z: 111
            }
        );
    }

    #[test]
    fn immediate_direct_draw_is_forwarded() {
        let mut bench = Bench::new();
        let mut words = vec![14, 0x8005];
        words.extend([1u16; 12]);
        bench.run(&words);
        assert_eq!(bench.log.quads.len(), 1);
        assert!(bench.log.quads[0].direct_draw);
        assert_eq!(bench.log.quads[0].color, 5);
    }

    #[test]
    fn other_immediate_blocks_are_kept_as_camera() {
        let mut bench = Bench::new();
        let mut words = vec![0x19];
        words.extend(0..0x18u16);
        bench.run(&words);
        assert!(bench.log.quads.is_empty());
        assert_eq!(bench.slave.camera().len(), 0x18);
    }

    #[test]
    fn blocks_may_span_polls() {
        let mut bench = Bench::new();
        let stream = object_stream(&[], &record());
        let (head, tail) = stream.split_at(9);
        bench.run(head);
        assert!(bench.log.quads.is_empty());
        bench.run(tail);
        assert_eq!(bench.log.quads.len(), 2);
    }

    #[test]
    fn malformed_primitive_is_skipped() {
        let mut bench = Bench::new();
        bench.run(&[0, 1, 0, 3, 1, 2]);
        assert!(bench.log.quads.is_empty());
        assert_eq!(
            bench.faults.take()[0].reason,
            FaultReason::Desync(Desync::MalformedPolygon { words: 2 })
        );
    }
}
