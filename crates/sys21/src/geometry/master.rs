//! Master geometry unit: walks the display list the hosts leave in shared
//! RAM and expands it into the transfer stream the slave consumes.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use tracing::{debug, trace};

use crate::{bits::Bits, fifo::Fifo};

use super::{
    fault::{Desync, FaultLog, FaultReason},
    point_ram::PointRam,
    point_rom::PointRom,
    shared_ram::{SharedRam, ADDRESS_MASK},
    slave::{dispatch_payload, ChainColor, DIRECT_DRAW_WORDS},
    transfer::TransferQueue,
    Rasterizer,
};

pub const DIRECT_DRAW_CAPACITY: usize = 256;
/// Display list codes one `run` may consume before giving up.
pub const WALK_LIMIT: usize = 0x10000;
pub const END_OF_LIST: u16 = 0xFFFF;
/// Copied through verbatim in indirect mode instead of naming an object.
pub const TAGGED_CODES: [u16; 2] = [0x18, 0x1A];

/// Start address as written to the transfer start port. Bit 15 selects
/// indirect mode; the rest is a shared RAM word address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferAddress(pub u16);

impl TransferAddress {
    pub const IDLE: TransferAddress = TransferAddress(0);

    pub fn indirect(self) -> bool {
        self.0.bit(15)
    }

    pub fn cursor(self) -> Cursor {
        Cursor(self.0 & ADDRESS_MASK)
    }

    pub fn is_idle(self) -> bool {
        self.0 == 0
    }
}

/// Read position in shared RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(u16);

impl Cursor {
    pub fn address(self) -> u16 {
        self.0
    }

    pub fn read(&mut self, ram: &SharedRam) -> u16 {
        let word = ram.read(self.0);
        self.advance(1);
        word
    }

    pub fn peek(self, ram: &SharedRam, offset: u16) -> u16 {
        ram.read(self.0.wrapping_add(offset))
    }

    pub fn advance(&mut self, words: u16) {
        self.0 = self.0.wrapping_add(words) & ADDRESS_MASK;
    }
}

/// How a `run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Hit the end of a direct-mode list; the unit is idle.
    Idle,
    /// An indirect sentinel pointed back at itself. The unit keeps its start
    /// address and waits for the producer.
    Parked(TransferAddress),
}

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum MasterPort {
    PointRomData = 0x0,
    PointRomHigh = 0x1,
    TransferStart = 0x2,
    PointRomIndex = 0x3,
    Status = 0x8,
    DirectDrawTrigger = 0xB,
    DirectDraw = 0xC,
}

#[derive(Debug)]
pub struct MasterGeometryUnit {
    source_address: TransferAddress,
    finished: bool,
    irq_enable: bool,
    point_rom_index: u32,
    point_rom_high: Option<u16>,
    direct_draw: Fifo<u16>,
}

impl MasterGeometryUnit {
    pub fn new() -> MasterGeometryUnit {
        MasterGeometryUnit {
            source_address: TransferAddress::IDLE,
            finished: false,
            irq_enable: false,
            point_rom_index: 0,
            point_rom_high: None,
            direct_draw: Fifo::with_capacity(DIRECT_DRAW_CAPACITY),
        }
    }

    pub fn source_address(&self) -> TransferAddress {
        self.source_address
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enable
    }

    pub fn direct_draw_len(&self) -> usize {
        self.direct_draw.len()
    }

    pub fn reset(&mut self) {
        self.source_address = TransferAddress::IDLE;
        self.finished = false;
        self.irq_enable = false;
        self.point_rom_index = 0;
        self.point_rom_high = None;
        self.direct_draw.clear();
    }

    /// Walks the display list from `start`, pushing blocks onto `queue`.
    /// Following a link moves the source address, so a parked transfer
    /// reports the sentinel it stopped at.
    ///
    /// Only an overflowing queue is an error; the walk stops where it was
    /// and the caller is expected to kickstart.
    pub fn run(
        &mut self,
        start: TransferAddress,
        ram: &SharedRam,
        rom: &PointRom,
        queue: &mut TransferQueue,
        faults: &mut FaultLog,
    ) -> Result<Transfer, FaultReason> {
        self.source_address = start;
        let mut address = start;
        let mut cursor = start.cursor();
        if cursor.address() == 0 {
            self.source_address = TransferAddress::IDLE;
            return Ok(Transfer::Idle);
        }

        for _ in 0..WALK_LIMIT {
            let at = cursor;
            let code = cursor.read(ram);
            if code == END_OF_LIST {
                if !address.indirect() {
                    trace!("display list ended at {:#06x}", at.address());
                    self.source_address = TransferAddress::IDLE;
                    return Ok(Transfer::Idle);
                }
                let next = TransferAddress(cursor.read(ram));
                self.source_address = next;
                if next.cursor() == at {
                    trace!("display list parked at {:#06x}", at.address());
                    return Ok(Transfer::Parked(self.source_address));
                }
                address = next;
                cursor = next.cursor();
            } else if !address.indirect() || TAGGED_CODES.contains(&code) {
                queue.push(code + 1)?;
                for _ in 0..code {
                    queue.push(cursor.read(ram))?;
                }
            } else {
                expand_object(code, &mut cursor, ram, rom, queue)?;
            }
        }

        faults.record(Desync::RunawayDisplayList { start: start.0 }.into());
        self.source_address = TransferAddress::IDLE;
        Ok(Transfer::Idle)
    }

    /// Port reads only touch the unit itself and point ROM.
    pub fn read_port(&mut self, port: u16, rom: &PointRom) -> u16 {
        match MasterPort::from_u16(port) {
            Some(MasterPort::PointRomData) => self.read_point_rom(rom),
            Some(MasterPort::PointRomHigh) => self.point_rom_high.take().unwrap_or(0x8000),
            Some(MasterPort::Status) => 1,
            _ => {
                trace!("master read from unmapped port {port:#x}");
                0
            }
        }
    }

    fn read_point_rom(&mut self, rom: &PointRom) -> u16 {
        let word = rom.read_word(self.point_rom_index as usize);
        self.point_rom_index = self.point_rom_index.wrapping_add(1);
        self.point_rom_high = Some(((word >> 16) & 0xFF) as u16);
        word as u16
    }
}

impl Default for MasterGeometryUnit {
    fn default() -> Self {
        MasterGeometryUnit::new()
    }
}

/// Emits a transform/primitive block pair for every usable polygon record of
/// `object`. The transform comes from the display list at `cursor`: a length
/// word followed by that many words, shared by all of the object's records.
fn expand_object(
    object: u16,
    cursor: &mut Cursor,
    ram: &SharedRam,
    rom: &PointRom,
    queue: &mut TransferQueue,
) -> Result<(), FaultReason> {
    let len = cursor.read(ram);
    let transform: Vec<u16> = (0..len).map(|i| cursor.peek(ram, i)).collect();
    for record in rom.mesh_list(rom.object_address(object)) {
        let primitive_words = rom.record_len(record);
        if primitive_words <= 2 {
            debug!("object {object:#x}: skipping {primitive_words}-word record at {record:#x}");
            continue;
        }
        queue.push(0)?;
        queue.push(len.wrapping_add(1))?;
        for &word in &transform {
            queue.push(word)?;
        }
        queue.push(0)?;
        queue.push(primitive_words.wrapping_add(1))?;
        for word in rom.record_words(record) {
            queue.push(word)?;
        }
    }
    cursor.advance(len);
    Ok(())
}

/// The host's view of the master unit's I/O ports.
pub struct MasterPorts<'a> {
    pub master: &'a mut MasterGeometryUnit,
    pub shared_ram: &'a SharedRam,
    pub point_rom: &'a PointRom,
    pub point_ram: &'a PointRam,
    pub queue: &'a mut TransferQueue,
    pub rasterizer: &'a mut dyn Rasterizer,
    pub faults: &'a mut FaultLog,
}

impl MasterPorts<'_> {
    pub fn read(&mut self, port: u16) -> u16 {
        self.master.read_port(port, self.point_rom)
    }

    pub fn write(&mut self, port: u16, data: u16) -> Result<(), FaultReason> {
        match MasterPort::from_u16(port) {
            Some(MasterPort::TransferStart) => {
                self.master.run(
                    TransferAddress(data),
                    self.shared_ram,
                    self.point_rom,
                    self.queue,
                    self.faults,
                )?;
            }
            Some(MasterPort::PointRomIndex) => {
                self.master.point_rom_index = self.master.point_rom_index << 16 | u32::from(data);
            }
            Some(MasterPort::Status) => {
                if data != 0 {
                    self.master.finished = true;
                }
                self.master.irq_enable = data != 0;
            }
            Some(MasterPort::DirectDrawTrigger) => match data {
                0 => self.master.direct_draw.clear(),
                1 => self.flush_direct_draw(),
                _ => trace!("direct-draw trigger {data:#06x} ignored"),
            },
            Some(MasterPort::DirectDraw) => {
                if self.master.direct_draw.push_back(data).is_err() {
                    self.faults
                        .record(Desync::DirectDrawBufferFull { word: data }.into());
                }
            }
            _ => trace!("master write {data:#06x} to port {port:#x} ignored"),
        }
        Ok(())
    }

    fn flush_direct_draw(&mut self) {
        let payload: Vec<u16> = self.master.direct_draw.iter().copied().collect();
        self.master.direct_draw.clear();
        match payload.first() {
            None => {}
            Some(&color) if payload.len() == DIRECT_DRAW_WORDS => {
                if color.bit(15) {
                    dispatch_payload(
                        &payload,
                        self.point_ram,
                        ChainColor::WithCode,
                        self.rasterizer,
                        self.faults,
                    );
                } else {
                    trace!("direct-draw color {color:#06x} without draw bit");
                }
            }
            Some(_) => self.faults.record(
                Desync::DirectDrawLength {
                    len: payload.len(),
                }
                .into(),
            ),
        }
    }
}
