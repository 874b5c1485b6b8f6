//! Single-DSP board revision. The host fills a polygon parameter buffer
//! through a port and tells the DSP when to draw it; there is no transfer
//! queue and no slave.

use bitvec::prelude::*;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use tracing::{info, trace};

use super::{
    board::{Board, BoardProfile, ConfigError, Topology},
    fault::{Buffer, FaultLog, FaultReason, PipelineFault},
    point_ram::PointRam,
    point_rom::PointRom,
    slave::{dispatch_payload, ChainColor},
    GeometryPipeline, Rasterizer,
};

/// Color word plus 256 vertex triples.
pub const MAX_POLY_PARAM: usize = 1 + 256 * 3;
pub const DSP_CODE_WORDS: usize = 0x1000;
pub const COMRAM_BANK_WORDS: usize = 0x1000;
pub const COMRAM_CONTROL_WORDS: usize = 8;
/// Control word whose bit 0 picks the bank the host is not using.
const COMRAM_BANK_SELECT: usize = 2;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum FlatPort {
    PointRomAddressLow = 0x8,
    PointRomAddressHigh = 0x9,
    PointRomData = 0xA,
    Render = 0xB,
    RenderComplete = 0xC,
}

/// Double-banked mailbox between the host and the DSP.
#[derive(Debug)]
pub struct ComRam {
    words: Box<[u16]>,
    control: [u16; COMRAM_CONTROL_WORDS],
}

impl ComRam {
    pub fn new() -> ComRam {
        ComRam {
            words: vec![0; 2 * COMRAM_BANK_WORDS].into_boxed_slice(),
            control: [0; COMRAM_CONTROL_WORDS],
        }
    }

    /// The host sees both banks back to back.
    pub fn host_read(&self, offset: usize) -> u16 {
        self.words[offset % self.words.len()]
    }

    pub fn host_write(&mut self, offset: usize, value: u16) {
        let len = self.words.len();
        self.words[offset % len] = value;
    }

    fn dsp_bank(&self) -> usize {
        1 - usize::from(self.control[COMRAM_BANK_SELECT] & 1)
    }

    pub fn dsp_read(&self, offset: usize) -> u16 {
        self.words[self.dsp_bank() * COMRAM_BANK_WORDS + offset % COMRAM_BANK_WORDS]
    }

    pub fn dsp_write(&mut self, offset: usize, value: u16) {
        let index = self.dsp_bank() * COMRAM_BANK_WORDS + offset % COMRAM_BANK_WORDS;
        self.words[index] = value;
    }

    pub fn control_read(&self, offset: usize) -> u16 {
        self.control[offset % COMRAM_CONTROL_WORDS]
    }

    pub fn control_write(&mut self, offset: usize, value: u16) {
        self.control[offset % COMRAM_CONTROL_WORDS] = value;
    }
}

impl Default for ComRam {
    fn default() -> Self {
        ComRam::new()
    }
}

/// Host-written DSP program. The instruction store only changes once every
/// staging word has been written since the previous upload.
#[derive(Debug)]
pub struct DspCodeUpload {
    staging: Box<[u16]>,
    written: BitVec,
    instructions: Box<[u16]>,
    live: bool,
}

impl DspCodeUpload {
    pub fn new() -> DspCodeUpload {
        DspCodeUpload {
            staging: vec![0; DSP_CODE_WORDS].into_boxed_slice(),
            written: bitvec![0; DSP_CODE_WORDS],
            instructions: vec![0; DSP_CODE_WORDS].into_boxed_slice(),
            live: false,
        }
    }

    /// Returns true when this write completed an upload.
    pub fn write(&mut self, offset: usize, word: u16) -> bool {
        let offset = offset % DSP_CODE_WORDS;
        self.staging[offset] = word;
        self.written.set(offset, true);
        if !self.written.all() {
            return false;
        }
        self.instructions.copy_from_slice(&self.staging);
        self.written.fill(false);
        self.live = true;
        info!("DSP program uploaded");
        true
    }

    pub fn instructions(&self) -> &[u16] {
        &self.instructions
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn pending_words(&self) -> usize {
        self.written.count_zeros()
    }
}

impl Default for DspCodeUpload {
    fn default() -> Self {
        DspCodeUpload::new()
    }
}

pub struct FlatPipeline {
    profile: BoardProfile,
    point_rom: PointRom,
    point_rom_address: u32,
    point_ram: PointRam,
    poly: Vec<u16>,
    code: DspCodeUpload,
    comram: ComRam,
    faults: FaultLog,
    halted: bool,
    dsp_resets: u64,
}

impl FlatPipeline {
    pub fn new(board: Board, point_rom: PointRom) -> Result<FlatPipeline, ConfigError> {
        let profile = board.profile();
        if profile.topology != Topology::Flat {
            return Err(ConfigError::WrongTopology {
                board,
                expected: Topology::Flat,
            });
        }
        info!("{board}: {} point ROM words", point_rom.len());
        Ok(FlatPipeline {
            profile,
            point_rom,
            point_rom_address: 0,
            point_ram: PointRam::new(),
            poly: Vec::with_capacity(MAX_POLY_PARAM),
            code: DspCodeUpload::new(),
            comram: ComRam::new(),
            faults: FaultLog::default(),
            halted: false,
            dsp_resets: 0,
        })
    }

    pub fn profile(&self) -> &BoardProfile {
        &self.profile
    }

    pub fn point_ram(&self) -> &PointRam {
        &self.point_ram
    }

    pub fn comram(&self) -> &ComRam {
        &self.comram
    }

    pub fn comram_mut(&mut self) -> &mut ComRam {
        &mut self.comram
    }

    pub fn code(&self) -> &DspCodeUpload {
        &self.code
    }

    pub fn poly_len(&self) -> usize {
        self.poly.len()
    }

    pub fn dsp_resets(&self) -> u64 {
        self.dsp_resets
    }

    pub fn dsp_code_write(&mut self, offset: usize, word: u16) {
        self.code.write(offset, word);
    }

    pub fn render_write(&mut self, word: u16) {
        if self.poly.len() >= MAX_POLY_PARAM {
            self.faults.record(FaultReason::Overflow(Buffer::PolygonParameters));
            self.halted = true;
            return;
        }
        self.poly.push(word);
    }

    /// Nonzero draws the buffered polygon and restarts the DSP.
    pub fn render_complete(&mut self, data: u16, rasterizer: &mut dyn Rasterizer) {
        if data == 0 {
            return;
        }
        self.flush(rasterizer);
        self.dsp_resets += 1;
        rasterizer.clear();
    }

    /// Reading the poly reset register draws what is buffered.
    pub fn poly_reset_read(&mut self, rasterizer: &mut dyn Rasterizer) -> u16 {
        self.flush(rasterizer);
        0
    }

    fn flush(&mut self, rasterizer: &mut dyn Rasterizer) {
        if !self.halted && !self.poly.is_empty() {
            dispatch_payload(
                &self.poly,
                &self.point_ram,
                ChainColor::ColorByte,
                rasterizer,
                &mut self.faults,
            );
        }
        self.poly.clear();
    }

    pub fn dsp_port_read(&mut self, port: u16) -> u16 {
        match FlatPort::from_u16(port) {
            Some(FlatPort::PointRomData) => {
                let word = self.point_rom.read_word(self.point_rom_address as usize);
                self.point_rom_address = self.point_rom_address.wrapping_add(1);
                word as u16
            }
            _ => {
                trace!("DSP read from unmapped port {port:#x}");
                0
            }
        }
    }

    pub fn dsp_port_write(&mut self, port: u16, data: u16, rasterizer: &mut dyn Rasterizer) {
        match FlatPort::from_u16(port) {
            Some(FlatPort::PointRomAddressLow) => {
                self.point_rom_address = self.point_rom_address & 0xFFFF_0000 | u32::from(data);
            }
            Some(FlatPort::PointRomAddressHigh) => {
                self.point_rom_address = self.point_rom_address & 0xFFFF | u32::from(data) << 16;
            }
            Some(FlatPort::Render) => self.render_write(data),
            Some(FlatPort::RenderComplete) => self.render_complete(data, rasterizer),
            _ => trace!("DSP write {data:#06x} to port {port:#x} ignored"),
        }
    }

    pub fn cuskey_read(&self, pc: u16) -> u16 {
        self.profile.cuskey(pc).unwrap_or(0)
    }

    pub fn point_ram_control_write(&mut self, value: u16) {
        self.point_ram.write_control(value);
    }

    pub fn point_ram_data_read(&self) -> u8 {
        self.point_ram.read_data()
    }

    pub fn point_ram_data_write(&mut self, value: u16) {
        self.point_ram.write_data(value);
    }

    pub fn depth_cue_write(&mut self, offset: usize, value: u16) {
        self.point_ram.write_depth_cue(offset, value);
    }
}

impl GeometryPipeline for FlatPipeline {
    /// Drawing happens on host writes; there is nothing to pump.
    fn poll(&mut self, _rasterizer: &mut dyn Rasterizer) {}

    fn vblank(&mut self, _rasterizer: &mut dyn Rasterizer) {}

    /// A DSP reset draws whatever is buffered unless the overflow halted it.
    fn kickstart(&mut self, rasterizer: &mut dyn Rasterizer) {
        info!("kickstart");
        self.flush(rasterizer);
        rasterizer.clear();
        self.halted = false;
        self.dsp_resets += 1;
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn take_faults(&mut self) -> Vec<PipelineFault> {
        self.faults.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{
        point_ram::{QuadRecord, QUAD_RECORD_SIZE},
        QuadLog, ScreenVertex,
    };

    fn flat() -> FlatPipeline {
        FlatPipeline::new(Board::WinningRun, PointRom::from_words([0x12_3456, 0x00ff_fff0])).unwrap()
    }

    #[test]
    fn rejects_master_slave_board() {
        assert!(FlatPipeline::new(Board::Solvalou, PointRom::from_words([])).is_err());
    }

    #[test]
    fn render_complete_draws_direct_quad() {
        let mut flat = flat();
        let mut log = QuadLog::default();
        flat.render_write(0x8077);
        for word in [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12] {
            flat.render_write(word);
        }
        flat.render_complete(0, &mut log);
        assert!(log.quads.is_empty());

        flat.dsp_port_write(FlatPort::RenderComplete as u16, 1, &mut log);
        assert_eq!(log.quads.len(), 1);
        assert_eq!(log.quads[0].color, 0x77);
        assert_eq!(log.clears, 1);
        assert_eq!(flat.poly_len(), 0);
        assert_eq!(flat.dsp_resets(), 1);
    }

    #[test]
    fn chain_uses_color_byte_only() {
        let mut flat = flat();
        let mut log = QuadLog::default();
        flat.point_ram_control_write(0);
        let record = QuadRecord {
            code: 0x85,
            color: 0x33,
            vertices: [0, 1, 0, 1],
        };
        for byte in [record.code, record.color, 0, 1, 0, 1] {
            flat.point_ram_data_write(u16::from(byte));
        }
        assert_eq!(flat.point_ram().quad_record(0), record);

        for word in [0, 0xfffc, 4, 9, 4, 0xfffc, 10] {
            flat.render_write(word);
        }
        assert_eq!(flat.poly_reset_read(&mut log), 0);
        assert_eq!(log.quads.len(), 1);
        assert_eq!(log.quads[0].color, 0x33);
        assert_eq!(log.quads[0].vertices[1], ScreenVertex { x: 252, y: 236, z: 10 });
        assert_eq!(flat.point_ram().quad_record(QUAD_RECORD_SIZE).code, 0);
    }

    #[test]
    fn parameter_overflow_halts() {
        let mut flat = flat();
        let mut log = QuadLog::default();
        for word in 0..=MAX_POLY_PARAM as u16 {
            flat.render_write(word);
        }
        assert_eq!(flat.poly_len(), MAX_POLY_PARAM);
        assert!(flat.is_halted());
        assert!(flat.take_faults()[0].is_fatal());

        flat.kickstart(&mut log);
        assert!(!flat.is_halted());
        assert_eq!(flat.poly_len(), 0);
        assert!(log.quads.is_empty());
    }

    #[test]
    fn kickstart_draws_buffered_polygon() {
        let mut flat = flat();
        let mut log = QuadLog::default();
        flat.render_write(0x8021);
        for word in [0u16; 12] {
            flat.render_write(word);
        }
        flat.kickstart(&mut log);
        assert_eq!(log.quads.len(), 1);
        assert_eq!(log.quads[0].color, 0x21);
        assert_eq!(log.clears, 1);
        assert_eq!(flat.poly_len(), 0);
        assert_eq!(flat.dsp_resets(), 1);
    }

    #[test]
    fn program_goes_live_when_fully_written() {
        let mut flat = flat();
        for offset in 0..DSP_CODE_WORDS - 1 {
            flat.dsp_code_write(offset, offset as u16);
        }
        flat.dsp_code_write(5, 0xdead);
        assert!(!flat.code().is_live());
        assert_eq!(flat.code().pending_words(), 1);
        assert_eq!(flat.code().instructions()[5], 0);

        flat.dsp_code_write(DSP_CODE_WORDS - 1, 0xbeef);
        assert!(flat.code().is_live());
        assert_eq!(flat.code().instructions()[5], 0xdead);
        assert_eq!(flat.code().instructions()[DSP_CODE_WORDS - 1], 0xbeef);
        assert_eq!(flat.code().pending_words(), DSP_CODE_WORDS);
    }

    #[test]
    fn point_rom_ports_auto_increment() {
        let mut flat = flat();
        let mut log = QuadLog::default();
        flat.dsp_port_write(FlatPort::PointRomAddressHigh as u16, 0, &mut log);
        flat.dsp_port_write(FlatPort::PointRomAddressLow as u16, 0, &mut log);
        assert_eq!(flat.dsp_port_read(FlatPort::PointRomData as u16), 0x3456);
        assert_eq!(flat.dsp_port_read(FlatPort::PointRomData as u16), 0xfff0);
        assert_eq!(flat.dsp_port_read(FlatPort::PointRomData as u16), 0xffff);
    }

    #[test]
    fn comram_banks_follow_control() {
        let mut flat = flat();
        let comram = flat.comram_mut();
        comram.host_write(0x0010, 0x1111);
        comram.host_write(COMRAM_BANK_WORDS + 0x10, 0x2222);
        assert_eq!(comram.dsp_read(0x10), 0x2222);
        comram.control_write(COMRAM_BANK_SELECT, 1);
        assert_eq!(comram.dsp_read(0x10), 0x1111);
        comram.dsp_write(0x11, 0x3333);
        assert_eq!(comram.host_read(0x11), 0x3333);
        assert_eq!(comram.control_read(COMRAM_BANK_SELECT + COMRAM_CONTROL_WORDS), 1);
    }

    #[test]
    fn cuskey_table() {
        let flat = flat();
        assert_eq!(flat.cuskey_read(0x0073), 0x0144);
        assert_eq!(flat.cuskey_read(0x0074), 0);
    }
}
