use tracing::trace;

use crate::bits::Bits;

pub const POINT_RAM_SIZE: usize = 0x20000;
pub const QUAD_RECORD_SIZE: usize = 6;
pub const DEPTH_CUE_SIZE: usize = 0x400;

/// One link of a quad chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadRecord {
    pub code: u8,
    pub color: u8,
    pub vertices: [u8; 4],
}

impl QuadRecord {
    pub fn is_last(&self) -> bool {
        self.code.bit(7)
    }

    fn to_bytes(self) -> [u8; QUAD_RECORD_SIZE] {
        let [v0, v1, v2, v3] = self.vertices;
        [self.code, self.color, v0, v1, v2, v3]
    }
}

/// Writable quad-chain store plus the two depth-cue banks it shares a
/// control register with.
pub struct PointRam {
    data: Box<[u8]>,
    index: usize,
    control: u16,
    depth_cue: [Box<[u8]>; 2],
}

impl PointRam {
    pub fn new() -> PointRam {
        PointRam {
            data: vec![0; POINT_RAM_SIZE].into_boxed_slice(),
            index: 0,
            control: 0,
            depth_cue: [
                vec![0; DEPTH_CUE_SIZE].into_boxed_slice(),
                vec![0; DEPTH_CUE_SIZE].into_boxed_slice(),
            ],
        }
    }

    /// Wraps a byte offset into the store. The flag tells whether it wrapped.
    pub fn wrap(offset: usize) -> (usize, bool) {
        let wrapped = offset & (POINT_RAM_SIZE - 1);
        (wrapped, wrapped != offset)
    }

    pub fn write_control(&mut self, value: u16) {
        trace!("point RAM control := {value:#06x}");
        self.control = value;
        self.index = 0;
    }

    pub fn control(&self) -> u16 {
        self.control
    }

    /// Byte at the upload cursor; reading does not advance it.
    pub fn read_data(&self) -> u8 {
        self.data[self.index]
    }

    /// Stores the low byte at the upload cursor and advances it.
    pub fn write_data(&mut self, value: u16) {
        self.data[self.index] = value as u8;
        self.index = (self.index + 1) & (POINT_RAM_SIZE - 1);
    }

    pub fn byte(&self, offset: usize) -> u8 {
        self.data[offset & (POINT_RAM_SIZE - 1)]
    }

    pub fn quad_record(&self, offset: usize) -> QuadRecord {
        QuadRecord {
            code: self.byte(offset),
            color: self.byte(offset + 1),
            vertices: [
                self.byte(offset + 2),
                self.byte(offset + 3),
                self.byte(offset + 4),
                self.byte(offset + 5),
            ],
        }
    }

    pub fn store_quad_record(&mut self, offset: usize, record: QuadRecord) {
        for (i, byte) in record.to_bytes().into_iter().enumerate() {
            self.data[(offset + i) & (POINT_RAM_SIZE - 1)] = byte;
        }
    }

    fn depth_cue_bank(&self) -> usize {
        usize::from(self.control.bit(5))
    }

    pub fn write_depth_cue(&mut self, offset: usize, value: u16) {
        let bank = self.depth_cue_bank();
        self.depth_cue[bank][offset & (DEPTH_CUE_SIZE - 1)] = value as u8;
    }

    /// Depth-cue table currently selected by control bit 5.
    pub fn depth_cue(&self) -> &[u8] {
        &self.depth_cue[self.depth_cue_bank()]
    }
}

impl Default for PointRam {
    fn default() -> Self {
        PointRam::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_cursor_advances_and_wraps() {
        let mut ram = PointRam::new();
        ram.write_control(0);
        ram.write_data(0x1ab);
        ram.write_data(0x02);
        assert_eq!(ram.byte(0), 0xab);
        assert_eq!(ram.byte(1), 0x02);
        assert_eq!(ram.read_data(), 0);

        ram.write_control(0);
        for _ in 0..POINT_RAM_SIZE {
            ram.write_data(0x55);
        }
        ram.write_data(0x66);
        assert_eq!(ram.byte(0), 0x66);
    }

    #[test]
    fn depth_cue_banks_follow_control() {
        let mut ram = PointRam::new();
        ram.write_depth_cue(3, 0x11);
        ram.write_control(0x20);
        ram.write_depth_cue(3, 0x22);
        assert_eq!(ram.depth_cue()[3], 0x22);
        ram.write_control(0);
        assert_eq!(ram.depth_cue()[3], 0x11);
        ram.write_depth_cue(DEPTH_CUE_SIZE + 4, 0x33);
        assert_eq!(ram.depth_cue()[4], 0x33);
    }

    #[test]
    fn quad_records_wrap_across_end() {
        let mut ram = PointRam::new();
        let record = QuadRecord {
            code: 0x81,
            color: 0x20,
            vertices: [0, 1, 2, 3],
        };
        ram.store_quad_record(POINT_RAM_SIZE - 2, record);
        assert_eq!(ram.quad_record(POINT_RAM_SIZE - 2), record);
        assert_eq!(ram.byte(0), 0);
        assert_eq!(ram.byte(3), 3);
        assert!(record.is_last());
    }

    #[test]
    fn wrap_reports_overrun() {
        assert_eq!(PointRam::wrap(0x100), (0x100, false));
        assert_eq!(PointRam::wrap(0x7fff * 6), (0x2fffa & 0x1ffff, true));
    }
}
