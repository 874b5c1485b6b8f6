use std::ops::Range;

use enum_map::{enum_map, Enum, EnumMap};

/// Word addresses the master can reach (`address & 0x7FFF`).
pub const SHARED_RAM_WORDS: usize = 0x8000;
pub const ADDRESS_MASK: u16 = 0x7FFF;

/// The two display list pages the scene producer alternates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Page {
    Page0,
    Page1,
}

/// Word ranges of one display list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub camera: Range<u16>,
    pub objects: Range<u16>,
}

/// Byte offsets from the host's view of the window, halved into word
/// addresses.
fn byte_window(start: u16, end: u16) -> Range<u16> {
    start / 2..end / 2
}

pub fn page_windows() -> EnumMap<Page, PageWindow> {
    enum_map! {
        Page::Page0 => PageWindow {
            camera: byte_window(0x8000, 0x8100),
            objects: byte_window(0x8200, 0x9000),
        },
        Page::Page1 => PageWindow {
            camera: byte_window(0xC000, 0xC100),
            objects: byte_window(0xC200, 0xD000),
        },
    }
}

/// Control/status words, as host byte offsets.
pub mod control {
    pub const POINT_ROM_CHECKSUM_LOW: u16 = 0x100;
    pub const POINT_ROM_CHECKSUM_HIGH: u16 = 0x102;
    pub const CODE_UPLOADED: u16 = 0x104;
    pub const CODE_SIZE_LOW: u16 = 0x106;
    pub const CODE_SIZE_HIGH: u16 = 0x108;
    pub const END: u16 = 0x120;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOverrun {
    pub window_words: usize,
    pub written: usize,
}

/// Memory both host CPUs and the master unit see.
pub struct SharedRam {
    words: Box<[u16]>,
}

impl SharedRam {
    pub fn new() -> SharedRam {
        SharedRam {
            words: vec![0; SHARED_RAM_WORDS].into_boxed_slice(),
        }
    }

    pub fn read(&self, address: u16) -> u16 {
        self.words[(address & ADDRESS_MASK) as usize]
    }

    pub fn write(&mut self, address: u16, value: u16) {
        self.words[(address & ADDRESS_MASK) as usize] = value;
    }

    pub fn load(&mut self, address: u16, words: &[u16]) {
        for (i, &word) in words.iter().enumerate() {
            self.write(address.wrapping_add(i as u16), word);
        }
    }

    fn write_window(&mut self, window: Range<u16>, words: &[u16]) -> Result<(), WindowOverrun> {
        if words.len() > window.len() {
            return Err(WindowOverrun {
                window_words: window.len(),
                written: words.len(),
            });
        }
        self.load(window.start, words);
        Ok(())
    }

    pub fn write_camera(&mut self, page: Page, words: &[u16]) -> Result<(), WindowOverrun> {
        self.write_window(page_windows()[page].camera.clone(), words)
    }

    pub fn write_objects(&mut self, page: Page, words: &[u16]) -> Result<(), WindowOverrun> {
        self.write_window(page_windows()[page].objects.clone(), words)
    }

    fn control_word(&self, offset: u16) -> u16 {
        self.read(offset / 2)
    }

    fn set_control_word(&mut self, offset: u16, value: u16) {
        self.write(offset / 2, value);
    }

    pub fn point_rom_checksum(&self) -> u32 {
        u32::from(self.control_word(control::POINT_ROM_CHECKSUM_HIGH)) << 16
            | u32::from(self.control_word(control::POINT_ROM_CHECKSUM_LOW))
    }

    pub fn set_point_rom_checksum(&mut self, checksum: u32) {
        self.set_control_word(control::POINT_ROM_CHECKSUM_LOW, checksum as u16);
        self.set_control_word(control::POINT_ROM_CHECKSUM_HIGH, (checksum >> 16) as u16);
    }

    pub fn code_uploaded(&self) -> bool {
        self.control_word(control::CODE_UPLOADED) != 0
    }

    pub fn code_size(&self) -> u32 {
        u32::from(self.control_word(control::CODE_SIZE_HIGH)) << 16
            | u32::from(self.control_word(control::CODE_SIZE_LOW))
    }

    pub fn publish_code(&mut self, size: u32) {
        self.set_control_word(control::CODE_SIZE_LOW, size as u16);
        self.set_control_word(control::CODE_SIZE_HIGH, (size >> 16) as u16);
        self.set_control_word(control::CODE_UPLOADED, 1);
    }
}

impl Default for SharedRam {
    fn default() -> Self {
        SharedRam::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_map_to_word_addresses() {
        let windows = page_windows();
        assert_eq!(windows[Page::Page0].camera, 0x4000..0x4080);
        assert_eq!(windows[Page::Page0].objects, 0x4100..0x4800);
        assert_eq!(windows[Page::Page1].camera, 0x6000..0x6080);
        assert_eq!(windows[Page::Page1].objects, 0x6100..0x6800);
    }

    #[test]
    fn rejects_oversized_window_writes() {
        let mut ram = SharedRam::new();
        ram.write_camera(Page::Page1, &[1, 2, 3]).unwrap();
        assert_eq!(ram.read(0x6000), 1);
        assert_eq!(ram.read(0x6002), 3);
        let too_long = vec![0u16; 0x81];
        assert_eq!(
            ram.write_camera(Page::Page0, &too_long),
            Err(WindowOverrun {
                window_words: 0x80,
                written: 0x81
            })
        );
    }

    #[test]
    fn addresses_wrap_at_mask() {
        let mut ram = SharedRam::new();
        ram.write(0x8001, 0xbeef);
        assert_eq!(ram.read(0x0001), 0xbeef);
    }

    #[test]
    fn control_block_fields() {
        let mut ram = SharedRam::new();
        ram.set_point_rom_checksum(0x1234_5678);
        assert_eq!(ram.read(0x80), 0x5678);
        assert_eq!(ram.read(0x81), 0x1234);
        assert_eq!(ram.point_rom_checksum(), 0x1234_5678);
        assert!(!ram.code_uploaded());
        ram.publish_code(0x1_0002);
        assert!(ram.code_uploaded());
        assert_eq!(ram.code_size(), 0x1_0002);
        assert!(control::CODE_SIZE_HIGH < control::END);
    }
}
