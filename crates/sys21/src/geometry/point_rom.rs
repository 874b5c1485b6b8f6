use tracing::trace;

use crate::bits::SignExtend24;

use super::mesh::PolygonRecord;

/// Terminates a mesh list.
pub const MESH_END: i32 = 0xFF_FFFF;

/// Read-only mesh database of signed 24-bit words.
///
/// The image is split into an object address table at the start, per-object
/// lists of polygon record addresses ended by [`MESH_END`], and the polygon
/// records themselves.
pub struct PointRom {
    words: Box<[i32]>,
}

impl PointRom {
    pub fn from_words(words: impl IntoIterator<Item = i32>) -> PointRom {
        PointRom {
            words: words.into_iter().map(SignExtend24::sign_extend24).collect(),
        }
    }

    /// Three bytes per word, most significant first. A trailing partial word
    /// is ignored.
    pub fn from_packed_be(bytes: &[u8]) -> PointRom {
        PointRom::from_words(bytes.chunks_exact(3).map(|word| {
            (u32::from(word[0]) << 16 | u32::from(word[1]) << 8 | u32::from(word[2])) as i32
        }))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Reads past the end return all ones, which is also the mesh list
    /// terminator.
    pub fn read_word(&self, index: usize) -> i32 {
        match self.words.get(index) {
            Some(&word) => word,
            None => {
                trace!("point ROM read past end at {index:#x}");
                -1
            }
        }
    }

    /// Address of an object's mesh list, from the table at the start of ROM.
    pub fn object_address(&self, object: u16) -> usize {
        (self.read_word(object as usize) & MESH_END) as usize
    }

    /// Polygon record addresses of the mesh list starting at `address`.
    pub fn mesh_list(&self, address: usize) -> impl Iterator<Item = usize> + '_ {
        (address..)
            .map(|index| self.read_word(index) & MESH_END)
            .take_while(|&word| word != MESH_END)
            .map(|word| word as usize)
    }

    /// Word count of the record at `address`, excluding the count itself.
    pub fn record_len(&self, address: usize) -> u16 {
        self.read_word(address) as u16
    }

    /// Record body as the 16-bit words the transfer stream carries.
    pub fn record_words(&self, address: usize) -> impl Iterator<Item = u16> + '_ {
        let len = self.record_len(address) as usize;
        (address + 1..address + 1 + len).map(|index| self.read_word(index) as u16)
    }

    pub fn mesh(&self, object: u16) -> Vec<(usize, Option<PolygonRecord>)> {
        self.mesh_list(self.object_address(object))
            .map(|address| {
                let words: Vec<u16> = self.record_words(address).collect();
                (address, PolygonRecord::parse(&words))
            })
            .collect()
    }

    /// Wrapping sum of the unsigned 24-bit words.
    pub fn checksum(&self) -> u32 {
        self.words
            .iter()
            .fold(0u32, |sum, &word| sum.wrapping_add((word & MESH_END) as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom() -> PointRom {
        PointRom::from_words([
            // object table
            2, 5, // object 0 -> mesh list at 2, object 1 -> mesh list at 5
            // object 0 mesh list
            6, 0x00ff_ffff, 0, //
            // object 1 mesh list (empty)
            0x00ff_ffff,
            // record at 6
            4, 0x10, 0, 0x00ff_fff0, 0,
        ])
    }

    #[test]
    fn sign_extends_words() {
        let rom = rom();
        assert_eq!(rom.read_word(3), -1);
        assert_eq!(rom.read_word(9), -16);
        assert_eq!(rom.read_word(0), 2);
    }

    #[test]
    fn reads_past_end_as_terminator() {
        let rom = rom();
        assert_eq!(rom.read_word(rom.len()), -1);
        assert_eq!(rom.mesh_list(rom.len()).count(), 0);
    }

    #[test]
    fn walks_mesh_lists() {
        let rom = rom();
        assert_eq!(rom.object_address(0), 2);
        assert_eq!(rom.mesh_list(2).collect::<Vec<_>>(), vec![6]);
        assert_eq!(rom.mesh_list(rom.object_address(1)).count(), 0);
        assert_eq!(rom.record_len(6), 4);
        assert_eq!(
            rom.record_words(6).collect::<Vec<_>>(),
            vec![0x10, 0, 0xfff0, 0]
        );
    }

    #[test]
    fn unpacks_big_endian_triplets() {
        let rom = PointRom::from_packed_be(&[0x00, 0x01, 0x02, 0xff, 0xff, 0xfe, 0x12]);
        assert_eq!(rom.len(), 2);
        assert_eq!(rom.read_word(0), 0x0102);
        assert_eq!(rom.read_word(1), -2);
        assert_eq!(rom.checksum(), 0x0102 + 0xff_fffe);
    }
}
