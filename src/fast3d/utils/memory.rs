//! Owned byte arenas for TMEM and RDRAM.
//!
//! Both hold data in N64 (big-endian) byte order. TMEM addresses wrap at 4KB
//! like the hardware; RDRAM accesses are bounds checked and out-of-range
//! accesses are reported instead of touching memory.

pub const TMEM_SIZE: usize = 4096;
/// Palettes live in the upper half of TMEM.
pub const TLUT_OFFSET: usize = 0x800;
pub const RDRAM_SIZE: usize = 8 * 1024 * 1024;

pub struct Tmem {
    bytes: Box<[u8]>,
}

impl Default for Tmem {
    fn default() -> Self {
        Self::new()
    }
}

impl Tmem {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; TMEM_SIZE].into_boxed_slice(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn read_u8(&self, address: usize) -> u8 {
        self.bytes[address & (TMEM_SIZE - 1)]
    }

    #[inline]
    pub fn read_u16(&self, address: usize) -> u16 {
        u16::from_be_bytes([self.read_u8(address), self.read_u8(address + 1)])
    }

    #[inline]
    pub fn write_u8(&mut self, address: usize, value: u8) {
        self.bytes[address & (TMEM_SIZE - 1)] = value;
    }

    #[inline]
    pub fn write_u16(&mut self, address: usize, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.write_u8(address, hi);
        self.write_u8(address + 1, lo);
    }

    pub fn write_bytes(&mut self, address: usize, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_u8(address + i, *byte);
        }
    }

    /// Returns up to `len` bytes starting at `offset`, cut short at the end of TMEM.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(TMEM_SIZE);
        let end = offset.saturating_add(len).min(TMEM_SIZE);
        &self.bytes[start..end]
    }

    /// The `len` bytes starting at `offset` as the texel fetch sees them: the run up to
    /// the end of TMEM followed by the part that wraps around to address 0.
    pub fn wrapping_slices(&self, offset: usize, len: usize) -> [&[u8]; 2] {
        let start = offset & (TMEM_SIZE - 1);
        let len = len.min(TMEM_SIZE);
        let head = (TMEM_SIZE - start).min(len);
        [&self.bytes[start..start + head], &self.bytes[..len - head]]
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

pub struct Rdram {
    bytes: Vec<u8>,
}

impl Rdram {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn read(&self, address: u32, len: usize) -> Option<&[u8]> {
        let start = address as usize;
        self.bytes.get(start..start.checked_add(len)?)
    }

    pub fn read_u16(&self, address: u32) -> Option<u16> {
        let bytes = self.read(address, 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn write(&mut self, address: u32, data: &[u8]) -> bool {
        let start = address as usize;
        let Some(end) = start.checked_add(data.len()) else {
            return false;
        };

        match self.bytes.get_mut(start..end) {
            Some(dst) => {
                dst.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    pub fn write_u16(&mut self, address: u32, value: u16) -> bool {
        self.write(address, &value.to_be_bytes())
    }

    pub fn copy_within(&mut self, src: u32, dst: u32, len: usize) -> bool {
        let (src, dst) = (src as usize, dst as usize);
        if src.saturating_add(len) > self.bytes.len() || dst.saturating_add(len) > self.bytes.len()
        {
            return false;
        }

        self.bytes.copy_within(src..src + len, dst);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmem_wraps() {
        let mut tmem = Tmem::new();
        tmem.write_u16(TMEM_SIZE - 1, 0xABCD);

        assert_eq!(tmem.read_u8(TMEM_SIZE - 1), 0xAB);
        assert_eq!(tmem.read_u8(0), 0xCD);
        assert_eq!(tmem.read_u16(TMEM_SIZE - 1), 0xABCD);
    }

    #[test]
    fn test_tmem_slice_is_clamped() {
        let tmem = Tmem::new();
        assert_eq!(tmem.slice(4000, 200).len(), 96);
        assert!(tmem.slice(5000, 8).is_empty());
    }

    #[test]
    fn test_tmem_wrapping_slices() {
        let mut tmem = Tmem::new();
        tmem.write_bytes(TMEM_SIZE - 2, &[1, 2, 3, 4]);

        let [head, tail] = tmem.wrapping_slices(TMEM_SIZE - 2, 4);
        assert_eq!(head, &[1, 2]);
        assert_eq!(tail, &[3, 4]);

        let [head, tail] = tmem.wrapping_slices(16, 8);
        assert_eq!(head.len(), 8);
        assert!(tail.is_empty());

        let [head, tail] = tmem.wrapping_slices(8, 2 * TMEM_SIZE);
        assert_eq!(head.len() + tail.len(), TMEM_SIZE);
    }

    #[test]
    fn test_rdram_bounds() {
        let mut rdram = Rdram::new(16);
        assert!(rdram.write_u16(14, 0x1234));
        assert_eq!(rdram.read_u16(14), Some(0x1234));
        assert!(!rdram.write_u16(15, 0x1234));
        assert_eq!(rdram.read(12, 8), None);
        assert!(!rdram.copy_within(0, 10, 8));
        assert!(rdram.copy_within(14, 0, 2));
        assert_eq!(rdram.read_u16(0), Some(0x1234));
    }
}
