//! Frame checksum and image CRC.
//!
//! - [`checksum8`]: seeded 8-bit wrapping byte sum. The seed lets a caller
//!   extend one checksum across a header and a separately held payload.
//! - [`crc16_ccitt`]: CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no
//!   reflection, no final XOR) over a firmware image.

/// 8-bit rolling checksum, continuing from `seed`.
pub fn checksum8(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, &b| acc.wrapping_add(b))
}

const CRC16_POLY: u16 = 0x1021;
const CRC16_INIT: u16 = 0xFFFF;

const fn make_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC16_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC16_TABLE: [u16; 256] = make_crc16_table();

/// Incremental CRC-16/CCITT accumulator.
///
/// Used when the image is read back from flash in chunks rather than
/// held in RAM as one slice.
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    crc: u16,
}

impl Crc16 {
    pub const fn new() -> Self {
        Self { crc: CRC16_INIT }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            let idx = ((self.crc >> 8) as u8 ^ b) as usize;
            self.crc = (self.crc << 8) ^ CRC16_TABLE[idx];
        }
    }

    pub fn finish(&self) -> u16 {
        self.crc
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot CRC-16/CCITT over a contiguous region.
pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(bytes);
    crc.finish()
}
