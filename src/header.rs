//! Block descriptors stored in the spare area of a page.
//!
//! Three layouts share the same set of fields, only their byte positions
//! differ. Bit 0 is the least significant bit of a byte.

use bit::BitIndex;

use crate::{
    ecc::{pack_ecc, unpack_ecc},
    error::Error,
    SPARE_SIZE,
};

const BLOCK_TYPE_BYTE: usize = 12;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Small block controller, 16kB blocks
    SmallBlock,
    /// Big block controller running a small block layout
    BigOnSmall,
    /// Big block controller
    BigBlock,
}

/// Byte position of each field
struct FieldMap {
    block_id_1: usize,
    /// high nibble holds block_id_0, low nibble is unused
    block_id_0: usize,
    fs_sequence: [usize; 4],
    bad_block: usize,
    fs_size_1: usize,
    fs_size_0: usize,
    fs_page_count: usize,
}

const SMALL_BLOCK: FieldMap = FieldMap {
    block_id_1: 0,
    block_id_0: 1,
    fs_sequence: [2, 3, 4, 6],
    bad_block: 5,
    fs_size_1: 7,
    fs_size_0: 8,
    fs_page_count: 9,
};

const BIG_ON_SMALL: FieldMap = FieldMap {
    block_id_1: 1,
    block_id_0: 2,
    fs_sequence: [0, 3, 4, 6],
    bad_block: 5,
    fs_size_1: 7,
    fs_size_0: 8,
    fs_page_count: 9,
};

const BIG_BLOCK: FieldMap = FieldMap {
    block_id_1: 1,
    block_id_0: 2,
    fs_sequence: [5, 3, 4, 6],
    bad_block: 0,
    fs_size_1: 7,
    fs_size_0: 8,
    fs_page_count: 9,
};

impl Layout {
    fn fields(self) -> &'static FieldMap {
        match self {
            Layout::SmallBlock => &SMALL_BLOCK,
            Layout::BigOnSmall => &BIG_ON_SMALL,
            Layout::BigBlock => &BIG_BLOCK,
        }
    }

    /// Whether `block_id` and `fs_size` can be written as a whole
    pub fn computed_fields_writable(self) -> bool {
        !matches!(self, Layout::BigBlock)
    }
}

/// A decoded block descriptor. Setters only touch the bytes of their field.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    layout: Layout,
    raw: [u8; SPARE_SIZE],
}

impl BlockHeader {
    pub fn new(layout: Layout, raw: [u8; SPARE_SIZE]) -> Self {
        Self { layout, raw }
    }

    /// Decode a header from a spare slice, which must be exactly 16 bytes
    pub fn from_slice(layout: Layout, bytes: &[u8]) -> Result<Self, Error> {
        let raw: [u8; SPARE_SIZE] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: SPARE_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::new(layout, raw))
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8; SPARE_SIZE] {
        &self.raw
    }

    pub fn into_bytes(self) -> [u8; SPARE_SIZE] {
        self.raw
    }

    fn map(&self) -> &'static FieldMap {
        self.layout.fields()
    }

    pub fn block_id_0(&self) -> u8 {
        self.raw[self.map().block_id_0].bit_range(4..8)
    }

    pub fn block_id_1(&self) -> u8 {
        self.raw[self.map().block_id_1]
    }

    /// Logical block number. Only `block_id_1` contributes, the nibble of
    /// `block_id_0` is masked out by the controller's formula.
    pub fn block_id(&self) -> u16 {
        ((self.block_id_0() as u16) << 8 & 0xF) + (self.block_id_1() as u16 & 0xFF)
    }

    /// Write both sub-fields of the block id, accepted on every layout
    pub fn set_block_id_parts(&mut self, block_id_0: u8, block_id_1: u8) {
        let map = self.map();
        self.raw[map.block_id_0].set_bit_range(4..8, block_id_0 & 0xF);
        self.raw[map.block_id_1] = block_id_1;
    }

    pub fn set_block_id(&mut self, block_id: u16) -> Result<(), Error> {
        if !self.layout.computed_fields_writable() {
            return Err(Error::NotImplemented("block_id"));
        }
        self.set_block_id_parts((block_id >> 8) as u8, block_id as u8);
        Ok(())
    }

    pub fn fs_unused_0(&self) -> u8 {
        self.raw[self.map().block_id_0].bit_range(0..4)
    }

    pub fn fs_sequence(&self) -> u32 {
        self.map()
            .fs_sequence
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &pos)| acc | (self.raw[pos] as u32) << (8 * i))
    }

    pub fn set_fs_sequence(&mut self, sequence: u32) {
        for (i, &pos) in self.map().fs_sequence.iter().enumerate() {
            self.raw[pos] = (sequence >> (8 * i)) as u8;
        }
    }

    pub fn bad_block(&self) -> u8 {
        self.raw[self.map().bad_block]
    }

    pub fn set_bad_block(&mut self, flag: u8) {
        self.raw[self.map().bad_block] = flag;
    }

    pub fn fs_size_0(&self) -> u8 {
        self.raw[self.map().fs_size_0]
    }

    pub fn fs_size_1(&self) -> u8 {
        self.raw[self.map().fs_size_1]
    }

    /// Size stored in the block, e.g. a certificate size. Same masking as [`BlockHeader::block_id`].
    pub fn fs_size(&self) -> u16 {
        ((self.fs_size_0() as u16) << 8 & 0xFF) + (self.fs_size_1() as u16 & 0xFF)
    }

    pub fn set_fs_size_parts(&mut self, fs_size_0: u8, fs_size_1: u8) {
        let map = self.map();
        self.raw[map.fs_size_0] = fs_size_0;
        self.raw[map.fs_size_1] = fs_size_1;
    }

    pub fn set_fs_size(&mut self, fs_size: u16) -> Result<(), Error> {
        if !self.layout.computed_fields_writable() {
            return Err(Error::NotImplemented("fs_size"));
        }
        self.set_fs_size_parts((fs_size >> 8) as u8, fs_size as u8);
        Ok(())
    }

    /// Free pages left in the block
    pub fn fs_page_count(&self) -> u8 {
        self.raw[self.map().fs_page_count]
    }

    pub fn set_fs_page_count(&mut self, count: u8) {
        self.raw[self.map().fs_page_count] = count;
    }

    pub fn fs_unused_1(&self) -> [u8; 2] {
        [self.raw[10], self.raw[11]]
    }

    pub fn fs_block_type(&self) -> u8 {
        self.raw[BLOCK_TYPE_BYTE].bit_range(0..6)
    }

    /// Set the 6-bit block type, leaving the ECC bits of the byte untouched
    pub fn set_fs_block_type(&mut self, block_type: u8) -> Result<(), Error> {
        if block_type > 0x3F {
            return Err(Error::Value);
        }
        self.raw[BLOCK_TYPE_BYTE].set_bit_range(0..6, block_type);
        Ok(())
    }

    pub fn ecc(&self) -> u32 {
        unpack_ecc(&self.raw)
    }

    pub fn set_ecc(&mut self, ecc: u32) {
        pack_ecc(ecc, &mut self.raw);
    }
}

impl From<BlockHeader> for [u8; SPARE_SIZE] {
    fn from(header: BlockHeader) -> [u8; SPARE_SIZE] {
        header.raw
    }
}
