//! Spare-area ECC.
//!
//! The checksum is a bit-serial CRC over the whole page body followed by the
//! first 102 bits of the spare area, so it covers spare bytes 0 to 11 and the
//! block type bits of byte 12 but never its own bits. Only the low 26 bits of
//! the result are stored.

use byteorder::{ByteOrder, LittleEndian};

use crate::{PAGE_SIZE, SPARE_SIZE};

/// Number of bits consumed by the checksum
pub const ECC_BITS: usize = 0x1066;

/// Feedback polynomial
pub const POLYNOMIAL: u32 = 0x0695_4559;

/// Mask of the stored part of the checksum
pub const ECC_MASK: u32 = 0x03FF_FFFF;

/// Compute the 26-bit ECC of a page and its spare.
pub fn compute_ecc(data: &[u8; PAGE_SIZE], spare: &[u8; SPARE_SIZE]) -> u32 {
    let mut src = &data[..];
    let mut idx = 0;
    let mut val: u32 = 0;
    let mut v: u32 = 0;

    for bit in 0..ECC_BITS {
        if bit & 31 == 0 {
            if bit == PAGE_SIZE * 8 {
                src = &spare[..];
                idx = 0;
            }
            v = !LittleEndian::read_u32(&src[idx..idx + 4]);
            idx += 4;
        }
        val ^= v & 1;
        v >>= 1;
        if val & 1 != 0 {
            val ^= POLYNOMIAL;
        }
        val >>= 1;
    }
    !val
}

/// Pack an ECC in the last four spare bytes, keeping the block type bits of byte 12.
pub fn pack_ecc(ecc: u32, spare: &mut [u8; SPARE_SIZE]) {
    spare[12] = (spare[12] & 0x3F) | ((ecc << 6) & 0xC0) as u8;
    spare[13] = (ecc >> 2) as u8;
    spare[14] = (ecc >> 10) as u8;
    spare[15] = (ecc >> 18) as u8;
}

/// Extract the ECC stored in a spare
pub fn unpack_ecc(spare: &[u8; SPARE_SIZE]) -> u32 {
    ((spare[12] as u32 >> 6)
        | (spare[13] as u32) << 2
        | (spare[14] as u32) << 10
        | (spare[15] as u32) << 18)
        & ECC_MASK
}

/// Compute the ECC of a page and store it in its spare. Returns the computed value.
pub fn apply_ecc(data: &[u8; PAGE_SIZE], spare: &mut [u8; SPARE_SIZE]) -> u32 {
    let ecc = compute_ecc(data, spare);
    pack_ecc(ecc, spare);
    ecc
}
