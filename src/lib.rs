//! This is a library to access raw NAND flash images made of 528-byte strides:
//! 512 bytes of page data followed by 16 bytes of spare (out-of-band) data.
//!
//! Two address spaces are exposed over the same image:
//! * the *file domain*, raw byte offsets into the dump, spare bytes included;
//! * the *flash domain*, a contiguous space made only of the 512-byte page bodies.
//!
//! Every page written through the library gets its 26-bit ECC recomputed and
//! packed into the last four spare bytes. See [`ecc`] for the algorithm and
//! [`header`] to decode the block descriptors stored in the spare area.
//!
//! ```no_run
//! use nandimg::{image::NandImage, Whence};
//!
//! # fn main() -> nandimg::error::Result<()> {
//! let mut image = NandImage::open("flash.bin")?.into_flash_addressed();
//! image.seek(0x80, Whence::Set)?;
//! image.write(&0xCA4Au16.to_be_bytes())?;
//! image.close()
//! # }
//! ```

pub mod address;
pub mod ecc;
pub mod error;
pub mod flash;
pub mod header;
pub mod image;

use crate::{
    address::{Geometry, Page},
    error::Error,
};

/// Size of the data part of a page
pub const PAGE_SIZE: usize = 0x200;

/// Size of the spare part of a page
pub const SPARE_SIZE: usize = 0x10;

/// Size of a page as laid out in the image, data followed by spare
pub const STRIDE: usize = PAGE_SIZE + SPARE_SIZE;

/// Origin of a seek, in either address domain
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Whence {
    /// From the start of the image
    #[default]
    Set,
    /// From the current position
    Cur,
    /// From the end of the image
    End,
}

pub(crate) fn check_page(geometry: &Geometry, page: Page) -> Result<(), Error> {
    if !geometry.contains(page) {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::InvalidLength { expected, actual });
    }
    Ok(())
}
