//! Flash-domain access and addressing modes.
//!
//! The flash domain is the image without its spare bytes. Reads and writes
//! are split per page; every touched page is rewritten as a whole through
//! [`NandImage::set_page`] so its ECC stays valid.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;

use crate::{
    address::page_spans,
    error::Error,
    image::NandImage,
    Whence,
};

// Type states for the addressing mode
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default)]
pub struct FileAddressed;
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default)]
pub struct FlashAddressed;

impl<S, A> NandImage<S, A>
where
    S: Read + Write + Seek,
{
    /// Current resource position, translated to the flash domain
    pub fn flash_tell(&mut self) -> Result<i64, Error> {
        let pos = self.file_tell()?;
        Ok(self.geometry.file_to_flash(pos))
    }

    /// Seek in the flash domain. Returns the new flash offset.
    ///
    /// Positive offsets move the flash cursor directly. Negative offsets are
    /// resolved as file seeks, `End` with 0 goes to the real end of the image
    /// and `End` with a positive offset is rejected.
    pub fn flash_seek(&mut self, offset: i64, whence: Whence) -> Result<i64, Error> {
        let flash_size = self.geometry.flash_size;
        match whence {
            Whence::Set if offset >= 0 => self.set_flash_offset(offset)?,
            Whence::Set => {
                let target = self.flash_to_file_of(flash_size.checked_sub(offset))?;
                self.file_seek(target, Whence::Set)?;
            }
            Whence::Cur if offset >= 0 => {
                let target = self.flash_offset.checked_add(offset).ok_or(Error::OutOfBounds)?;
                self.set_flash_offset(target)?
            }
            Whence::Cur => {
                let delta = self.flash_to_file_of(self.flash_offset.checked_sub(offset))?;
                self.file_seek(delta, Whence::Cur)?;
            }
            Whence::End if offset == 0 => {
                self.file_seek(0, Whence::End)?;
            }
            Whence::End if offset < 0 => {
                let delta = self.flash_to_file_of(flash_size.checked_sub(offset))?;
                self.file_seek(delta, Whence::End)?;
            }
            Whence::End => return Err(Error::OutOfBounds),
        }
        Ok(self.flash_offset)
    }

    fn flash_to_file_of(&self, offset: Option<i64>) -> Result<i64, Error> {
        offset
            .and_then(|o| self.geometry.checked_flash_to_file(o))
            .ok_or(Error::OutOfBounds)
    }

    /// End of a flash span starting at the cursor
    fn span_end(&self, len: usize) -> Result<i64, Error> {
        i64::try_from(len)
            .ok()
            .and_then(|len| self.flash_offset.checked_add(len))
            .ok_or(Error::OutOfBounds)
    }

    /// Read `num` bytes at the flash cursor, across as many pages as needed.
    /// The cursor is left right after the last byte read.
    pub fn flash_read(&mut self, num: usize) -> Result<Vec<u8>, Error> {
        let start = self.flash_offset;
        if start < 0 {
            return Err(Error::OutOfBounds);
        }

        let end = self.span_end(num)?;

        let mut data = Vec::with_capacity(num);
        for (page, range) in page_spans(start, num) {
            let body = self.get_page(page)?;
            data.extend_from_slice(&body[range]);
        }
        self.set_flash_offset(end)?;
        Ok(data)
    }

    /// Write at the flash cursor. Each touched page is read, patched and
    /// committed with a fresh ECC, so the returned count includes 528 bytes
    /// per page rather than `data.len()`. Not atomic across pages.
    pub fn flash_write(&mut self, data: &[u8]) -> Result<usize, Error> {
        let start = self.flash_offset;
        if start < 0 {
            return Err(Error::OutOfBounds);
        }

        let end = self.span_end(data.len())?;

        let mut written = 0;
        let mut chunks = data;
        for (page, range) in page_spans(start, data.len()) {
            let mut body = self.get_page(page)?;
            let (chunk, rest) = chunks.split_at(range.len());
            body[range].copy_from_slice(chunk);
            chunks = rest;
            written += self.set_page(page, &body)?;
        }
        self.set_flash_offset(end)?;
        Ok(written)
    }

    /// Bytes left between the flash cursor and the end of the flash domain
    fn flash_remaining(&self) -> usize {
        (self.geometry.flash_size - self.flash_offset).max(0) as usize
    }
}

impl<S> NandImage<S, FileAddressed>
where
    S: Read + Write + Seek,
{
    pub fn into_flash_addressed(self) -> NandImage<S, FlashAddressed> {
        debug!("switching to flash addressing");
        self.into_mode()
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64, Error> {
        self.file_seek(offset, whence)
    }

    pub fn tell(&mut self) -> Result<i64, Error> {
        self.file_tell()
    }

    /// Read `num` bytes, or up to the end of the image when `num` is 0
    pub fn read(&mut self, num: usize) -> Result<Vec<u8>, Error> {
        self.file_read(num)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.file_write(data)
    }
}

impl<S> NandImage<S, FlashAddressed>
where
    S: Read + Write + Seek,
{
    pub fn into_file_addressed(self) -> NandImage<S, FileAddressed> {
        debug!("switching to file addressing");
        self.into_mode()
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64, Error> {
        self.flash_seek(offset, whence)
    }

    pub fn tell(&mut self) -> Result<i64, Error> {
        self.flash_tell()
    }

    pub fn read(&mut self, num: usize) -> Result<Vec<u8>, Error> {
        self.flash_read(num)
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.flash_write(data)
    }
}

fn split_seek(pos: SeekFrom) -> io::Result<(i64, Whence)> {
    Ok(match pos {
        SeekFrom::Start(n) => (
            i64::try_from(n).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?,
            Whence::Set,
        ),
        SeekFrom::Current(n) => (n, Whence::Cur),
        SeekFrom::End(n) => (n, Whence::End),
    })
}

fn to_position(offset: i64) -> io::Result<u64> {
    u64::try_from(offset).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))
}

impl<S> Read for NandImage<S, FileAddressed>
where
    S: Read + Write + Seek,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let data = self.file_read(buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<S> Write for NandImage<S, FileAddressed>
where
    S: Read + Write + Seek,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.file_write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(NandImage::flush(self)?)
    }
}

impl<S> Seek for NandImage<S, FileAddressed>
where
    S: Read + Write + Seek,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = split_seek(pos)?;
        to_position(self.file_seek(offset, whence)?)
    }
}

impl<S> Read for NandImage<S, FlashAddressed>
where
    S: Read + Write + Seek,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(self.flash_remaining());
        if len == 0 {
            return Ok(0);
        }
        let data = self.flash_read(len)?;
        buf[..len].copy_from_slice(&data);
        Ok(len)
    }
}

/// Writes stop at the end of the flash domain, and report the bytes of
/// `buf` consumed rather than the bytes rewritten in the image.
impl<S> Write for NandImage<S, FlashAddressed>
where
    S: Read + Write + Seek,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = buf.len().min(self.flash_remaining());
        if len == 0 {
            return Ok(0);
        }
        self.flash_write(&buf[..len])?;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(NandImage::flush(self)?)
    }
}

impl<S> Seek for NandImage<S, FlashAddressed>
where
    S: Read + Write + Seek,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = split_seek(pos)?;
        to_position(self.flash_seek(offset, whence)?)
    }
}

/// Implementation of the `NorFlash` traits of the `embedded_storage` crate over the flash domain.
/// Erasing fills pages with `0xFF` and recomputes their ECC.
mod es {
    use super::*;
    use crate::{address::Page, PAGE_SIZE};
    use embedded_storage::nor_flash::{
        check_erase, check_read, check_write, ErrorType, MultiwriteNorFlash, NorFlash,
        NorFlashError, NorFlashErrorKind, ReadNorFlash,
    };

    impl From<NorFlashErrorKind> for Error {
        fn from(e: NorFlashErrorKind) -> Self {
            match e {
                NorFlashErrorKind::NotAligned => Error::NotAligned,
                NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
                _ => Error::Value,
            }
        }
    }

    impl NorFlashError for Error {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
                Error::NotAligned => NorFlashErrorKind::NotAligned,
                _ => NorFlashErrorKind::Other,
            }
        }
    }

    impl<S, A> ErrorType for NandImage<S, A>
    where
        S: Read + Write + Seek,
    {
        type Error = Error;
    }

    impl<S, A> ReadNorFlash for NandImage<S, A>
    where
        S: Read + Write + Seek,
    {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            check_read(self, offset, bytes.len())?;
            self.flash_seek(offset as i64, Whence::Set)?;
            let data = self.flash_read(bytes.len())?;
            bytes.copy_from_slice(&data);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.geometry.flash_size as usize
        }
    }

    impl<S, A> NorFlash for NandImage<S, A>
    where
        S: Read + Write + Seek,
    {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = PAGE_SIZE;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            check_erase(self, from, to)?;
            let erased = [0xFFu8; PAGE_SIZE];
            let first = from / PAGE_SIZE as u32 + 1;
            let last = to / PAGE_SIZE as u32;
            for n in first..=last {
                self.set_page(Page(n), &erased)?;
            }
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            check_write(self, offset, bytes.len())?;
            self.flash_seek(offset as i64, Whence::Set)?;
            self.flash_write(bytes)?;
            Ok(())
        }
    }

    impl<S, A> MultiwriteNorFlash for NandImage<S, A> where S: Read + Write + Seek {}
}
