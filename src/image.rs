use core::marker::PhantomData;
use std::{
    fs::{File, OpenOptions},
    io::{Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
};

use log::{debug, trace, warn};

use crate::{
    address::{Geometry, Page},
    check_len, check_page,
    ecc::apply_ecc,
    error::Error,
    flash::FileAddressed,
    header::{BlockHeader, Layout},
    Whence, PAGE_SIZE, SPARE_SIZE,
};

/// Owns the underlying resource and flushes it when dropped, on every exit path.
/// Dropping the inner resource closes it.
pub(crate) struct Resource<S: Write>(S);

impl<S: Write> Drop for Resource<S> {
    fn drop(&mut self) {
        if let Err(e) = self.0.flush() {
            warn!("flush on close failed: {}", e);
        }
    }
}

/// A raw NAND image.
///
/// The addressing mode `A` selects what [`seek`](NandImage::seek), [`read`](NandImage::read),
/// [`write`](NandImage::write) and the `std::io` traits operate on. The explicit `file_*` and
/// `flash_*` primitives are always available.
pub struct NandImage<S, A = FileAddressed>
where
    S: Read + Write + Seek,
{
    pub(crate) stream: Resource<S>,
    pub(crate) geometry: Geometry,
    pub(crate) file_offset: i64,
    pub(crate) flash_offset: i64,
    pub(crate) _addressing: PhantomData<A>,
}

impl NandImage<File> {
    /// Open an existing image file for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::new(file)
    }
}

impl NandImage<Cursor<Vec<u8>>> {
    /// Work on an in-memory copy of an image, nothing is persisted
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self, Error> {
        Self::new(Cursor::new(data.into()))
    }
}

impl<S> NandImage<S, FileAddressed>
where
    S: Read + Write + Seek,
{
    /// Take ownership of a resource and measure its geometry
    pub fn new(mut stream: S) -> Result<Self, Error> {
        let file_size = stream.seek(SeekFrom::End(0))?;
        let geometry = Geometry::new(file_size);
        stream.seek(SeekFrom::Start(0))?;
        debug!(
            "image: {} bytes, {} pages, {} flash bytes",
            geometry.file_size, geometry.num_pages, geometry.flash_size
        );

        Ok(Self {
            stream: Resource(stream),
            geometry,
            file_offset: 0,
            flash_offset: 0,
            _addressing: PhantomData,
        })
    }
}

impl<S, A> NandImage<S, A>
where
    S: Read + Write + Seek,
{
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn file_size(&self) -> i64 {
        self.geometry.file_size
    }

    pub fn flash_size(&self) -> i64 {
        self.geometry.flash_size
    }

    pub fn num_pages(&self) -> u32 {
        self.geometry.num_pages
    }

    /// Current position in the file domain
    pub fn file_offset(&self) -> i64 {
        self.file_offset
    }

    /// Current position in the flash domain
    pub fn flash_offset(&self) -> i64 {
        self.flash_offset
    }

    pub fn get_ref(&self) -> &S {
        &self.stream.0
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream.0
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        Ok(self.stream.0.flush()?)
    }

    /// Flush and release the resource, reporting a failed flush
    pub fn close(mut self) -> Result<(), Error> {
        self.flush()
    }

    /// Switch addressing mode, the resource and the cursor are kept
    pub(crate) fn into_mode<B>(self) -> NandImage<S, B> {
        NandImage {
            stream: self.stream,
            geometry: self.geometry,
            file_offset: self.file_offset,
            flash_offset: self.flash_offset,
            _addressing: PhantomData,
        }
    }

    /// Move the cursor to a file offset and seek the resource there
    pub(crate) fn set_file_offset(&mut self, offset: i64) -> Result<(), Error> {
        let pos = u64::try_from(offset).map_err(|_| Error::OutOfBounds)?;
        self.stream.0.seek(SeekFrom::Start(pos))?;
        self.flash_offset = self.geometry.file_to_flash(offset);
        self.file_offset = offset;
        Ok(())
    }

    /// Move the cursor to a flash offset and seek the resource there
    pub(crate) fn set_flash_offset(&mut self, offset: i64) -> Result<(), Error> {
        let file_offset = self
            .geometry
            .checked_flash_to_file(offset)
            .ok_or(Error::OutOfBounds)?;
        let pos = u64::try_from(file_offset).map_err(|_| Error::OutOfBounds)?;
        self.stream.0.seek(SeekFrom::Start(pos))?;
        self.file_offset = file_offset;
        self.flash_offset = offset;
        Ok(())
    }

    fn sync_cursor(&mut self) -> Result<(), Error> {
        let pos = self.stream.0.stream_position()?;
        self.set_file_offset(pos as i64)
    }

    pub fn file_tell(&mut self) -> Result<i64, Error> {
        Ok(self.stream.0.stream_position()? as i64)
    }

    /// Seek in the file domain. Returns the new file offset.
    pub fn file_seek(&mut self, offset: i64, whence: Whence) -> Result<i64, Error> {
        let from = match whence {
            Whence::Set => SeekFrom::Start(u64::try_from(offset).map_err(|_| Error::OutOfBounds)?),
            Whence::Cur => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        let pos = self.stream.0.seek(from)? as i64;
        self.set_file_offset(pos)?;
        Ok(pos)
    }

    /// Read up to `num` bytes in the file domain, or everything left when `num` is 0
    pub fn file_read(&mut self, num: usize) -> Result<Vec<u8>, Error> {
        let mut data = Vec::with_capacity(num);
        if num > 0 {
            (&mut self.stream.0).take(num as u64).read_to_end(&mut data)?;
        } else {
            self.stream.0.read_to_end(&mut data)?;
        }
        self.sync_cursor()?;
        Ok(data)
    }

    pub fn file_write(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.stream.0.write_all(data)?;
        self.sync_cursor()?;
        Ok(data.len())
    }

    /// Read the data region of a page
    pub fn get_page(&mut self, page: Page) -> Result<[u8; PAGE_SIZE], Error> {
        trace!("get page {}", page.0);
        self.file_seek(page.data_start(), Whence::Set)?;
        let mut data = [0u8; PAGE_SIZE];
        self.stream.0.read_exact(&mut data)?;
        self.sync_cursor()?;
        Ok(data)
    }

    /// Read the spare region of a page
    pub fn get_spare(&mut self, page: Page) -> Result<[u8; SPARE_SIZE], Error> {
        trace!("get spare {}", page.0);
        self.file_seek(page.spare_start(), Whence::Set)?;
        let mut spare = [0u8; SPARE_SIZE];
        self.stream.0.read_exact(&mut spare)?;
        self.sync_cursor()?;
        Ok(spare)
    }

    /// Write the data region of a page and its recomputed spare.
    /// Returns the number of bytes written, spare included.
    pub fn set_page(&mut self, page: Page, data: &[u8]) -> Result<usize, Error> {
        check_page(&self.geometry, page)?;
        let data: &[u8; PAGE_SIZE] = data.try_into().map_err(|_| Error::InvalidLength {
            expected: PAGE_SIZE,
            actual: data.len(),
        })?;

        let mut spare = self.get_spare(page)?;
        let ecc = apply_ecc(data, &mut spare);
        trace!("set page {}, ecc {:#09x}", page.0, ecc);

        self.file_seek(page.data_start(), Whence::Set)?;
        let mut written = self.file_write(data)?;
        written += self.file_write(&spare)?;
        Ok(written)
    }

    /// Write the spare region of a page as is, without ECC
    pub fn set_spare(&mut self, page: Page, data: &[u8]) -> Result<usize, Error> {
        check_page(&self.geometry, page)?;
        check_len(SPARE_SIZE, data.len())?;

        trace!("set spare {}", page.0);
        self.file_seek(page.spare_start(), Whence::Set)?;
        self.file_write(data)
    }

    /// Decode the spare of a page as a block descriptor
    pub fn block_header(&mut self, page: Page, layout: Layout) -> Result<BlockHeader, Error> {
        Ok(BlockHeader::new(layout, self.get_spare(page)?))
    }
}
