use core::ops::Range;

use crate::{PAGE_SIZE, SPARE_SIZE, STRIDE};

const PAGE: i64 = PAGE_SIZE as i64;
const SPARE: i64 = SPARE_SIZE as i64;
const STRIDE_LEN: i64 = STRIDE as i64;

/// A page number, starting at 1 for the first page of the image
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Page(pub u32);

impl Page {
    /// File offset of the data region of the page.
    pub fn data_start(self) -> i64 {
        (self.0 as i64 - 1) * STRIDE_LEN
    }

    /// File offset of the spare region of the page.
    ///
    /// The first page has its spare right after its data, at offset 512. For
    /// every other page this is the 16 bytes right before its data region.
    pub fn spare_start(self) -> i64 {
        if self.0 == 1 {
            PAGE
        } else {
            (self.0 as i64 - 1) * STRIDE_LEN - SPARE
        }
    }
}

impl From<u32> for Page {
    fn from(num: u32) -> Page {
        Page(num)
    }
}

impl From<Page> for u32 {
    fn from(page: Page) -> u32 {
        page.0
    }
}

/// Page holding a file offset
pub fn page_of_file_offset(offset: i64) -> Page {
    Page((offset.div_euclid(STRIDE_LEN) + 1) as u32)
}

/// Page holding a flash offset
pub fn page_of_flash_offset(offset: i64) -> Page {
    Page((offset.div_euclid(PAGE) + 1) as u32)
}

/// Position of a flash offset inside its page
pub fn flash_page_offset(offset: i64) -> usize {
    offset.rem_euclid(PAGE) as usize
}

/// Split the flash range `[offset, offset + len)` into the pages it touches,
/// with the byte range of each page covered by it. Empty when `len` is 0.
pub fn page_spans(offset: i64, len: usize) -> impl Iterator<Item = (Page, Range<usize>)> {
    let end = offset + len as i64;
    let first = page_of_flash_offset(offset);
    let last = page_of_flash_offset(end - 1);
    let head = flash_page_offset(offset);
    let tail = flash_page_offset(end - 1) + 1;

    (first.0..=last.0).filter(move |_| len > 0).map(move |n| {
        let from = if n == first.0 { head } else { 0 };
        let to = if n == last.0 { tail } else { PAGE_SIZE };
        (Page(n), from..to)
    })
}

/// Sizes of an image, measured once when it is opened
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// Total size of the image, spare bytes included
    pub file_size: i64,
    /// Number of complete pages, a trailing partial stride is ignored
    pub num_pages: u32,
    /// Size of the flash address space, spare bytes excluded
    pub flash_size: i64,
}

impl Geometry {
    pub fn new(file_size: u64) -> Self {
        let num_pages = file_size / STRIDE as u64;
        Geometry {
            file_size: file_size as i64,
            num_pages: num_pages as u32,
            flash_size: num_pages as i64 * PAGE,
        }
    }

    /// Convert a file offset to a flash offset. Negative offsets count back from `flash_size`.
    pub fn file_to_flash(&self, offset: i64) -> i64 {
        let offset = if offset < 0 { self.flash_size + offset } else { offset };
        offset.div_euclid(STRIDE_LEN) * PAGE + offset.rem_euclid(STRIDE_LEN)
    }

    /// Convert a flash offset to a file offset. Negative offsets count back from `file_size`.
    pub fn flash_to_file(&self, offset: i64) -> i64 {
        let offset = if offset < 0 { self.file_size + offset } else { offset };
        offset.div_euclid(PAGE) * STRIDE_LEN + offset.rem_euclid(PAGE)
    }

    /// [`Geometry::flash_to_file`], returning `None` when the file offset overflows `i64`
    pub fn checked_flash_to_file(&self, offset: i64) -> Option<i64> {
        let offset = if offset < 0 { self.file_size + offset } else { offset };
        offset
            .div_euclid(PAGE)
            .checked_mul(STRIDE_LEN)?
            .checked_add(offset.rem_euclid(PAGE))
    }

    /// Check if the page exists in the image
    pub fn contains(&self, page: Page) -> bool {
        page.0 >= 1 && page.0 <= self.num_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUR_PAGES: u64 = 4 * STRIDE as u64;

    #[test]
    fn geometry_truncates_partial_stride() {
        let geo = Geometry::new(FOUR_PAGES + 100);
        assert_eq!(geo.num_pages, 4);
        assert_eq!(geo.flash_size, 2048);
        assert_eq!(geo.file_size, 2212);
    }

    #[test]
    fn flash_round_trips_through_file() {
        let geo = Geometry::new(FOUR_PAGES);
        for o in 0..geo.flash_size {
            assert_eq!(geo.file_to_flash(geo.flash_to_file(o)), o);
        }
    }

    #[test]
    fn file_data_bytes_round_trip_through_flash() {
        let geo = Geometry::new(FOUR_PAGES);
        for o in (0..geo.file_size).filter(|o| o % STRIDE_LEN < PAGE) {
            assert_eq!(geo.flash_to_file(geo.file_to_flash(o)), o);
        }
    }

    #[test]
    fn negative_offsets_use_different_anchors() {
        let geo = Geometry::new(FOUR_PAGES);
        // file_to_flash anchors on flash_size (2048), flash_to_file on file_size (2112)
        assert_eq!(geo.file_to_flash(-1), geo.file_to_flash(2047));
        assert_eq!(geo.flash_to_file(-1), geo.flash_to_file(2111));
    }

    #[test]
    fn checked_translation_reports_overflow() {
        let geo = Geometry::new(FOUR_PAGES);
        assert_eq!(geo.checked_flash_to_file(1022), Some(geo.flash_to_file(1022)));
        assert_eq!(geo.checked_flash_to_file(-1), Some(geo.flash_to_file(-1)));
        assert_eq!(geo.checked_flash_to_file(i64::MAX), None);
    }

    #[test]
    fn pages_are_one_stride_apart() {
        for n in 1..64 {
            assert_eq!(Page(n + 1).data_start() - Page(n).data_start(), STRIDE_LEN);
        }
    }

    #[test]
    fn spare_offsets() {
        assert_eq!(Page(1).spare_start(), 512);
        assert_eq!(Page(2).spare_start(), 512);
        assert_eq!(Page(3).spare_start(), 1040);
        assert_eq!(Page(3).data_start(), 1056);
    }

    #[test]
    fn pages_of_offsets() {
        assert_eq!(page_of_file_offset(0), Page(1));
        assert_eq!(page_of_file_offset(527), Page(1));
        assert_eq!(page_of_file_offset(528), Page(2));
        assert_eq!(page_of_flash_offset(511), Page(1));
        assert_eq!(page_of_flash_offset(1024), Page(3));
        assert_eq!(flash_page_offset(1022), 510);
    }

    #[test]
    fn spans_within_one_page() {
        let spans: Vec<_> = page_spans(10, 20).collect();
        assert_eq!(spans, vec![(Page(1), 10..30)]);
    }

    #[test]
    fn spans_across_pages() {
        let spans: Vec<_> = page_spans(1022, 4).collect();
        assert_eq!(spans, vec![(Page(2), 510..512), (Page(3), 0..2)]);

        let spans: Vec<_> = page_spans(500, 1100).collect();
        assert_eq!(
            spans,
            vec![(Page(1), 500..512), (Page(2), 0..512), (Page(3), 0..512), (Page(4), 0..64)]
        );
    }

    #[test]
    fn spans_ending_on_a_boundary() {
        let spans: Vec<_> = page_spans(512, 512).collect();
        assert_eq!(spans, vec![(Page(2), 0..512)]);
        assert_eq!(page_spans(100, 0).count(), 0);
    }
}
