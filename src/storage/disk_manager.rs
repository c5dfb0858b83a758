//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating new pages
//! - Managing the database file header

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use crate::common::config::{FILE_MAGIC, HEADER_SIZE, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌──────────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Header (4KB) │ Page 0  │ Page 1  │  ...    │ Page N  │
/// └──────────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:    0        HEADER_SIZE   +4096   ...
/// ```
/// Page `id` is located at file offset `HEADER_SIZE + id * PAGE_SIZE`. The
/// header itself carries a magic tag, the page size the file was created
/// with, and the number of pages allocated so far.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` is responsible
/// for serializing access to the disk manager.
///
/// # Durability
/// All writes are followed by `fsync()` to ensure durability. This is
/// conservative and will be optimized when WAL group commit is implemented.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file (excluding the header).
    page_count: u32,
}

/// Layout of the fixed file header occupying `[0, HEADER_SIZE)`.
mod header_layout {
    pub const OFFSET_MAGIC: usize = 0;
    pub const MAGIC_LEN: usize = 8;
    pub const OFFSET_PAGE_SIZE: usize = MAGIC_LEN;
    pub const OFFSET_PAGE_COUNT: usize = OFFSET_PAGE_SIZE + 4;
}

impl DiskManager {
    /// Create a new database file and write a fresh header.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut dm = Self { file, page_count: 0 };
        dm.write_header()?;
        debug!("created data file with fresh header");
        Ok(dm)
    }

    /// Open an existing database file, validating its header.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or its
    /// header doesn't carry the expected magic tag / page size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;

        let magic = &header[header_layout::OFFSET_MAGIC..header_layout::OFFSET_MAGIC + header_layout::MAGIC_LEN];
        if magic != FILE_MAGIC {
            return Err(Error::StorageFailure(
                "data file header magic mismatch".to_string(),
            ));
        }

        let page_size = u32::from_le_bytes(
            header[header_layout::OFFSET_PAGE_SIZE..header_layout::OFFSET_PAGE_SIZE + 4]
                .try_into()
                .unwrap(),
        );
        if page_size as usize != PAGE_SIZE {
            return Err(Error::StorageFailure(format!(
                "data file page size {} does not match {}",
                page_size, PAGE_SIZE
            )));
        }

        let page_count = u32::from_le_bytes(
            header[header_layout::OFFSET_PAGE_COUNT..header_layout::OFFSET_PAGE_COUNT + 4]
                .try_into()
                .unwrap(),
        );

        debug!("opened data file with {} pages", page_count);
        Ok(Self { file, page_count })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE as usize];
        header[header_layout::OFFSET_MAGIC..header_layout::OFFSET_MAGIC + header_layout::MAGIC_LEN]
            .copy_from_slice(FILE_MAGIC);
        header[header_layout::OFFSET_PAGE_SIZE..header_layout::OFFSET_PAGE_SIZE + 4]
            .copy_from_slice(&(PAGE_SIZE as u32).to_le_bytes());
        header[header_layout::OFFSET_PAGE_COUNT..header_layout::OFFSET_PAGE_COUNT + 4]
            .copy_from_slice(&self.page_count.to_le_bytes());

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.sync_all()?;
        Ok(())
    }

    fn offset_of(page_id: PageId) -> u64 {
        HEADER_SIZE + (page_id.0 as u64) * (PAGE_SIZE as u64)
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;

        let mut page = Page::new();
        // A short read at EOF (e.g. the file was truncated after allocation
        // but before the first write) returns a zeroed page rather than an
        // error: `read` may fill part of the buffer, and `page` starts
        // zeroed, so a partial read still yields a well-formed empty page.
        let _ = self.file.read(page.as_mut_slice())?;

        trace!("read page {}", page_id);
        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// The page must have been previously allocated with `allocate_page()`.
    ///
    /// # Durability
    /// This method calls `fsync()` after writing to ensure the data is
    /// persisted to disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        trace!("wrote page {}", page_id);
        Ok(())
    }

    /// Allocate a new page on disk.
    ///
    /// Returns the `PageId` of the newly allocated page. The page is
    /// initialized with zeros.
    ///
    /// # Durability
    /// This method extends the file, updates and persists the header's page
    /// count, and calls `fsync()` to ensure the allocation is durable.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.page_count);

        let offset = Self::offset_of(page_id);
        self.file.seek(SeekFrom::Start(offset))?;

        let zeros = [0u8; PAGE_SIZE];
        self.file.write_all(&zeros)?;
        self.file.sync_all()?;

        self.page_count += 1;
        self.write_header()?;

        debug!("allocated page {}", page_id);
        Ok(page_id)
    }

    /// Get the number of pages in the database (excluding the header).
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the database file in bytes, including the
    /// header.
    #[inline]
    pub fn file_size(&self) -> u64 {
        HEADER_SIZE + (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Force the OS to commit all writes to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let dm = DiskManager::create(&path).unwrap();
        assert_eq!(dm.page_count(), 0);
        assert_eq!(dm.file_size(), HEADER_SIZE);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManager::create(&path).unwrap();
        assert!(DiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.db");

        assert!(DiskManager::open(&path).is_err());
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not_ours.db");
        std::fs::write(&path, vec![0u8; HEADER_SIZE as usize]).unwrap();

        assert!(DiskManager::open(&path).is_err());
    }

    #[test]
    fn test_allocate_and_read_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();

        let page_id = dm.allocate_page().unwrap();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(dm.page_count(), 1);

        let page = dm.read_page(page_id).unwrap();
        assert_eq!(page.as_slice()[0], 0);
        assert_eq!(page.as_slice()[4095], 0);
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();
        let page_id = dm.allocate_page().unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[100] = 0xCD;
        page.as_mut_slice()[4095] = 0xEF;

        dm.write_page(page_id, &page).unwrap();

        let read_page = dm.read_page(page_id).unwrap();
        assert_eq!(read_page.as_slice()[0], 0xAB);
        assert_eq!(read_page.as_slice()[100], 0xCD);
        assert_eq!(read_page.as_slice()[4095], 0xEF);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path).unwrap();
            let page_id = dm.allocate_page().unwrap();

            let mut page = Page::new();
            page.as_mut_slice()[0] = 0x42;
            dm.write_page(page_id, &page).unwrap();
        }

        {
            let mut dm = DiskManager::open(&path).unwrap();
            assert_eq!(dm.page_count(), 1);

            let page = dm.read_page(PageId::new(0)).unwrap();
            assert_eq!(page.as_slice()[0], 0x42);
        }
    }

    #[test]
    fn test_multiple_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();

        for i in 0..10 {
            let page_id = dm.allocate_page().unwrap();
            assert_eq!(page_id.0, i);

            let mut page = Page::new();
            page.as_mut_slice()[0] = i as u8;
            dm.write_page(page_id, &page).unwrap();
        }

        assert_eq!(dm.page_count(), 10);
        assert_eq!(dm.file_size(), HEADER_SIZE + 10 * PAGE_SIZE as u64);

        for i in 0..10 {
            let page = dm.read_page(PageId::new(i)).unwrap();
            assert_eq!(page.as_slice()[0], i as u8);
        }
    }

    #[test]
    fn test_read_invalid_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();
        dm.allocate_page().unwrap();

        let result = dm.read_page(PageId::new(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_write_invalid_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let mut dm = DiskManager::create(&path).unwrap();

        let page = Page::new();
        let result = dm.write_page(PageId::new(0), &page);
        assert!(result.is_err());
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.page_count(), 0);
            dm.allocate_page().unwrap();
        }

        {
            let dm = DiskManager::open_or_create(&path).unwrap();
            assert_eq!(dm.page_count(), 1);
        }
    }
}
