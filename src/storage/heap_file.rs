use crate::constants::storage::BLOCK_SZ;
use crate::error::RelationError;
use crate::storage::page_store::PageStore;
use crate::storage::slotted_page::SlottedPage;
use std::path::Path;

/// A named, unordered container of slotted pages with dense 1-based block
/// ids, backed by one page-store file.
pub struct HeapFile {
    name: String,
    store: PageStore,
    last: u32,
}

impl HeapFile {
    pub fn new(env: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            store: PageStore::new(env, name),
            last: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Creates the backing file (exclusive) and allocates block 1, empty.
    pub fn create(&mut self) -> Result<(), RelationError> {
        self.store.create()?;
        self.last = 0;
        let page = self.get_new()?;
        self.put(&page)?;
        Ok(())
    }

    pub fn open(&mut self) -> Result<(), RelationError> {
        self.store.open()?;
        self.last = self.store.stat()?;
        Ok(())
    }

    pub fn close(&mut self) {
        self.store.close();
    }

    /// Closes and removes the backing file.
    pub fn destroy(&mut self) -> Result<(), RelationError> {
        self.store.remove()?;
        self.last = 0;
        Ok(())
    }

    /// Allocates the next block: zeroes go to disk first so the store owns
    /// the buffer, then the block is read back and wrapped as a fresh page.
    pub fn get_new(&mut self) -> Result<SlottedPage, RelationError> {
        self.last += 1;
        let block_id = self.last;
        self.store.put(block_id, &[0u8; BLOCK_SZ])?;
        let block = self.store.get(block_id)?;
        Ok(SlottedPage::new(block, block_id, true))
    }

    pub fn get(&mut self, block_id: u32) -> Result<SlottedPage, RelationError> {
        let block = self.store.get(block_id)?;
        Ok(SlottedPage::new(block, block_id, false))
    }

    /// Writes a page's buffer back at its block id.
    pub fn put(&mut self, page: &SlottedPage) -> Result<(), RelationError> {
        self.store.put(page.block_id(), page.data())?;
        Ok(())
    }

    pub fn block_ids(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.last
    }

    pub fn get_last_block_id(&self) -> u32 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_allocates_block_one() {
        let dir = TempDir::new().unwrap();
        let mut file = HeapFile::new(dir.path(), "heap_file_u");
        file.create().unwrap();

        assert_eq!(file.get_last_block_id(), 1);
        let page = file.get(1).unwrap();
        assert!(page.ids().is_empty());
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        let mut file = HeapFile::new(dir.path(), "heap_file_u");
        file.create().unwrap();

        let mut duplicate = HeapFile::new(dir.path(), "heap_file_u");
        assert!(duplicate.create().is_err());
    }

    #[test]
    fn test_get_new_numbers_blocks_densely() {
        let dir = TempDir::new().unwrap();
        let mut file = HeapFile::new(dir.path(), "heap_file_u");
        file.create().unwrap();

        let second = file.get_new().unwrap();
        assert_eq!(second.block_id(), 2);
        let third = file.get_new().unwrap();
        assert_eq!(third.block_id(), 3);
        assert_eq!(file.block_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_get_put_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut file = HeapFile::new(dir.path(), "heap_file_u");
        file.create().unwrap();

        let mut page = file.get_new().unwrap();
        page.add(b"HelloWorld").unwrap();
        file.put(&page).unwrap();

        let reread = file.get(2).unwrap();
        assert_eq!(reread.get(1), Some(&b"HelloWorld"[..]));
    }

    #[test]
    fn test_open_restores_last() {
        let dir = TempDir::new().unwrap();
        {
            let mut file = HeapFile::new(dir.path(), "heap_file_u");
            file.create().unwrap();
            file.get_new().unwrap();
            file.get_new().unwrap();
            file.close();
        }
        let mut file = HeapFile::new(dir.path(), "heap_file_u");
        file.open().unwrap();
        assert_eq!(file.get_last_block_id(), 3);
    }

    #[test]
    fn test_destroy_removes_backing_file() {
        let dir = TempDir::new().unwrap();
        let mut file = HeapFile::new(dir.path(), "heap_file_u");
        file.create().unwrap();
        file.destroy().unwrap();

        let mut reopened = HeapFile::new(dir.path(), "heap_file_u");
        assert!(reopened.open().is_err());
    }
}
