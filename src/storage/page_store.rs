use crate::constants::storage::BLOCK_SZ;
use crate::storage::slotted_page::BlockBuf;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A record-number-addressed file of fixed-size blocks.
///
/// Blocks are `BLOCK_SZ` bytes and 1-indexed; block `id` lives at byte
/// offset `(id - 1) * BLOCK_SZ`. One store backs one named relation file
/// under the environment directory.
pub struct PageStore {
    path: PathBuf,
    file: Option<File>,
}

impl PageStore {
    pub fn new(env: &Path, name: &str) -> Self {
        Self {
            path: env.join(name),
            file: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Creates the backing file. Fails if it already exists; the store is
    /// left open.
    pub fn create(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    /// Opens the existing backing file. Fails with NotFound if it was never
    /// created.
    pub fn open(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    pub fn close(&mut self) {
        self.file = None;
    }

    /// Closes and deletes the backing file.
    pub fn remove(&mut self) -> io::Result<()> {
        self.close();
        fs::remove_file(&self.path)
    }

    /// Writes one block at the given id, extending the file when `id` is one
    /// past the current last block.
    pub fn put(&mut self, id: u32, block: &BlockBuf) -> io::Result<()> {
        let file = self.handle()?;
        file.seek(SeekFrom::Start((id as u64 - 1) * BLOCK_SZ as u64))?;
        file.write_all(block)?;
        Ok(())
    }

    /// Reads one block at the given id.
    pub fn get(&mut self, id: u32) -> io::Result<Box<BlockBuf>> {
        let file = self.handle()?;
        file.seek(SeekFrom::Start((id as u64 - 1) * BLOCK_SZ as u64))?;
        let mut block = Box::new([0u8; BLOCK_SZ]);
        file.read_exact(&mut block[..])?;
        Ok(block)
    }

    /// Number of blocks currently in the file.
    pub fn stat(&mut self) -> io::Result<u32> {
        let file = self.handle()?;
        Ok((file.metadata()?.len() / BLOCK_SZ as u64) as u32)
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "page store is not open"))
    }
}
