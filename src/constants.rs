pub mod storage {
    /// Fixed size of every block handled by the page store.
    pub const BLOCK_SZ: usize = 4096;
}
