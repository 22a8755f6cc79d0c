/// Number of recent query IDs remembered by [`DuplicateFilter`].
pub const DEDUP_WINDOW: usize = 128;

/// Ring of the last [`DEDUP_WINDOW`] query IDs seen by the dispatch loop.
///
/// Operating systems retransmit a query on every configured resolver, and the
/// tunnel sees each copy. The filter drops the copies so only one upstream
/// exchange runs per query.
///
/// Not synchronised: the dispatch loop is its only caller.
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    ids: [u16; DEDUP_WINDOW],
    pos: usize,
    filled: usize,
}

impl DuplicateFilter {
    pub fn new() -> Self {
        Self {
            ids: [0; DEDUP_WINDOW],
            pos: 0,
            filled: 0,
        }
    }

    /// Returns true when `id` is in the window. Otherwise records it over the
    /// oldest slot and returns false. A hit does not refresh the entry's age.
    pub fn is_duplicate(&mut self, id: u16) -> bool {
        // Only scan written slots so a zero ID is not a phantom hit.
        if self.ids[..self.filled].contains(&id) {
            return true;
        }
        self.ids[self.pos] = id;
        self.pos = (self.pos + 1) % DEDUP_WINDOW;
        self.filled = (self.filled + 1).min(DEDUP_WINDOW);
        false
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new()
    }
}
