//! 2-element LRU cache for chunk access during light propagation.

use steel_utils::ChunkPos;

const CACHE_SIZE: usize = 2;

/// The two most recently looked-up chunks.
///
/// Propagation touches the same one or two chunks over and over, so this avoids
/// going back to the chunk source for nearly every block. Misses are cached as
/// well: an unloaded chunk stays unloaded for the rest of the batch.
pub struct ChunkCache<C> {
    last_chunk_pos: [Option<i64>; CACHE_SIZE],
    last_chunk: [Option<C>; CACHE_SIZE],
    /// Higher is more recent.
    access_counter: [u64; CACHE_SIZE],
    global_counter: u64,
}

impl<C: Clone> ChunkCache<C> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_chunk_pos: [None; CACHE_SIZE],
            last_chunk: [None, None],
            access_counter: [0; CACHE_SIZE],
            global_counter: 0,
        }
    }

    /// Returns the cached chunk, or runs `load` and remembers its result.
    pub fn get_or_load(&mut self, pos: ChunkPos, load: impl FnOnce(ChunkPos) -> Option<C>) -> Option<C> {
        let key = pos.as_long();
        self.global_counter += 1;

        for i in 0..CACHE_SIZE {
            if self.last_chunk_pos[i] == Some(key) {
                self.access_counter[i] = self.global_counter;
                return self.last_chunk[i].clone();
            }
        }

        let chunk = load(pos);

        let mut lru_idx = 0;
        for i in 1..CACHE_SIZE {
            if self.access_counter[i] < self.access_counter[lru_idx] {
                lru_idx = i;
            }
        }

        self.last_chunk_pos[lru_idx] = Some(key);
        self.last_chunk[lru_idx] = chunk.clone();
        self.access_counter[lru_idx] = self.global_counter;
        chunk
    }

    /// Forgets every entry. Called at the end of each batch so newly loaded chunks are seen.
    pub fn clear(&mut self) {
        self.last_chunk_pos = [None; CACHE_SIZE];
        self.last_chunk = [None, None];
        self.access_counter = [0; CACHE_SIZE];
        self.global_counter = 0;
    }
}

impl<C: Clone> Default for ChunkCache<C> {
    fn default() -> Self {
        Self::new()
    }
}
