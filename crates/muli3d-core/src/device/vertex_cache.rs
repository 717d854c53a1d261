use crate::error::Result;
use crate::limits::VERTEX_CACHE_SIZE;
use crate::shader::VsOutput;

#[derive(Clone, Copy, Debug, Default)]
struct CacheEntry {
    /// Source vertex held by this slot; `None` while the slot is free.
    vertex_index: Option<u32>,
    output: VsOutput,
    fetch_time: u64,
}

/// Post-transform vertex cache for a single draw call.
///
/// Fixed capacity, least-recently-fetched eviction. The fetch counter acting as the LRU clock is
/// reset with the cache at the start of every draw.
#[derive(Debug)]
pub(crate) struct VertexCache {
    entries: [CacheEntry; VERTEX_CACHE_SIZE],
    used: usize,
    clock: u64,
}

impl Default for VertexCache {
    fn default() -> Self {
        Self {
            entries: [CacheEntry::default(); VERTEX_CACHE_SIZE],
            used: 0,
            clock: 0,
        }
    }
}

impl VertexCache {
    pub fn reset(&mut self) {
        for entry in &mut self.entries[..self.used] {
            entry.vertex_index = None;
            entry.fetch_time = 0;
        }
        self.used = 0;
        self.clock = 0;
    }

    /// Returns the slot holding `vertex_index`, running `shade` on a miss.
    ///
    /// `hint` is the slot this caller last used for the same position in its primitive window;
    /// when it still holds `vertex_index` the lookup is skipped. It is updated to the returned slot.
    /// If `shade` fails the slot stays free and the error is returned.
    pub fn fetch(
        &mut self,
        hint: &mut Option<usize>,
        vertex_index: u32,
        shade: impl FnOnce(&mut VsOutput) -> Result<()>,
    ) -> Result<usize> {
        self.clock += 1;

        if let Some(slot) = *hint {
            let entry = &mut self.entries[slot];
            if entry.vertex_index == Some(vertex_index) {
                entry.fetch_time = self.clock;
                return Ok(slot);
            }
        }

        let resident = self.entries[..self.used]
            .iter()
            .position(|e| e.vertex_index == Some(vertex_index));
        if let Some(slot) = resident {
            self.entries[slot].fetch_time = self.clock;
            *hint = Some(slot);
            return Ok(slot);
        }

        let slot = self.allocate();
        let entry = &mut self.entries[slot];
        entry.vertex_index = None;
        entry.fetch_time = 0;
        shade(&mut entry.output)?;
        entry.vertex_index = Some(vertex_index);
        entry.fetch_time = self.clock;
        if slot == self.used {
            self.used += 1;
        }
        *hint = Some(slot);
        Ok(slot)
    }

    /// A free slot if one exists, otherwise the least recently fetched one.
    fn allocate(&self) -> usize {
        if let Some(free) = self.entries[..self.used].iter().position(|e| e.vertex_index.is_none()) {
            return free;
        }
        if self.used < VERTEX_CACHE_SIZE {
            return self.used;
        }
        let mut lru = 0;
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if entry.fetch_time < self.entries[lru].fetch_time {
                lru = i;
            }
        }
        lru
    }

    #[inline]
    pub fn output(&self, slot: usize) -> &VsOutput {
        &self.entries[slot].output
    }

    #[cfg(test)]
    fn resident(&self) -> Vec<u32> {
        self.entries[..self.used].iter().filter_map(|e| e.vertex_index).collect()
    }
}
