//! Free List Arena
//!
//! A pure logical structure over one pre-reserved byte buffer. It holds
//! plain-old-data payloads of the light cache, so per-frame cache churn never
//! touches the general purpose heap.
//!
//! Free space is kept as a list of ranges sorted by offset. Allocation is
//! first-fit with splitting, freeing coalesces with both neighbours.

/// Allocation granularity and alignment in bytes.
pub const ARENA_ALIGNMENT: usize = 16;

/// A live allocation inside a [`FreeListAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaBlock {
    offset: usize,
    size: usize,
}

impl ArenaBlock {
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reserved size, a multiple of [`ARENA_ALIGNMENT`].
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Debug, Clone, Copy)]
struct FreeRange {
    offset: usize,
    size: usize,
}

impl FreeRange {
    fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// First-fit free list allocator over a fixed byte arena.
pub struct FreeListAllocator {
    memory: Vec<u8>,
    free: Vec<FreeRange>,
    used: usize,
}

impl FreeListAllocator {
    /// Reserves `size` bytes, rounded down to the alignment.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size - size % ARENA_ALIGNMENT;
        let mut allocator = Self {
            memory: vec![0; size],
            free: Vec::new(),
            used: 0,
        };
        allocator.reset();
        allocator
    }

    /// Returns `None` when no free range is large enough.
    pub fn allocate(&mut self, size: usize) -> Option<ArenaBlock> {
        let size = size.max(1).next_multiple_of(ARENA_ALIGNMENT);
        let index = self.free.iter().position(|range| range.size >= size)?;

        let range = &mut self.free[index];
        let block = ArenaBlock {
            offset: range.offset,
            size,
        };
        if range.size == size {
            self.free.remove(index);
        } else {
            range.offset += size;
            range.size -= size;
        }

        self.used += size;
        Some(block)
    }

    /// Returns a block to the free list.
    ///
    /// # Panics
    ///
    /// Panics if the block overlaps free space, which means it was freed twice
    /// or never came from this arena.
    pub fn free(&mut self, block: ArenaBlock) {
        assert!(
            block.offset + block.size <= self.memory.len(),
            "Arena block {block:?} outside of {} byte arena",
            self.memory.len()
        );

        let index = self.free.partition_point(|range| range.offset < block.offset);
        let prev_end = index.checked_sub(1).map_or(0, |i| self.free[i].end());
        let next_start = self.free.get(index).map_or(self.memory.len(), |r| r.offset);
        assert!(
            prev_end <= block.offset && block.offset + block.size <= next_start,
            "Arena block {block:?} freed twice"
        );

        self.used -= block.size;

        let merges_prev = index > 0 && prev_end == block.offset;
        let merges_next = index < self.free.len() && block.offset + block.size == next_start;

        match (merges_prev, merges_next) {
            (true, true) => {
                let next = self.free.remove(index);
                self.free[index - 1].size += block.size + next.size;
            }
            (true, false) => self.free[index - 1].size += block.size,
            (false, true) => {
                let next = &mut self.free[index];
                next.offset = block.offset;
                next.size += block.size;
            }
            (false, false) => self.free.insert(
                index,
                FreeRange {
                    offset: block.offset,
                    size: block.size,
                },
            ),
        }
    }

    /// Frees everything. Outstanding blocks become invalid.
    pub fn reset(&mut self) {
        self.free.clear();
        if !self.memory.is_empty() {
            self.free.push(FreeRange {
                offset: 0,
                size: self.memory.len(),
            });
        }
        self.used = 0;
    }

    /// Stores `value` at the start of `block`.
    pub fn write<T: bytemuck::Pod>(&mut self, block: ArenaBlock, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        assert!(
            bytes.len() <= block.size,
            "{} byte value does not fit arena block {block:?}",
            bytes.len()
        );
        self.memory[block.offset..block.offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Reads a value previously stored with [`Self::write`].
    #[must_use]
    pub fn read<T: bytemuck::Pod>(&self, block: ArenaBlock) -> T {
        let len = std::mem::size_of::<T>();
        assert!(len <= block.size, "{len} byte read from arena block {block:?}");
        bytemuck::pod_read_unaligned(&self.memory[block.offset..block.offset + len])
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// Bytes handed out and not yet freed.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Number of disjoint free ranges.
    #[must_use]
    pub fn fragments(&self) -> usize {
        self.free.len()
    }
}
