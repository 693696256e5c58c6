//! Best-fit contiguous memory allocator with eager coalescing.
//!
//! The arena is a fixed-capacity span of simulated megabytes managed as an
//! ordered list of `FREE`/`ALLOCATED` blocks (see [`procman_list::List`]).
//! `allocate` always returns `None` on failure rather than an error — running
//! out of a suitable free block is the normal "admission must wait" signal,
//! not a fault.

use std::collections::HashMap;

use procman_list::List;

/// Default total capacity of the simulated arena, in megabytes.
pub const DEFAULT_CAPACITY: u16 = 2048;
/// Hard cap on total capacity, bounded by the 16-bit location/size fields.
pub const MAX_CAPACITY: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Free,
    Allocated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub status: Status,
    pub location: u16,
    pub size: u16,
}

/// A single contiguous arena of `capacity` megabytes.
pub struct Allocator {
    blocks: HashMap<BlockId, Block>,
    order: List<BlockId>,
    next_id: u64,
    capacity: u16,
}

impl Allocator {
    /// Create a fresh allocator with one `FREE` block spanning all of
    /// `capacity` MB.
    pub fn new(capacity: u16) -> Self {
        let mut order = List::new();
        let mut blocks = HashMap::new();
        let id = BlockId(0);
        order.append(id);
        blocks.insert(
            id,
            Block {
                status: Status::Free,
                location: 0,
                size: capacity,
            },
        );
        Allocator {
            blocks,
            order,
            next_id: 1,
            capacity,
        }
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[&id]
    }

    /// Blocks in ascending-location (list) order.
    pub fn blocks_in_order(&self) -> Vec<(BlockId, Block)> {
        self.order.iter().map(|id| (id, self.blocks[&id])).collect()
    }

    fn fresh_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Best-fit allocation: the smallest `FREE` block that is `>= size`,
    /// ties broken by smallest `location` (i.e. first in list order, since
    /// blocks are kept in ascending-location order — invariant #1).
    pub fn allocate(&mut self, size: u16) -> Option<BlockId> {
        let mut best: Option<BlockId> = None;
        for id in self.order.iter() {
            let block = self.blocks[&id];
            if block.status == Status::Free && block.size >= size {
                let better = match best {
                    None => true,
                    Some(b) => block.size < self.blocks[&b].size,
                };
                if better {
                    best = Some(id);
                }
            }
        }

        let best_id = best?;
        let best_block = self.blocks[&best_id];
        debug_assert!(best_block.size >= size);

        if best_block.size == size {
            self.blocks.get_mut(&best_id).unwrap().status = Status::Allocated;
            Some(best_id)
        } else {
            let new_id = self.fresh_id();
            let new_block = Block {
                status: Status::Allocated,
                location: best_block.location,
                size,
            };
            let shrunk = self.blocks.get_mut(&best_id).unwrap();
            shrunk.location += size;
            shrunk.size -= size;
            self.blocks.insert(new_id, new_block);
            self.order.insert_before(best_id, new_id);
            Some(new_id)
        }
    }

    /// Free `id`. No-op if it's already `FREE`. Coalesces eagerly with the
    /// next block, then the (possibly already-merged) block with the
    /// previous one — this order is load-bearing, not incidental: both
    /// adjacency invariants must hold after either merge step.
    pub fn free(&mut self, id: BlockId) {
        let Some(block) = self.blocks.get_mut(&id) else {
            return;
        };
        if block.status == Status::Free {
            return;
        }
        block.status = Status::Free;

        if let Some(next_id) = self.order.next_of(id) {
            if self.blocks[&next_id].status == Status::Free {
                let next_size = self.blocks[&next_id].size;
                self.blocks.get_mut(&id).unwrap().size += next_size;
                self.order.remove(next_id);
                self.blocks.remove(&next_id);
            }
        }

        if let Some(prev_id) = self.order.prev_of(id) {
            if self.blocks[&prev_id].status == Status::Free {
                let cur_size = self.blocks[&id].size;
                self.blocks.get_mut(&prev_id).unwrap().size += cur_size;
                self.order.remove(id);
                self.blocks.remove(&id);
            }
        }
    }

    /// Sum of all block sizes — must always equal `capacity` (invariant #4).
    pub fn total_size(&self) -> u32 {
        self.blocks.values().map(|b| b.size as u32).sum()
    }

    /// No two adjacent `FREE` blocks, and locations/sizes are contiguous
    /// (invariants #1-#3). Intended for tests and debug assertions.
    pub fn check_invariants(&self) {
        let blocks = self.blocks_in_order();
        assert_eq!(
            blocks.iter().map(|(_, b)| b.size as u32).sum::<u32>(),
            self.capacity as u32
        );
        for w in blocks.windows(2) {
            let (_, a) = w[0];
            let (_, b) = w[1];
            assert_eq!(a.location + a.size, b.location);
            assert!(!(a.status == Status::Free && b.status == Status::Free));
        }
    }
}
