/*!
 * Address-Ordered Free List
 * Backing store for the simulated capability heap
 */

use crate::core::types::{Address, Size};
use std::collections::BTreeMap;

/// Free block for address recycling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct FreeBlock {
    pub address: Address,
    pub size: Size,
}

impl FreeBlock {
    #[inline]
    fn end(&self) -> Address {
        self.address + self.size
    }
}

/// Free ranges keyed by start address
///
/// Adjacent ranges are merged on insert, so two entries never touch.
#[derive(Debug, Default)]
pub(super) struct FreeList {
    blocks: BTreeMap<Address, Size>,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a range to the list, coalescing with both neighbours
    pub fn insert(&mut self, block: FreeBlock) {
        if block.size == 0 {
            return;
        }

        let mut merged = block;

        if let Some((&prev_addr, &prev_size)) = self.blocks.range(..block.address).next_back() {
            if prev_addr + prev_size == block.address {
                self.blocks.remove(&prev_addr);
                merged.address = prev_addr;
                merged.size += prev_size;
            }
        }

        if let Some(&next_size) = self.blocks.get(&merged.end()) {
            self.blocks.remove(&merged.end());
            merged.size += next_size;
        }

        self.blocks.insert(merged.address, merged.size);
    }

    /// Take `size` bytes from the smallest block that fits
    ///
    /// Ties go to the lowest address. The remainder of a split block stays
    /// in the list.
    pub fn take_best_fit(&mut self, size: Size) -> Option<Address> {
        let mut best: Option<(Address, Size)> = None;
        for (&address, &block_size) in &self.blocks {
            if block_size < size {
                continue;
            }
            match best {
                Some((_, best_size)) if best_size <= block_size => {}
                _ => best = Some((address, block_size)),
            }
        }
        let (address, block_size) = best?;

        self.blocks.remove(&address);
        if block_size > size {
            self.blocks.insert(address + size, block_size - size);
        }
        Some(address)
    }

    /// Whether `[address, address + size)` overlaps any free range
    pub fn overlaps(&self, address: Address, size: Size) -> bool {
        let end = address + size;
        if let Some((&a, &s)) = self.blocks.range(..end).next_back() {
            return a + s > address;
        }
        false
    }

    pub fn total(&self) -> Size {
        self.blocks.values().sum()
    }

    pub fn largest(&self) -> Size {
        self.blocks.values().copied().max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = FreeBlock> + '_ {
        self.blocks
            .iter()
            .map(|(&address, &size)| FreeBlock { address, size })
    }
}
