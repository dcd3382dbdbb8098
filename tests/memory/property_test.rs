/*!
 * Property Tests
 * Ledger consistency and alignment over arbitrary operation sequences
 */

use crate::support::manager_with;
use proptest::prelude::*;
use psram_manager::PoolKind;

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    Deallocate(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..4096).prop_map(Op::Allocate),
        any::<usize>().prop_map(Op::Deallocate),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn block_count_matches_successful_operations(ops in prop::collection::vec(op(), 1..64)) {
        let manager = manager_with(64 * 1024, 4 * 1024);
        let mut live = Vec::new();
        let mut allocated = 0usize;
        let mut freed = 0usize;

        for op in ops {
            match op {
                Op::Allocate(size) => {
                    if let Ok(addr) = manager.allocate(size, "prop", PoolKind::General) {
                        live.push(addr);
                        allocated += 1;
                    }
                }
                Op::Deallocate(pick) => {
                    if !live.is_empty() {
                        let addr = live.swap_remove(pick % live.len());
                        prop_assert!(manager.deallocate(addr).is_ok());
                        freed += 1;
                        prop_assert!(manager.deallocate(addr).is_err());
                    }
                }
            }
            prop_assert_eq!(manager.block_count(), allocated - freed);
        }

        let stats = manager.statistics().unwrap();
        prop_assert_eq!(stats.allocation_count as usize, allocated);
        prop_assert_eq!(stats.free_count as usize, freed);
        prop_assert!(manager.validate_heap());
    }

    #[test]
    fn aligned_handles_are_multiples_of_alignment(
        requests in prop::collection::vec((1usize..2048, 0u32..9), 1..32)
    ) {
        let manager = manager_with(256 * 1024, 4 * 1024);
        for (size, shift) in requests {
            let alignment = 1usize << shift;
            if let Ok(addr) = manager.allocate_aligned(size, alignment, PoolKind::Graphics) {
                prop_assert_eq!(addr % alignment, 0);
                let info = manager.block_info(addr).unwrap();
                prop_assert!(info.base_address() + info.size >= addr + size);
            }
        }
        prop_assert!(manager.validate_heap());
    }
}
