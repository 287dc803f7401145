use super::*;
use crate::Config;
use assert_matches::assert_matches;

fn engine(bounds_checks: BoundsCheck) -> Engine {
    let mut config = Config::default();
    config.bounds_checks(bounds_checks);
    Engine::new(&config)
}

#[test]
fn reservation_covers_every_wasm32_access() {
    let max_address = u64::from(u32::MAX) + u64::from(u16::MAX);
    assert!(max_address + 4 <= wasm32_reservation_size());
    assert_eq!(wasm32_reservation_size() % WASM_PAGE_SIZE as u64, 0);
}

#[test]
fn heap_memory_grows_zeroed() {
    let mut memory = LinearMemory::new(&engine(BoundsCheck::Explicit), 1, Some(4)).unwrap();
    assert!(!memory.is_reserved());
    assert_eq!(memory.reservation_size(), 0);
    memory.data_mut()[0] = 1;
    assert_eq!(memory.grow(2), Ok(1));
    assert_eq!(memory.size_pages(), 3);
    assert_eq!(memory.byte_len(), 3 * WASM_PAGE_SIZE);
    assert_eq!(memory.data()[0], 1);
    assert!(memory.data()[1..].iter().all(|&byte| byte == 0));
}

#[test]
fn growth_beyond_maximum_fails() {
    for bounds_checks in [BoundsCheck::Explicit, BoundsCheck::Guard] {
        let mut memory = LinearMemory::new(&engine(bounds_checks), 1, Some(2)).unwrap();
        assert_eq!(memory.grow(2), Err(MemoryError::OutOfBoundsGrowth));
        assert_eq!(memory.grow(u32::MAX), Err(MemoryError::OutOfBoundsGrowth));
        assert_eq!(memory.size_pages(), 1);
        assert_eq!(memory.grow(0), Ok(1));
        assert_eq!(memory.grow(1), Ok(1));
        assert_eq!(memory.maximum_pages(), 2);
    }
}

#[test]
fn invalid_limits_are_rejected() {
    let engine = engine(BoundsCheck::Explicit);
    assert_matches!(
        LinearMemory::new(&engine, 3, Some(2)),
        Err(MemoryError::InvalidMemoryType { initial_pages: 3, maximum_pages: 2 })
    );
    assert_matches!(
        LinearMemory::new(&engine, 0, Some(WASM32_MAX_PAGES + 1)),
        Err(MemoryError::InvalidMemoryType { .. })
    );
}

#[cfg(unix)]
#[test]
fn reserved_memory_never_moves() {
    let mut memory = LinearMemory::new(&engine(BoundsCheck::Guard), 1, None).unwrap();
    assert!(memory.is_reserved());
    assert_eq!(
        memory.reservation_size() as u64,
        wasm32_reservation_size()
    );
    let base = memory.base_ptr();
    memory.data_mut()[WASM_PAGE_SIZE - 1] = 0xFF;
    assert_eq!(memory.grow(3), Ok(1));
    assert_eq!(memory.base_ptr(), base);
    assert_eq!(memory.byte_len(), 4 * WASM_PAGE_SIZE);
    assert_eq!(memory.data()[WASM_PAGE_SIZE - 1], 0xFF);
    assert!(memory.data()[WASM_PAGE_SIZE..].iter().all(|&byte| byte == 0));
}

#[cfg(unix)]
#[test]
fn empty_reserved_memory() {
    let mut memory = LinearMemory::new(&engine(BoundsCheck::Guard), 0, None).unwrap();
    assert_eq!(memory.byte_len(), 0);
    assert!(memory.data().is_empty());
    assert_eq!(memory.grow(1), Ok(0));
    assert_eq!(memory.byte_len(), WASM_PAGE_SIZE);
}
