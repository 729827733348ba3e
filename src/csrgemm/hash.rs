//! # Concurrent hash tables for SpGEMM row accumulation
//!
//! Each output row of C is accumulated in an open-addressing table keyed by
//! column index. Keys and values live in parallel arrays; a slot is claimed
//! with a compare-exchange on the key, and values are added with a separate
//! atomic add, so concurrent lanes never lose an update.
//!
//! - Capacity is a power of two; the hash is `(key * 79) & (capacity - 1)`
//!   with linear probing.
//! - The sentinel for an empty slot is the number of output columns, so a
//!   slot is valid iff `key < sentinel`.

use std::sync::atomic::{AtomicI32, Ordering};

use aligned_vec::AVec;

use crate::constants::{CSRGEMM_HASHVAL, SHARED_MEMORY_ALIGNMENT};
use crate::device::reduce::block_scan_inclusive_sum;
use crate::device::{AtomicScalar, Scalar};

/// Key-only table, used by the symbolic pass to count distinct columns
pub struct HashTable {
    keys: AVec<AtomicI32>,
    mask: usize,
    empty: i32,
}

impl HashTable {
    /// Creates a table of `capacity` slots (a power of two) with sentinel `empty`
    pub fn new(capacity: usize, empty: i32) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "hash table capacity {} is not a power of two",
            capacity
        );
        Self {
            keys: AVec::from_iter(
                SHARED_MEMORY_ALIGNMENT,
                (0..capacity).map(|_| AtomicI32::new(empty)),
            ),
            mask: capacity - 1,
            empty,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Sentinel marking an empty slot
    pub fn empty(&self) -> i32 {
        self.empty
    }

    /// Marks every slot empty
    pub fn reset(&self) {
        for key in self.keys.iter() {
            key.store(self.empty, Ordering::Relaxed);
        }
    }

    /// Finds or claims the slot of `key`
    ///
    /// Returns the slot and whether this call inserted the key.
    ///
    /// # Panics
    ///
    /// Panics if the table is full and does not contain `key`.
    fn claim(&self, key: i32) -> (usize, bool) {
        let mut slot = (key.wrapping_mul(CSRGEMM_HASHVAL) as u32 as usize) & self.mask;

        for _ in 0..=self.mask {
            let current = self.keys[slot].load(Ordering::Acquire);
            if current == key {
                return (slot, false);
            }
            if current == self.empty {
                match self.keys[slot].compare_exchange(
                    self.empty,
                    key,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return (slot, true),
                    Err(winner) if winner == key => return (slot, false),
                    // Another key won the slot; keep probing.
                    Err(_) => {}
                }
            }
            slot = (slot + 1) & self.mask;
        }

        panic!(
            "hash table of capacity {} overflowed while inserting {}",
            self.capacity(),
            key
        );
    }

    /// Inserts `key`; returns `true` exactly once per distinct key
    pub fn insert_key(&self, key: i32) -> bool {
        self.claim(key).1
    }

    /// Key stored in `slot`
    pub fn key(&self, slot: usize) -> i32 {
        self.keys[slot].load(Ordering::Relaxed)
    }

    /// Number of valid keys strictly smaller than `key` among the first `len` slots
    pub fn rank(&self, key: i32, len: usize) -> usize {
        self.keys[..len]
            .iter()
            .filter(|k| k.load(Ordering::Relaxed) < key)
            .count()
    }
}

/// Key/value table, used by the numeric pass to accumulate a row of C
pub struct PairTable<T: Scalar> {
    table: HashTable,
    data: AVec<T::Atomic>,
}

impl<T: Scalar> PairTable<T> {
    /// Creates a table of `capacity` slots (a power of two) with sentinel `empty`
    pub fn new(capacity: usize, empty: i32) -> Self {
        Self {
            table: HashTable::new(capacity, empty),
            data: AVec::from_iter(
                SHARED_MEMORY_ALIGNMENT,
                (0..capacity).map(|_| T::Atomic::new(T::zero())),
            ),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Marks every slot empty and zeroes the values
    pub fn reset(&self) {
        self.table.reset();
        for v in self.data.iter() {
            v.store(T::zero(), Ordering::Relaxed);
        }
    }

    /// Adds `value` to the entry of `key`, inserting the key if needed
    ///
    /// The key is claimed first, then the value is added atomically.
    pub fn insert_pair(&self, key: i32, value: T) {
        let (slot, _) = self.table.claim(key);
        self.data[slot].fetch_add(value, Ordering::Relaxed);
    }

    /// Entry stored in `slot`; the key equals the sentinel for an empty slot
    pub fn entry(&self, slot: usize) -> (i32, T) {
        (
            self.table.key(slot),
            self.data[slot].load(Ordering::Relaxed),
        )
    }

    /// Whether `slot` holds a key
    pub fn is_valid(&self, slot: usize) -> bool {
        self.table.key(slot) < self.table.empty()
    }

    /// See [`HashTable::rank`]
    pub fn rank(&self, key: i32, len: usize) -> usize {
        self.table.rank(key, len)
    }

    /// Moves all valid entries to the front of the table
    ///
    /// Processes the table in chunks of `block` slots; an inclusive scan over
    /// the valid flags of a chunk gives every entry its destination. Slots
    /// past the returned count are left empty.
    ///
    /// # Returns
    ///
    /// The number of valid entries.
    pub fn compress(&self, block: usize) -> usize {
        let capacity = self.capacity();
        let empty = self.table.empty();
        let mut flags = vec![0usize; block];
        let mut offset = 0;

        for chunk in (0..capacity).step_by(block) {
            let width = block.min(capacity - chunk);
            let flags = &mut flags[..width];
            for (tid, flag) in flags.iter_mut().enumerate() {
                *flag = self.is_valid(chunk + tid) as usize;
            }
            block_scan_inclusive_sum(flags);

            for tid in 0..width {
                let slot = chunk + tid;
                if !self.is_valid(slot) {
                    continue;
                }
                // Destinations never pass the source slot.
                let dest = offset + flags[tid] - 1;
                if dest != slot {
                    let (key, value) = self.entry(slot);
                    self.table.keys[dest].store(key, Ordering::Relaxed);
                    self.data[dest].store(value, Ordering::Relaxed);
                    self.table.keys[slot].store(empty, Ordering::Relaxed);
                    self.data[slot].store(T::zero(), Ordering::Relaxed);
                }
            }

            offset += flags[width - 1];
        }

        offset
    }
}
