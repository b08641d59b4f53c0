use std::cmp::min;
use std::ops::Index;

use crate::node::NodeHash;

#[derive(Clone)]
struct Entry<T> {
    value: T,
    next: usize,
}

/// Append-only hash-consing table of fixed capacity `2^bits`.
///
/// Equal values always map to the same index. Index `0` is a sentry and never holds a value.
pub struct Table<T> {
    data: Vec<Entry<T>>,
    capacity: usize,

    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table of size `2^bits`.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let capacity = 1 << bits;
        let mut data = Vec::with_capacity(min(capacity, 1 << 16));
        data.push(Entry {
            value: T::default(),
            next: 0,
        });

        let buckets_bits = min(bits, 16);
        let buckets_size = 1 << buckets_bits;

        Self {
            data,
            capacity,
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
        }
    }
}

impl<T> Table<T> {
    /// Get the capacity of the table.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Get the number of stored values.
    pub fn size(&self) -> usize {
        self.data.len() - 1
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        &self.data[index].value
    }

    /// Append a value without hash-consing and return its index.
    pub fn add(&mut self, value: T) -> usize {
        let index = self.data.len();
        if index >= self.capacity {
            panic!("Storage is full");
        }
        self.data.push(Entry { value, next: 0 });
        index
    }
}

impl<T> Table<T>
where
    T: NodeHash + Eq,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Return the index of `value`, inserting it if it is not present yet.
    pub fn put(&mut self, value: T) -> usize {
        let bucket = self.bucket_index(&value);
        let mut index = self.buckets[bucket];

        if index == 0 {
            let i = self.add(value);
            self.buckets[bucket] = i;
            return i;
        }

        loop {
            if self.data[index].value == value {
                return index;
            }
            let next = self.data[index].next;
            if next == 0 {
                let i = self.add(value);
                self.data[index].next = i;
                return i;
            }
            index = next;
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}
