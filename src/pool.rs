//! Bounded free-lists of reusable objects.
use core::fmt;

use crossbeam::queue::ArrayQueue;

/// A thread-safe free-list of boxed `T`.
///
/// `get_or_else` pops an idle object or builds a fresh one; `put` pushes one
/// back. When the list already holds `capacity` objects, `put` drops the
/// object instead. Neither operation blocks.
pub(crate) struct Pool<T> {
    idle: ArrayQueue<Box<T>>,
}

impl<T> Pool<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            idle: ArrayQueue::new(capacity.max(1)),
        }
    }

    pub(crate) fn get_or_else(&self, make: impl FnOnce() -> T) -> Box<T> {
        self.idle.pop().unwrap_or_else(|| Box::new(make()))
    }

    /// Returns `false` if the pool was full and `item` was dropped.
    pub(crate) fn put(&self, item: Box<T>) -> bool {
        self.idle.push(item).is_ok()
    }

    pub(crate) fn idle(&self) -> usize {
        self.idle.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.idle.capacity()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_returned_objects() {
        let pool = Pool::new(4);
        let first = pool.get_or_else(|| 1u32);
        let addr = &*first as *const u32;
        assert!(pool.put(first));
        assert_eq!(pool.idle(), 1);

        let again = pool.get_or_else(|| 2u32);
        assert_eq!(&*again as *const u32, addr);
        assert_eq!(*again, 1);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn full_pool_drops_objects() {
        let pool = Pool::new(1);
        assert!(pool.put(Box::new(1u8)));
        assert!(!pool.put(Box::new(2u8)));
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let pool: Pool<u8> = Pool::new(0);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn debug_reports_occupancy() {
        let pool = Pool::new(3);
        assert!(pool.put(Box::new('x')));
        assert_eq!(format!("{pool:?}"), "Pool { idle: 1, capacity: 3 }");
    }
}
