use stockroom_core::LogId;

/// Hands out log IDs in increasing order.
///
/// Owned by the [`AuditLog`](crate::AuditLog); reseeded from persisted logs on load so
/// new IDs never collide with loaded ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogIdAllocator {
    next: LogId,
}

impl Default for LogIdAllocator {
    fn default() -> Self {
        Self {
            next: LogId::from_raw(1),
        }
    }
}

impl LogIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> LogId {
        let id = self.next;
        self.next = id.next();
        id
    }

    /// The ID the next call to `allocate` returns.
    pub fn peek(&self) -> LogId {
        self.next
    }

    /// Make sure every future ID is greater than `max`.
    pub fn seed_after(&mut self, max: LogId) {
        if self.next <= max {
            self.next = max.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_from_one() {
        let mut allocator = LogIdAllocator::new();
        assert_eq!(allocator.allocate(), LogId::from_raw(1));
        assert_eq!(allocator.allocate(), LogId::from_raw(2));
        assert_eq!(allocator.peek(), LogId::from_raw(3));
    }

    #[test]
    fn seeding_never_moves_backwards() {
        let mut allocator = LogIdAllocator::new();
        allocator.seed_after(LogId::from_raw(41));
        assert_eq!(allocator.peek(), LogId::from_raw(42));

        allocator.seed_after(LogId::from_raw(7));
        assert_eq!(allocator.allocate(), LogId::from_raw(42));
    }
}
