use parking_lot::RwLock;

/// A bounded circular buffer that drops the oldest entry on overflow.
///
/// The buffer is internally serialised: mutating operations take the write
/// lock, read-only operations take the read lock, so it is safe to share
/// between concurrent pushers and readers. Readers always observe a
/// consistent snapshot of the push order.
#[derive(Debug)]
pub struct RingBuffer<T> {
    inner: RwLock<Ring<T>>,
}

#[derive(Debug)]
struct Ring<T> {
    buffer: Vec<Option<T>>,
    head: usize,
    tail: usize,
    size: usize,
    capacity: usize,
    full: bool,
}

impl<T: Clone> RingBuffer<T> {
    /// Creates a ring buffer holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            inner: RwLock::new(Ring {
                buffer: vec![None; capacity],
                head: 0,
                tail: 0,
                size: 0,
                capacity,
                full: false,
            }),
        }
    }

    /// Appends an entry. When the buffer is at capacity the oldest entry is
    /// overwritten and the tail advances; `push` never fails.
    pub fn push(&self, value: T) {
        let mut ring = self.inner.write();

        let head = ring.head;
        ring.buffer[head] = Some(value);
        ring.head = (ring.head + 1) % ring.capacity;

        if ring.full {
            ring.tail = (ring.tail + 1) % ring.capacity;
        } else {
            ring.size += 1;
            if ring.size == ring.capacity {
                ring.full = true;
            }
        }
    }

    /// Removes and returns the oldest entry, or `None` when empty.
    pub fn pop(&self) -> Option<T> {
        let mut ring = self.inner.write();

        if ring.size == 0 {
            return None;
        }

        let tail = ring.tail;
        let value = ring.buffer[tail].take();
        ring.tail = (ring.tail + 1) % ring.capacity;
        ring.size -= 1;
        ring.full = false;

        value
    }

    /// Drains the buffer, returning every entry in FIFO order.
    pub fn pop_all(&self) -> Vec<T> {
        let mut ring = self.inner.write();

        if ring.size == 0 {
            return Vec::new();
        }

        let mut values = Vec::with_capacity(ring.size);
        for i in 0..ring.size {
            let idx = (ring.tail + i) % ring.capacity;
            if let Some(value) = ring.buffer[idx].take() {
                values.push(value);
            }
        }

        ring.head = 0;
        ring.tail = 0;
        ring.size = 0;
        ring.full = false;

        values
    }

    /// Returns a snapshot of the most recent `min(n, size)` entries in FIFO
    /// order without mutating the buffer. Empty for `n == 0` or an empty
    /// buffer.
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let ring = self.inner.read();

        if ring.size == 0 || n == 0 {
            return Vec::new();
        }

        let count = n.min(ring.size);
        let start = (ring.head + ring.capacity - count) % ring.capacity;

        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let idx = (start + i) % ring.capacity;
            if let Some(value) = &ring.buffer[idx] {
                values.push(value.clone());
            }
        }

        values
    }

    /// Current number of buffered entries.
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    /// Whether the buffer is at capacity.
    pub fn is_full(&self) -> bool {
        self.inner.read().full
    }

    /// Empties the buffer.
    pub fn clear(&self) {
        let mut ring = self.inner.write();
        for slot in ring.buffer.iter_mut() {
            *slot = None;
        }
        ring.head = 0;
        ring.tail = 0;
        ring.size = 0;
        ring.full = false;
    }
}
