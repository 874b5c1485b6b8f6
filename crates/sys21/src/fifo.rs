use std::ops::Index;

/// Fixed-capacity ring buffer. `push_back` hands the value back when full so
/// callers decide what a full buffer means for their protocol.
#[derive(Debug)]
pub struct Fifo<T> {
    data: Box<[T]>,
    front: usize,
    len: usize,
}

impl<T: Copy + Default> Fifo<T> {
    pub fn with_capacity(capacity: usize) -> Fifo<T> {
        Fifo {
            data: vec![T::default(); capacity].into_boxed_slice(),
            front: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Slot of the next value `pop_front` returns.
    pub fn front(&self) -> usize {
        self.front
    }

    fn wrap_index(&self, index: usize) -> usize {
        if index < self.capacity() {
            index
        } else {
            index - self.capacity()
        }
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn push_back(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        let index = self.wrap_index(self.front + self.len);
        self.data[index] = value;
        self.len += 1;
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let value = self.data[self.front];
        self.front = self.wrap_index(self.front + 1);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.front = 0;
        self.len = 0;
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> + '_ {
        (0..self.len).map(|i| &self[i])
    }
}

impl<T: Copy + Default> Index<usize> for Fifo<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        assert!(index < self.len);
        &self.data[self.wrap_index(self.front + index)]
    }
}
