use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Idle buffers kept around beyond this count are freed instead of pooled.
const DEFAULT_MAX_IDLE: usize = 256;

/// Pool of fixed-capacity packet buffers shared by every pipeline task.
///
/// A buffer leaves the pool as an owned [`PacketBuffer`] and comes back when
/// that value is dropped, so it is returned exactly once and can never be
/// held by two tasks at the same time.
pub struct BufferPool {
    free: Mutex<Vec<Box<[u8]>>>,
    buffer_size: usize,
    max_idle: usize,
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Arc<Self> {
        Self::with_max_idle(buffer_size, DEFAULT_MAX_IDLE)
    }

    pub fn with_max_idle(buffer_size: usize, max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::new()),
            buffer_size,
            max_idle,
        })
    }

    pub fn acquire(self: &Arc<Self>) -> PacketBuffer {
        let data = self
            .free
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size].into_boxed_slice());

        PacketBuffer {
            data: Some(data),
            len: 0,
            pool: Arc::clone(self),
        }
    }

    /// Buffers currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn release(&self, data: Box<[u8]>) {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < self.max_idle {
            free.push(data);
        }
    }
}

/// One pooled buffer plus the length of its valid prefix.
///
/// Derefs to the valid prefix; [`PacketBuffer::capacity_mut`] exposes the
/// whole buffer for reads that fill it.
pub struct PacketBuffer {
    data: Option<Box<[u8]>>,
    len: usize,
    pool: Arc<BufferPool>,
}

impl PacketBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }

    /// Sets the valid prefix, clamped to the capacity.
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.capacity());
    }

    pub fn capacity_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or_default()
    }
}

impl Deref for PacketBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[..self.len],
            None => &[],
        }
    }
}

impl DerefMut for PacketBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        match &mut self.data {
            Some(data) => &mut data[..len],
            None => &mut [],
        }
    }
}

impl Drop for PacketBuffer {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.release(data);
        }
    }
}

impl fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}
