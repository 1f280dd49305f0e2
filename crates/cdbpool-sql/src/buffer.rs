use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

pub const DEFAULT_MAX_IDLE: usize = 64;
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 64 * 1024;

/// Scratch strings used to render statement fragments.
///
/// A buffer is returned to the pool when its [`PooledBuffer`] guard drops. Release
/// truncates the string to zero length; the old bytes stay in the allocation but no
/// `String` API can reach past `len`, so the next borrower always starts empty.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<String>>,
    max_idle: usize,
    max_retained_capacity: usize,
}

impl BufferPool {
    pub fn new(max_idle: usize, max_retained_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            max_retained_capacity,
        }
    }

    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .unwrap_or_default();
        PooledBuffer { pool: self, buf }
    }

    pub fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn release(&self, mut buf: String) {
        buf.clear();
        if buf.capacity() > self.max_retained_capacity {
            return;
        }
        let mut idle = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE, DEFAULT_MAX_RETAINED_CAPACITY)
    }
}

/// Exclusive handle on a pooled buffer.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: String,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl fmt::Write for PooledBuffer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::BufferPool;
    use std::fmt::Write;
    use std::sync::Arc;

    #[test]
    fn released_buffer_comes_back_empty() {
        let pool = BufferPool::new(4, 1024);
        {
            let mut buf = pool.acquire();
            write!(buf, "name = 'alice', age = {}", 42).unwrap();
            assert!(!buf.is_empty());
        }
        assert_eq!(pool.idle_count(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(buf.as_str(), "");
        assert!(buf.capacity() > 0, "allocation should be reused");
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn oversized_buffers_are_not_retained() {
        let pool = BufferPool::new(4, 16);
        {
            let mut buf = pool.acquire();
            buf.push_str(&"x".repeat(1024));
        }
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn idle_list_is_bounded() {
        let pool = BufferPool::new(2, 1024);
        {
            let _a = pool.acquire();
            let _b = pool.acquire();
            let _c = pool.acquire();
        }
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn concurrent_borrowers_never_see_each_others_bytes() {
        let pool = Arc::new(BufferPool::new(8, 4096));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let mut buf = pool.acquire();
                        assert!(buf.is_empty());
                        write!(buf, "{n}:{i}").unwrap();
                        assert_eq!(buf.as_str(), format!("{n}:{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        assert!(pool.idle_count() <= 8);
    }
}
