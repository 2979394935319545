//! Lock-free floating-point cells for the shared playback clock and the audio cursor.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` stored as its bit pattern in an [`AtomicU64`].
///
/// Updates go through a compare-and-retry loop, so concurrent writers never
/// lose each other's adjustments and no reader ever blocks.
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Apply `f` atomically, retrying on contention. Returns the new value.
    pub fn update<F>(&self, mut f: F) -> f64
    where
        F: FnMut(f64) -> f64,
    {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return f64::from_bits(next),
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically add `delta`. Returns the new value.
    #[inline]
    pub fn add(&self, delta: f64) -> f64 {
        self.update(|v| v + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_load_store() {
        let cell = AtomicF64::new(1.25);
        assert_eq!(cell.load(), 1.25);
        cell.store(-3.5);
        assert_eq!(cell.load(), -3.5);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let cell = Arc::new(AtomicF64::new(0.0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.add(0.5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.load(), 2000.0);
    }
}
