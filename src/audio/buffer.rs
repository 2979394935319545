//! Output buffer for converted samples.

/// Byte buffer the converter writes into.
///
/// Owned by the decode loop and lent to the packet handler for every frame.
/// The size only ever grows during a session so steady-state playback does
/// not allocate.
#[derive(Debug, Default)]
pub struct ResampleBuffer {
    data: Vec<u8>,
}

impl ResampleBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Current allocated size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Grow to at least `required` bytes. Never shrinks.
    /// Returns true if the buffer had to grow.
    pub fn ensure(&mut self, required: usize) -> bool {
        if required <= self.data.len() {
            return false;
        }
        self.data.resize(required, 0);
        true
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
