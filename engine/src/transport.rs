//! Serialized access to the display memory transport.
//!
//! The frame memory sits on a bus shared with other peripherals, so every
//! user goes through one reentrant lock. The lock protects the transport
//! only; scene state is never behind it.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::framebuffer::{BlockMove, FrameBuffer};

/// Cloneable handle to a frame buffer behind a reentrant lock.
///
/// It implements [`FrameBuffer`] itself, taking the lock for each
/// operation. [`Self::hold`] keeps the lock across several operations; the
/// owning thread may keep issuing operations while holding it.
pub struct SharedTransport<F> {
    inner: Arc<ReentrantMutex<RefCell<F>>>,
}

impl<F> Clone for SharedTransport<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> SharedTransport<F> {
    pub fn new(fb: F) -> Self {
        Self {
            inner: Arc::new(ReentrantMutex::new(RefCell::new(fb))),
        }
    }

    /// Takes the transport lock until the guard is dropped.
    pub fn hold(&self) -> ReentrantMutexGuard<'_, RefCell<F>> {
        self.inner.lock()
    }

    /// Runs `f` with exclusive access to the frame buffer. `f` must not
    /// call back into this transport.
    pub fn with<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        let guard = self.inner.lock();
        let mut fb = guard.borrow_mut();
        f(&mut fb)
    }
}

impl<F: FrameBuffer> FrameBuffer for SharedTransport<F> {
    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) {
        self.with(|fb| fb.read_bytes(addr, buf));
    }

    fn write_bytes(&mut self, addr: u32, data: &[u8]) {
        self.with(|fb| fb.write_bytes(addr, data));
    }

    fn bulk_copy(&mut self, mv: &BlockMove) {
        self.with(|fb| fb.bulk_copy(mv));
    }

    fn copy_complete(&mut self) -> bool {
        self.with(|fb| fb.copy_complete())
    }

    fn pixel_address(&self, x: u16, y: u16) -> u32 {
        self.with(|fb| fb.pixel_address(x, y))
    }

    fn pitch(&self) -> u32 {
        self.with(|fb| fb.pitch())
    }

    fn current_line(&mut self) -> u16 {
        self.with(|fb| fb.current_line())
    }

    fn frame(&self) -> u32 {
        self.with(|fb| fb.frame())
    }
}
