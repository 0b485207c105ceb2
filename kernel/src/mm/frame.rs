//! Physical frame allocator
//!
//! Owns every usable 4 KiB frame in the pool and a dense per-frame
//! reference count. A frame is on the free stack iff its refcount is
//! zero; a refcount above one means the frame is shared copy-on-write
//! and must be read-only in every mapping that refers to it.
//!
//! Double frees and refcount underflow are programming errors and
//! panic rather than corrupting the pool.

use crate::error::{KernelError, KernelResult};
use crate::mm::{PhysAddr, PAGE_SIZE};

/// Upper bound on managed frames (128 MiB of pool).
pub const MAX_FRAMES: usize = 32768;

/// Allocator statistics for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub total: usize,
    pub free: usize,
    pub allocations: u64,
    pub frees: u64,
}

/// Reference-counted allocator over a contiguous physical frame pool.
pub struct FrameAllocator {
    base: PhysAddr,
    count: usize,
    /// Stack of free frame indices; `free[..free_top]` are live.
    free: [u32; MAX_FRAMES],
    free_top: usize,
    /// Dense refcounts, indexed by frame number relative to `base`.
    refcounts: [u16; MAX_FRAMES],
    allocations: u64,
    frees: u64,
}

impl FrameAllocator {
    /// An uninitialized allocator with an empty pool, suitable for a
    /// static. [`Self::init`] hands it the pool.
    pub const fn empty() -> Self {
        Self {
            base: PhysAddr::new(0),
            count: 0,
            free: [0; MAX_FRAMES],
            free_top: 0,
            refcounts: [0; MAX_FRAMES],
            allocations: 0,
            frees: 0,
        }
    }

    /// Heap-allocate an empty allocator without staging the large
    /// bookkeeping arrays on the stack.
    pub fn empty_boxed() -> alloc::boxed::Box<Self> {
        let layout = core::alloc::Layout::new::<Self>();
        // SAFETY: the all-zero bit pattern is exactly `Self::empty()`
        // (empty pool, empty free stack, zero counters), and the
        // allocation is owned by the returned Box.
        unsafe {
            let ptr = alloc::alloc::alloc_zeroed(layout) as *mut Self;
            assert!(!ptr.is_null(), "frame allocator allocation failed");
            alloc::boxed::Box::from_raw(ptr)
        }
    }

    /// Adopt the pool `[base, base + count * PAGE_SIZE)`.
    ///
    /// The free stack is filled in reverse so allocation hands out
    /// ascending addresses, which keeps early boot layouts predictable.
    pub fn init(&mut self, base: PhysAddr, count: usize) {
        assert!(base.is_page_aligned(), "frame pool base must be page aligned");
        assert!(count <= MAX_FRAMES, "frame pool larger than MAX_FRAMES");
        self.base = base;
        self.count = count;
        self.free_top = count;
        for i in 0..count {
            self.free[i] = (count - 1 - i) as u32;
            self.refcounts[i] = 0;
        }
        self.allocations = 0;
        self.frees = 0;
    }

    fn index(&self, phys: PhysAddr) -> usize {
        assert!(
            phys.is_page_aligned(),
            "frame address {:#010x} not page aligned",
            phys.0
        );
        let off = phys
            .0
            .checked_sub(self.base.0)
            .unwrap_or_else(|| panic!("frame {:#010x} below pool base", phys.0));
        let idx = off as usize / PAGE_SIZE;
        assert!(idx < self.count, "frame {:#010x} outside pool", phys.0);
        idx
    }

    fn frame_at(&self, idx: usize) -> PhysAddr {
        PhysAddr::new(self.base.0 + (idx * PAGE_SIZE) as u32)
    }

    /// Allocate one frame with refcount 1.
    pub fn alloc(&mut self) -> KernelResult<PhysAddr> {
        if self.free_top == 0 {
            return Err(KernelError::OutOfFrames);
        }
        self.free_top -= 1;
        let idx = self.free[self.free_top] as usize;
        debug_assert_eq!(self.refcounts[idx], 0, "free-stack frame had nonzero refcount");
        self.refcounts[idx] = 1;
        self.allocations += 1;
        Ok(self.frame_at(idx))
    }

    /// Record a new sharer of an allocated frame (fork's COW path).
    pub fn retain(&mut self, phys: PhysAddr) {
        let idx = self.index(phys);
        let rc = self.refcounts[idx];
        assert!(rc > 0, "retain of free frame {:#010x}", phys.0);
        self.refcounts[idx] = rc.checked_add(1).expect("frame refcount overflow");
    }

    /// Drop one reference; the frame rejoins the free stack when the
    /// last reference goes away. Freeing a free frame panics.
    pub fn free(&mut self, phys: PhysAddr) {
        let idx = self.index(phys);
        let rc = self.refcounts[idx];
        assert!(rc > 0, "double free of frame {:#010x}", phys.0);
        self.refcounts[idx] = rc - 1;
        if rc == 1 {
            self.free[self.free_top] = idx as u32;
            self.free_top += 1;
            self.frees += 1;
        }
    }

    /// Current reference count of a pool frame.
    pub fn refcount(&self, phys: PhysAddr) -> u16 {
        self.refcounts[self.index(phys)]
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            total: self.count,
            free: self.free_top,
            allocations: self.allocations,
            frees: self.frees,
        }
    }

    /// Number of frames currently allocated (refcount ≥ 1).
    pub fn allocated(&self) -> usize {
        self.count - self.free_top
    }
}
