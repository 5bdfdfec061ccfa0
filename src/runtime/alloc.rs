//! Heap accounting allocator.
//!
//! Wraps the system allocator and keeps process-wide counters in atomics.
//! Only effective once installed with `#[global_allocator]`; otherwise every
//! counter stays at zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::runtime::probe::MemoryStats;

/// Smallest block the accounting assumes the allocator hands out.
const MIN_SIZE_CLASS: usize = 16;

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static IN_USE: AtomicU64 = AtomicU64::new(0);
static RESERVED: AtomicU64 = AtomicU64::new(0);
static OBJECTS: AtomicU64 = AtomicU64::new(0);
static RECLAIMS: AtomicU32 = AtomicU32::new(0);

/// Global allocator that records heap usage.
///
/// ```ignore
/// #[global_allocator]
/// static ALLOC: runtime_monitor::runtime::TrackingAllocator = runtime_monitor::runtime::TrackingAllocator;
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator;

impl TrackingAllocator {
    /// Read the current counters.
    pub fn stats() -> MemoryStats {
        MemoryStats {
            heap_alloc: ALLOCATED.load(Ordering::Relaxed),
            heap_inuse: IN_USE.load(Ordering::Relaxed),
            heap_sys: RESERVED.load(Ordering::Relaxed),
            heap_objects: OBJECTS.load(Ordering::Relaxed),
            reclaims: RECLAIMS.load(Ordering::Relaxed),
        }
    }
}

/// Bytes the allocator is assumed to consume for a request of `size`.
fn size_class(size: usize, align: usize) -> u64 {
    let granule = align.max(MIN_SIZE_CLASS);
    size.div_ceil(granule).saturating_mul(granule) as u64
}

fn on_alloc(size: usize, align: usize) {
    ALLOCATED.fetch_add(size as u64, Ordering::Relaxed);
    OBJECTS.fetch_add(1, Ordering::Relaxed);
    let class = size_class(size, align);
    let in_use = IN_USE.fetch_add(class, Ordering::Relaxed) + class;
    RESERVED.fetch_max(in_use, Ordering::Relaxed);
}

fn on_dealloc(size: usize, align: usize) {
    ALLOCATED.fetch_sub(size as u64, Ordering::Relaxed);
    OBJECTS.fetch_sub(1, Ordering::Relaxed);
    IN_USE.fetch_sub(size_class(size, align), Ordering::Relaxed);
    // Wraps at u32::MAX; consumers treat a decrease as a reset.
    RECLAIMS.fetch_add(1, Ordering::Relaxed);
}

fn on_realloc(old_size: usize, new_size: usize, align: usize) {
    ALLOCATED.fetch_sub(old_size as u64, Ordering::Relaxed);
    ALLOCATED.fetch_add(new_size as u64, Ordering::Relaxed);
    IN_USE.fetch_sub(size_class(old_size, align), Ordering::Relaxed);
    let class = size_class(new_size, align);
    let in_use = IN_USE.fetch_add(class, Ordering::Relaxed) + class;
    RESERVED.fetch_max(in_use, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            on_alloc(layout.size(), layout.align());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            on_alloc(layout.size(), layout.align());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        on_dealloc(layout.size(), layout.align());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            on_realloc(layout.size(), new_size, layout.align());
        }
        new_ptr
    }
}
