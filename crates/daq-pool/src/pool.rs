//! Bounded, recycling frame allocator.
//!
//! Frames leave the pool as a uniquely owned [`PooledFrame`] so the producer
//! can fill them in. Once handed downstream they become a [`SharedFrame`],
//! which is read-only and cheap to clone. When the last handle is dropped the
//! frame goes back on the free list with its storage intact.
//!
//! # Locking
//!
//! One `parking_lot::Mutex` guards the free list and the buffer/memory
//! counters. It is held only while deciding which frame to hand out and how
//! much memory to charge; resizing and filling the buffer happen after it is
//! released. The counters are mirrored in atomics so the accessors never
//! touch the lock.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use daq_core::{
    validate_binning, validate_frame_size, ElementType, Frame, NdDimension, TypedBuffer,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::error::PoolError;

/// Pool limits. Zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of frames the pool may ever construct.
    pub max_buffers: usize,
    /// Maximum bytes of frame storage the pool may account for.
    pub max_memory: usize,
    /// Clear the attribute list of a recycled frame before handing it out.
    pub clear_attributes_on_alloc: bool,
}

impl PoolConfig {
    /// Limits with attribute clearing off.
    #[must_use]
    pub const fn new(max_buffers: usize, max_memory: usize) -> Self {
        Self {
            max_buffers,
            max_memory,
            clear_attributes_on_alloc: false,
        }
    }

    /// Builder-style attribute clearing flag.
    #[must_use]
    pub const fn with_clear_attributes(mut self, clear: bool) -> Self {
        self.clear_attributes_on_alloc = clear;
        self
    }
}

/// A frame plus the bytes the pool has charged for it.
#[derive(Debug, Default)]
struct Slot {
    frame: Frame,
    /// High-water mark of bytes charged to `memory_size` for this frame.
    resident_bytes: usize,
}

/// Point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReport {
    /// Frames constructed so far, in use or free.
    pub num_buffers: usize,
    /// Configured frame ceiling (0 = unlimited).
    pub max_buffers: usize,
    /// Bytes currently accounted.
    pub memory_size: usize,
    /// Configured byte ceiling (0 = unlimited).
    pub max_memory: usize,
    /// Frames on the free list.
    pub num_free: usize,
}

impl fmt::Display for PoolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FramePool:")?;
        writeln!(
            f,
            "  numBuffers={}, maxBuffers={}",
            self.num_buffers, self.max_buffers
        )?;
        writeln!(
            f,
            "  memorySize={}, maxMemory={}",
            self.memory_size, self.max_memory
        )?;
        write!(f, "  numFree={}", self.num_free)
    }
}

/// Bounded, reference-counted recycling allocator for [`Frame`]s.
///
/// Always used behind an `Arc`; handles keep the pool alive.
pub struct FramePool {
    config: PoolConfig,
    /// Free list, used LIFO so the most recently touched storage is reused.
    free: Mutex<Vec<Slot>>,
    num_buffers: AtomicUsize,
    memory_size: AtomicUsize,
    num_free: AtomicUsize,
}

impl fmt::Debug for FramePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("config", &self.config)
            .field("report", &self.report())
            .finish()
    }
}

impl FramePool {
    /// Create an empty pool. No frames are constructed up front.
    #[must_use]
    pub fn new(config: PoolConfig) -> Arc<Self> {
        info!(
            max_buffers = config.max_buffers,
            max_memory = config.max_memory,
            clear_attributes_on_alloc = config.clear_attributes_on_alloc,
            "Frame pool created"
        );
        Arc::new(Self {
            config,
            free: Mutex::new(Vec::new()),
            num_buffers: AtomicUsize::new(0),
            memory_size: AtomicUsize::new(0),
            num_free: AtomicUsize::new(0),
        })
    }

    /// Pool limits.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Allocate a frame with `dims` and a buffer of `element_type`.
    ///
    /// `required_bytes == 0` sizes the buffer from the dimensions; a larger
    /// value reserves extra storage and is what gets charged against the
    /// memory ceiling. Buffer contents are unspecified.
    pub fn allocate(
        self: &Arc<Self>,
        dims: &[NdDimension],
        element_type: ElementType,
        required_bytes: usize,
    ) -> Result<PooledFrame, PoolError> {
        if !element_type.is_numeric() {
            return Err(PoolError::InvalidType(element_type));
        }
        validate_binning(dims)?;
        let size = validate_frame_size(dims, element_type)?;
        let data_size = match required_bytes {
            0 => size.bytes,
            passed if passed < size.bytes => {
                error!(required = size.bytes, passed, "Requested frame size too small");
                return Err(PoolError::RequiredSizeTooSmall {
                    required: size.bytes,
                    passed,
                });
            }
            passed => passed,
        };

        let slot = self.checkout(data_size)?;
        let mut frame = PooledFrame::new(Arc::clone(self), slot);

        // The lock is released; from here on only this handle sees the frame.
        frame.reset_metadata();
        frame.dims.extend_from_slice(dims);
        if self.config.clear_attributes_on_alloc {
            frame.attributes.clear();
        }
        let mut buffer = match frame.take_data() {
            Some(mut buffer) => {
                buffer.reshape(element_type, size.elements)?;
                buffer
            }
            None => TypedBuffer::zeroed(element_type, size.elements)?,
        };
        if data_size > size.bytes {
            let width = element_type.numeric_width()?;
            buffer.reserve((data_size - size.bytes) / width);
        }
        frame.set_data(buffer);
        Ok(frame)
    }

    /// Pop or construct a slot and charge its growth, all under the lock.
    fn checkout(&self, data_size: usize) -> Result<Slot, PoolError> {
        let mut free = self.free.lock();

        let mut slot = match free.pop() {
            Some(slot) => {
                trace!(resident = slot.resident_bytes, data_size, "Reusing pooled frame");
                slot
            }
            None => {
                let num_buffers = self.num_buffers.load(Ordering::Acquire);
                if self.config.max_buffers != 0 && num_buffers >= self.config.max_buffers {
                    let memory_size = self.memory_size.load(Ordering::Acquire);
                    error!(
                        max_buffers = self.config.max_buffers,
                        memory_size,
                        max_memory = self.config.max_memory,
                        "Reached buffer limit"
                    );
                    return Err(PoolError::CapacityExceeded {
                        max_buffers: self.config.max_buffers,
                        memory_size,
                        max_memory: self.config.max_memory,
                    });
                }
                self.num_buffers.store(num_buffers + 1, Ordering::Release);
                debug!(num_buffers = num_buffers + 1, "Constructed new pooled frame");
                Slot::default()
            }
        };

        let growth = data_size.saturating_sub(slot.resident_bytes);
        if growth > 0 {
            let memory_size = self.memory_size.load(Ordering::Acquire);
            let max_memory = self.config.max_memory;
            if max_memory != 0 && memory_size.saturating_add(growth) > max_memory {
                let freed = self.free_memory();
                if freed < growth {
                    error!(
                        requested = growth,
                        memory_size,
                        max_memory,
                        "No memory available"
                    );
                    free.push(slot);
                    self.num_free.store(free.len(), Ordering::Release);
                    return Err(PoolError::OutOfMemory {
                        requested: growth,
                        memory_size,
                        max_memory,
                    });
                }
            }
            self.memory_size
                .store(memory_size.saturating_add(growth), Ordering::Release);
            slot.resident_bytes = data_size;
        }

        self.num_free.store(free.len(), Ordering::Release);
        Ok(slot)
    }

    /// Return a frame to the free list. Called from handle `Drop` only.
    fn release(&self, mut slot: Slot) {
        slot.frame.reset_metadata();
        let mut free = self.free.lock();
        free.push(slot);
        self.num_free.store(free.len(), Ordering::Release);
        trace!(num_free = free.len(), "Frame returned to pool");
    }

    /// Try to give accounted memory back so a pending allocation can fit.
    ///
    /// Reclamation is not implemented: nothing is freed and the return value
    /// is always 0, so any allocation that would cross `max_memory` fails.
    #[must_use]
    pub fn free_memory(&self) -> usize {
        0
    }

    /// Deep copy of `source` into a frame from this pool.
    ///
    /// `source` need not come from a pool; this is how externally delivered
    /// data is taken into pooled storage. The copy carries the same
    /// dimensions, element type, payload, attributes, id and timestamps.
    pub fn copy(self: &Arc<Self>, source: &Frame) -> Result<PooledFrame, PoolError> {
        let element_type = source.element_type()?;
        let mut out = self.allocate(&source.dims, element_type, 0)?;
        out.copy_identity_from(source);
        out.compressed_size = source.compressed_size;
        out.uncompressed_size = source.uncompressed_size;
        out.buffer_mut()?.copy_from(source.buffer()?);
        out.attributes.clear();
        source.attributes.copy_into(&mut out.attributes);
        Ok(out)
    }

    /// Frame ceiling (0 = unlimited).
    #[must_use]
    pub fn max_buffers(&self) -> usize {
        self.config.max_buffers
    }

    /// Byte ceiling (0 = unlimited).
    #[must_use]
    pub fn max_memory(&self) -> usize {
        self.config.max_memory
    }

    /// Frames constructed so far, including those on the free list.
    #[must_use]
    pub fn num_buffers(&self) -> usize {
        self.num_buffers.load(Ordering::Acquire)
    }

    /// Bytes currently accounted.
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.memory_size.load(Ordering::Acquire)
    }

    /// Frames on the free list.
    #[must_use]
    pub fn num_free(&self) -> usize {
        self.num_free.load(Ordering::Acquire)
    }

    /// Snapshot of all counters.
    #[must_use]
    pub fn report(&self) -> PoolReport {
        PoolReport {
            num_buffers: self.num_buffers(),
            max_buffers: self.max_buffers(),
            memory_size: self.memory_size(),
            max_memory: self.max_memory(),
            num_free: self.num_free(),
        }
    }
}

/// Ownership of one checked-out slot; returns it to the pool on drop.
struct Lease {
    pool: Arc<FramePool>,
    slot: Slot,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.slot));
    }
}

/// Uniquely owned frame fresh from the pool.
///
/// Dereferences mutably to [`Frame`]. Call [`share`](Self::share) to hand it
/// downstream; dropping it returns the frame to the pool.
pub struct PooledFrame {
    lease: Lease,
}

impl PooledFrame {
    fn new(pool: Arc<FramePool>, slot: Slot) -> Self {
        Self {
            lease: Lease { pool, slot },
        }
    }

    /// Publish the frame. It can no longer be mutated.
    #[must_use]
    pub fn share(self) -> SharedFrame {
        SharedFrame {
            lease: Arc::new(self.lease),
        }
    }

    /// The pool this frame returns to.
    #[must_use]
    pub fn pool(&self) -> &Arc<FramePool> {
        &self.lease.pool
    }

    /// Bytes charged to the pool for this frame's storage.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.lease.slot.resident_bytes
    }
}

impl Deref for PooledFrame {
    type Target = Frame;

    #[inline]
    fn deref(&self) -> &Frame {
        &self.lease.slot.frame
    }
}

impl DerefMut for PooledFrame {
    #[inline]
    fn deref_mut(&mut self) -> &mut Frame {
        &mut self.lease.slot.frame
    }
}

impl fmt::Debug for PooledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledFrame").field(&**self).finish()
    }
}

/// Read-only, reference-counted frame handle.
///
/// Clones share one frame; the last one dropped returns it to the pool.
#[derive(Clone)]
pub struct SharedFrame {
    lease: Arc<Lease>,
}

impl SharedFrame {
    /// Number of handles sharing this frame.
    #[must_use]
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.lease)
    }

    /// Regain unique ownership if this is the only handle.
    pub fn try_unique(self) -> Result<PooledFrame, SharedFrame> {
        Arc::try_unwrap(self.lease)
            .map(|lease| PooledFrame { lease })
            .map_err(|lease| SharedFrame { lease })
    }

    /// The pool this frame returns to.
    #[must_use]
    pub fn pool(&self) -> &Arc<FramePool> {
        &self.lease.pool
    }
}

impl Deref for SharedFrame {
    type Target = Frame;

    #[inline]
    fn deref(&self) -> &Frame {
        &self.lease.slot.frame
    }
}

impl fmt::Debug for SharedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFrame")
            .field("holders", &self.holders())
            .field("frame", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_core::{dims_from_sizes, AttributeValue};
    use tracing_test::traced_test;

    fn dims(sizes: &[usize]) -> Vec<NdDimension> {
        dims_from_sizes(sizes)
    }

    #[test]
    fn test_allocate_sets_dims_and_type() {
        let pool = FramePool::new(PoolConfig::default());
        let frame = pool.allocate(&dims(&[8, 4]), ElementType::UInt16, 0).unwrap();
        assert_eq!(frame.sizes(), vec![8, 4]);
        assert_eq!(frame.element_type(), Ok(ElementType::UInt16));
        assert_eq!(frame.buffer().unwrap().len(), 32);
        assert_eq!(pool.num_buffers(), 1);
        assert_eq!(pool.memory_size(), 64);
        assert_eq!(frame.resident_bytes(), 64);
    }

    #[test]
    fn test_release_on_drop_and_reuse() {
        let pool = FramePool::new(PoolConfig::default());
        let frame = pool.allocate(&dims(&[16]), ElementType::Float64, 0).unwrap();
        assert_eq!(pool.num_free(), 0);
        drop(frame);
        assert_eq!(pool.num_free(), 1);

        let again = pool.allocate(&dims(&[8]), ElementType::Float64, 0).unwrap();
        assert_eq!(pool.num_buffers(), 1);
        assert_eq!(pool.num_free(), 0);
        assert_eq!(pool.memory_size(), 128);
        assert_eq!(again.resident_bytes(), 128);
    }

    #[test]
    fn test_growth_charges_only_delta() {
        let pool = FramePool::new(PoolConfig::default());
        drop(pool.allocate(&dims(&[10]), ElementType::UInt8, 0).unwrap());
        let bigger = pool.allocate(&dims(&[25]), ElementType::UInt8, 0).unwrap();
        assert_eq!(pool.memory_size(), 25);
        drop(bigger);
        let smaller = pool.allocate(&dims(&[5]), ElementType::UInt8, 0).unwrap();
        assert_eq!(pool.memory_size(), 25);
        assert_eq!(smaller.buffer().unwrap().len(), 5);
    }

    #[test]
    fn test_capacity_exceeded() {
        let pool = FramePool::new(PoolConfig::new(2, 0));
        let a = pool.allocate(&dims(&[4]), ElementType::Int8, 0).unwrap();
        let _b = pool.allocate(&dims(&[4]), ElementType::Int8, 0).unwrap();
        let err = pool.allocate(&dims(&[4]), ElementType::Int8, 0).unwrap_err();
        assert!(matches!(err, PoolError::CapacityExceeded { max_buffers: 2, .. }));

        drop(a);
        assert!(pool.allocate(&dims(&[4]), ElementType::Int8, 0).is_ok());
        assert_eq!(pool.num_buffers(), 2);
    }

    #[traced_test]
    #[test]
    fn test_ceiling_hits_are_logged() {
        let pool = FramePool::new(PoolConfig::new(1, 8));
        let held = pool.allocate(&dims(&[8]), ElementType::UInt8, 0).unwrap();
        assert!(pool.allocate(&dims(&[8]), ElementType::UInt8, 0).is_err());
        assert!(logs_contain("Reached buffer limit"));
        drop(held);
        assert!(pool.allocate(&dims(&[9]), ElementType::UInt8, 0).is_err());
        assert!(logs_contain("No memory available"));
    }

    #[test]
    fn test_out_of_memory_returns_slot() {
        let pool = FramePool::new(PoolConfig::new(0, 100));
        let err = pool.allocate(&dims(&[101]), ElementType::UInt8, 0).unwrap_err();
        assert_eq!(
            err,
            PoolError::OutOfMemory {
                requested: 101,
                memory_size: 0,
                max_memory: 100
            }
        );
        assert_eq!(pool.memory_size(), 0);
        assert_eq!(pool.num_buffers(), 1);
        assert_eq!(pool.num_free(), 1);

        assert!(pool.allocate(&dims(&[100]), ElementType::UInt8, 0).is_ok());
        assert_eq!(pool.memory_size(), 100);
    }

    #[test]
    fn test_required_bytes() {
        let pool = FramePool::new(PoolConfig::default());
        let err = pool.allocate(&dims(&[4]), ElementType::UInt32, 8).unwrap_err();
        assert_eq!(
            err,
            PoolError::RequiredSizeTooSmall {
                required: 16,
                passed: 8
            }
        );
        let frame = pool.allocate(&dims(&[4]), ElementType::UInt32, 64).unwrap();
        assert_eq!(frame.buffer().unwrap().len(), 4);
        assert!(frame.buffer().unwrap().capacity_bytes() >= 64);
        assert_eq!(pool.memory_size(), 64);
    }

    #[test]
    fn test_storage_stays_within_charge() {
        let pool = FramePool::new(PoolConfig::default());
        drop(pool.allocate(&dims(&[100]), ElementType::UInt8, 0).unwrap());
        let grown = pool.allocate(&dims(&[101]), ElementType::UInt8, 0).unwrap();
        assert_eq!(pool.memory_size(), 101);
        assert!(grown.buffer().unwrap().capacity_bytes() <= grown.resident_bytes());
        drop(grown);

        let padded = pool.allocate(&dims(&[16]), ElementType::UInt8, 17).unwrap();
        assert_eq!(padded.buffer().unwrap().len(), 16);
        assert!(padded.buffer().unwrap().capacity_bytes() <= padded.resident_bytes());

        let fresh = pool.allocate(&dims(&[16]), ElementType::UInt8, 17).unwrap();
        assert_eq!(fresh.resident_bytes(), 17);
        assert_eq!(fresh.buffer().unwrap().capacity_bytes(), 17);
        assert_eq!(pool.memory_size(), 118);
    }

    #[test]
    fn test_string_type_rejected() {
        let pool = FramePool::new(PoolConfig::default());
        assert_eq!(
            pool.allocate(&dims(&[4]), ElementType::String, 0).unwrap_err(),
            PoolError::InvalidType(ElementType::String)
        );
        assert_eq!(pool.num_buffers(), 0);
    }

    #[test]
    fn test_recycled_attributes_follow_config() {
        let keep = FramePool::new(PoolConfig::default());
        let mut f = keep.allocate(&dims(&[1]), ElementType::UInt8, 0).unwrap();
        f.set_attribute("Gain", AttributeValue::Float64(2.0));
        drop(f);
        let f = keep.allocate(&dims(&[1]), ElementType::UInt8, 0).unwrap();
        assert!(f.attributes.find("Gain").is_some());
        drop(f);

        let clear = FramePool::new(PoolConfig::default().with_clear_attributes(true));
        let mut f = clear.allocate(&dims(&[1]), ElementType::UInt8, 0).unwrap();
        f.set_attribute("Gain", AttributeValue::Float64(2.0));
        drop(f);
        let f = clear.allocate(&dims(&[1]), ElementType::UInt8, 0).unwrap();
        assert!(f.attributes.is_empty());
    }

    #[test]
    fn test_shared_frame_returns_once() {
        let pool = FramePool::new(PoolConfig::default());
        let shared = pool.allocate(&dims(&[4]), ElementType::Int32, 0).unwrap().share();
        let second = shared.clone();
        assert_eq!(shared.holders(), 2);
        drop(shared);
        assert_eq!(pool.num_free(), 0);
        drop(second);
        assert_eq!(pool.num_free(), 1);
        assert_eq!(pool.num_buffers(), 1);
    }

    #[test]
    fn test_try_unique() {
        let pool = FramePool::new(PoolConfig::default());
        let shared = pool.allocate(&dims(&[2]), ElementType::Int32, 0).unwrap().share();
        let other = shared.clone();
        let shared = shared.try_unique().unwrap_err();
        drop(other);
        let mut unique = shared.try_unique().unwrap();
        unique.view_mut::<i32>().unwrap()[0] = 5;
        assert_eq!(pool.num_free(), 0);
    }

    #[test]
    fn test_report_display() {
        let pool = FramePool::new(PoolConfig::new(4, 1024));
        let _f = pool.allocate(&dims(&[16]), ElementType::UInt8, 0).unwrap();
        let report = pool.report();
        assert_eq!(report.num_buffers, 1);
        let text = report.to_string();
        assert!(text.contains("numBuffers=1, maxBuffers=4"));
        assert!(text.contains("memorySize=16, maxMemory=1024"));
        assert!(text.contains("numFree=0"));
    }
}
