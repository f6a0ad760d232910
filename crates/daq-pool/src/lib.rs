//! Bounded, recycling frame pool and the generic convert/bin engine.
//!
//! This crate provides the two pieces every driver and plugin stage shares:
//!
//! - [`FramePool`]: hands out [`Frame`](daq_core::Frame)s under a frame-count
//!   and byte ceiling, and takes them back when the last holder lets go
//! - [`FramePool::convert`]: type cast, region extraction, N-dimensional
//!   binning and reversal in one pass, producing a new pooled frame
//!
//! # Key Design: Ownership Phases
//!
//! A frame fresh from the pool is a [`PooledFrame`]: one owner, mutable, so
//! the producer can fill in pixels and metadata. [`PooledFrame::share`] turns
//! it into a [`SharedFrame`], which any number of downstream stages can hold
//! and read but none can modify. Transformations always go through
//! [`FramePool::copy`] or [`FramePool::convert`] and produce a new frame.
//!
//! Dropping the last handle pushes the frame back onto the free list with its
//! storage, so steady-state streaming does not touch the allocator.
//!
//! # Example
//!
//! ```
//! use daq_core::{dims_from_sizes, ElementType, NdDimension};
//! use daq_pool::{FramePool, PoolConfig};
//!
//! // At most 8 frames, 64 MB of pixel storage
//! let pool = FramePool::new(PoolConfig::new(8, 64 * 1024 * 1024));
//!
//! let mut frame = pool
//!     .allocate(&dims_from_sizes(&[4, 4]), ElementType::Int32, 0)
//!     .unwrap();
//! frame.view_mut::<i32>().unwrap().fill(1);
//! let frame = frame.share();
//!
//! // 2x2 binning
//! let binned = pool
//!     .convert(&frame, ElementType::Int32, &[NdDimension::extract(0, 4, 2); 2])
//!     .unwrap();
//! assert_eq!(binned.view::<i32>().unwrap(), &[4, 4, 4, 4]);
//!
//! drop(frame);
//! drop(binned);
//! assert_eq!(pool.num_free(), 2);
//! ```

pub mod convert;
pub mod error;
pub mod pool;

pub use error::PoolError;
pub use pool::{FramePool, PoolConfig, PoolReport, PooledFrame, SharedFrame};
