//! End-to-end pipeline: configuration -> pool -> driver frames -> ROI plugins.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use frame_daq::config::DaqConfig;
use frame_daq::plugin::{
    CountersSnapshot, RateLimitConfig, RateLimitMode, RateLimitPlugin, RoiAxis, RoiConfig, RoiPlugin,
};
use frame_daq::{
    dims_from_sizes, AttributeValue, ColorMode, DaqError, ElementType, Frame, FramePool,
    PoolConfig, PoolError, SharedFrame, TypedBuffer,
};
use serial_test::serial;
use tokio::task::JoinSet;

/// Simulated driver: a ramp image stamped with an id and an attribute.
fn acquire(pool: &Arc<FramePool>, id: i32, nx: usize, ny: usize) -> SharedFrame {
    let mut frame = pool
        .allocate(&dims_from_sizes(&[nx, ny]), ElementType::UInt16, 0)
        .unwrap();
    for (i, v) in frame.view_mut::<u16>().unwrap().iter_mut().enumerate() {
        *v = (i % 7) as u16;
    }
    frame.unique_id = id;
    frame.time_stamp = f64::from(id) * 0.01;
    frame.set_attribute("Exposure", AttributeValue::Float64(0.01));
    frame.share()
}

#[test]
#[serial]
fn test_pipeline_from_config_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[pool]
max_buffers = 6

[roi]
data_type = 9

[roi.x]
min = 4
size = 8
bin = 2

[roi.y]
bin = 4
"#
    )
    .unwrap();
    let config = DaqConfig::load_from(file.path()).unwrap();

    let pool = FramePool::new(config.pool);
    let plugin = RoiPlugin::new("ROI1", Arc::clone(&pool), config.roi.clone());

    for id in 0..20 {
        let frame = acquire(&pool, id, 16, 8);
        let out = plugin.process(&frame).unwrap();

        assert_eq!(out.sizes(), vec![4, 2]);
        assert_eq!(out.element_type(), Ok(ElementType::Float32));
        assert_eq!(out.unique_id, id);
        assert_eq!(
            out.attributes.find("Exposure").map(|a| &a.value),
            Some(&AttributeValue::Float64(0.01))
        );
        // Geometry is reported in source-detector terms
        assert_eq!((out.dims[0].offset, out.dims[0].binning), (4, 2));
        assert_eq!((out.dims[1].offset, out.dims[1].binning), (0, 4));
        assert_eq!(out.dims[0].full_size, 16);
    }

    // Input and output recycled every iteration
    assert_eq!(pool.num_buffers(), 2);
    assert_eq!(pool.num_free(), 2);
    assert_eq!(
        plugin.counters().snapshot(),
        CountersSnapshot {
            array_counter: 20,
            dropped_arrays: 0,
            disordered_arrays: 0,
        }
    );
}

#[test]
fn test_binned_values_match_manual_sum() {
    let pool = FramePool::new(PoolConfig::default());
    let roi = RoiConfig {
        x: RoiAxis { bin: 2, ..RoiAxis::default() },
        y: RoiAxis { bin: 2, ..RoiAxis::default() },
        data_type: ElementType::Int32.code(),
        ..RoiConfig::default()
    };
    let plugin = RoiPlugin::new("ROI1", Arc::clone(&pool), roi);

    let data: Vec<u8> = (0..16).collect();
    let input = Frame::from_parts(dims_from_sizes(&[4, 4]), TypedBuffer::from(data)).unwrap();
    let out = plugin.process(&input).unwrap();

    // Row-major with X fastest: block (0,0) = 0+1+4+5
    assert_eq!(out.view::<i32>().unwrap(), &[10, 18, 42, 50]);
}

#[test]
fn test_color_plane_selection_produces_mono() {
    let pool = FramePool::new(PoolConfig::default());
    let roi = RoiConfig {
        z: RoiAxis { min: 2, size: 1, ..RoiAxis::default() },
        ..RoiConfig::default()
    };
    let plugin = RoiPlugin::new("ROI1", Arc::clone(&pool), roi);

    for mode in [ColorMode::Rgb1, ColorMode::Rgb2, ColorMode::Rgb3] {
        let axes = frame_daq::daq_core::xyc_axes(mode);
        let mut sizes = [0usize; 3];
        sizes[axes[0]] = 4;
        sizes[axes[1]] = 3;
        sizes[axes[2]] = 3;
        let mut input = Frame::from_parts(
            dims_from_sizes(&sizes),
            TypedBuffer::from(vec![1.0f64; 36]),
        )
        .unwrap();
        input.set_color_mode(mode);

        let out = plugin.process(&input).unwrap();
        assert_eq!(out.sizes(), vec![4, 3], "{mode:?}");
        assert_eq!(out.color_mode(), ColorMode::Mono);
        assert_eq!(out.info().unwrap().color, None);
    }
}

#[test]
fn test_reconfigure_between_frames() {
    let pool = FramePool::new(PoolConfig::default());
    let plugin = RoiPlugin::new("ROI1", Arc::clone(&pool), RoiConfig::default());
    let input = acquire(&pool, 1, 8, 8);

    assert_eq!(plugin.process(&input).unwrap().sizes(), vec![8, 8]);

    let mut roi = plugin.config();
    roi.x.size = 3;
    roi.y.reverse = true;
    plugin.set_config(roi);
    let out = plugin.process(&input).unwrap();
    assert_eq!(out.sizes(), vec![3, 8]);
    assert!(out.dims[1].reverse);
    assert_eq!(plugin.status().axes[0].size, 3);
}

#[test]
fn test_pool_exhaustion_drops_frames() {
    let pool = FramePool::new(PoolConfig::new(3, 0));
    let plugin = RoiPlugin::new("ROI1", Arc::clone(&pool), RoiConfig::default());
    let input = acquire(&pool, 0, 4, 4);

    // Downstream holds on to everything it is given
    let mut published = Vec::new();
    let mut dropped = 0;
    for _ in 0..5 {
        match plugin.process(&input) {
            Ok(out) => published.push(out),
            Err(DaqError::Pool(PoolError::CapacityExceeded { .. })) => dropped += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(published.len(), 2);
    assert_eq!(dropped, 3);
    assert_eq!(plugin.counters().dropped_arrays(), 3);

    published.clear();
    assert!(plugin.process(&input).is_ok());
}

#[test]
#[serial]
fn test_rate_limit_after_roi() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
[roi.x]
bin = 4

[rate_limit]
mode = "byte_rate"
limit = 6400
"#
    )
    .unwrap();
    let config = DaqConfig::load_from(file.path()).unwrap();

    let pool = FramePool::new(config.pool);
    let roi = RoiPlugin::new("ROI1", Arc::clone(&pool), config.roi.clone());
    let start = Instant::now();
    let limiter = RateLimitPlugin::new_at("RATE1", config.rate_limit, start);

    // Each binned frame is 4 x 8 u16 = 64 bytes; the bucket holds 100 of them
    let mut forwarded = Vec::new();
    for id in 0..120 {
        let binned = roi.process(&acquire(&pool, id, 16, 8)).unwrap();
        if let Some(out) = limiter.process_at(&binned, start).unwrap() {
            forwarded.push(out);
        }
    }
    assert_eq!(forwarded.len(), 100);
    assert_eq!(limiter.counters().dropped_arrays(), 20);
    assert_eq!(roi.counters().dropped_arrays(), 0);

    // 64 bytes/10 ms: one second later the bucket is full again
    let later = start + Duration::from_secs(1);
    assert_eq!(limiter.status_at(later).tokens, 6400);

    // Dropped frames went straight back to the pool
    forwarded.clear();
    assert_eq!(pool.num_free(), pool.num_buffers());

    limiter.set_config(RateLimitConfig {
        mode: RateLimitMode::Off,
        limit: 0,
    });
    let binned = roi.process(&acquire(&pool, 120, 16, 8)).unwrap();
    assert!(limiter.process(&binned).unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_plugin_shared_across_workers() {
    let pool = FramePool::new(PoolConfig::new(64, 0));
    let roi = RoiConfig {
        x: RoiAxis { bin: 4, ..RoiAxis::default() },
        ..RoiConfig::default()
    };
    let plugin = Arc::new(RoiPlugin::new("ROI1", Arc::clone(&pool), roi));

    let mut tasks = JoinSet::new();
    for worker in 0..4 {
        let pool = Arc::clone(&pool);
        let plugin = Arc::clone(&plugin);
        tasks.spawn_blocking(move || {
            for i in 0..50 {
                let frame = acquire(&pool, worker * 50 + i, 16, 4);
                let out = plugin.process(&frame).unwrap();
                assert_eq!(out.sizes(), vec![4, 4]);
            }
        });
    }
    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }

    let counters = plugin.counters().snapshot();
    assert_eq!(counters.array_counter, 200);
    assert_eq!(counters.dropped_arrays, 0);
    assert_eq!(pool.num_free(), pool.num_buffers());
}
