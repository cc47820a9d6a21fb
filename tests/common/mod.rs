//! Shared fixtures for integration tests.
//!
//! Image fixtures are generated with the `image` crate so no external tools
//! are needed. [`MockAdapter`] stands in for a real codec when a test needs
//! to count or hold conversions.

#![allow(dead_code)]

use fileforge::batch::{BatchEngine, BatchResult};
use fileforge_codecs::{AdapterRegistry, CodecAdapter, ConversionOptions, ImageAdapter};
use fileforge_common::{FileCategory, FileDescriptor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Write a small RGB PNG.
pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 16) as u8, (y * 16) as u8, 128])
    });
    img.save(path).unwrap();
}

/// Write a file that claims to be an image but is not.
pub fn write_corrupt(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"this is definitely not image data").unwrap();
}

/// Registry holding only the pure-Rust image adapter.
pub fn image_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ImageAdapter::new()));
    registry
}

pub fn image_engine() -> BatchEngine {
    BatchEngine::new(image_registry())
}

/// Registry and engine around a shared mock.
pub fn mock_engine(mock: &Arc<MockAdapter>) -> BatchEngine {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::clone(mock) as Arc<dyn CodecAdapter>);
    BatchEngine::new(registry)
}

pub fn assert_counts(result: &BatchResult) {
    assert_eq!(
        result.successful + result.failed + result.skipped,
        result.total,
        "counts do not add up: {result:?}"
    );
    assert_eq!(result.entries.len(), result.total);
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A latch that blocks conversions until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

/// PNG-to-PNG adapter that copies bytes and counts invocations.
#[derive(Default)]
pub struct MockAdapter {
    calls: AtomicUsize,
    gate: Option<Gate>,
    corrupt: AtomicBool,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A mock whose conversions block until [`MockAdapter::release`].
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Gate::default()),
            ..Self::default()
        })
    }

    /// A mock that writes bytes which are not a PNG until told otherwise.
    pub fn corrupting() -> Arc<Self> {
        let mock = Self::default();
        mock.corrupt.store(true, Ordering::SeqCst);
        Arc::new(mock)
    }

    pub fn set_corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.open();
        }
    }
}

impl CodecAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn category(&self) -> FileCategory {
        FileCategory::Image
    }

    fn input_formats(&self) -> &[&'static str] {
        &["png"]
    }

    fn output_formats(&self) -> &[&'static str] {
        &["png"]
    }

    fn convert(
        &self,
        source: &Path,
        dest: &Path,
        _options: &ConversionOptions,
    ) -> fileforge_codecs::Result<FileDescriptor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if self.corrupt.load(Ordering::SeqCst) {
            std::fs::write(dest, b"garbage")?;
        } else {
            std::fs::copy(source, dest)?;
        }
        Ok(FileDescriptor::snapshot(dest)?)
    }
}

/// Create `count` PNGs named `img_00.png`, `img_01.png`, ... in `dir`.
pub fn png_set(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("img_{i:02}.png"));
            write_png(&path, 4, 4);
            path
        })
        .collect()
}
