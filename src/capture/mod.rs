//! Camera capture: blocking frame sources feeding a broadcast channel.
//!
//! A [`FrameSource`] produces one JPEG-encoded frame per call. Capture runs
//! on a dedicated thread at a configured rate; every MJPEG client subscribes
//! to the resulting broadcast channel independently, and slow clients lag
//! rather than stalling the capture loop.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// One camera. Implementations may block in `next_frame`.
pub trait FrameSource: Send {
    /// Block until the next JPEG-encoded frame is available.
    fn next_frame(&mut self) -> Result<Bytes>;
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target frames per second
    pub fps: u32,
    /// Broadcast buffer depth before slow subscribers start losing frames
    pub buffer_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            buffer_capacity: 8,
        }
    }
}

/// Handle to a running capture loop.
#[derive(Clone)]
pub struct CameraHandle {
    frames: broadcast::Sender<Bytes>,
}

impl CameraHandle {
    /// Subscribe to captured frames
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.frames.subscribe()
    }
}

/// Start capturing from `source` on a dedicated thread.
///
/// The loop runs until the source fails; frames sent while no client is
/// subscribed are discarded.
pub fn spawn(mut source: Box<dyn FrameSource>, config: CaptureConfig) -> CameraHandle {
    let (tx, _) = broadcast::channel(config.buffer_capacity.max(1));
    let handle = CameraHandle { frames: tx.clone() };
    let interval = Duration::from_secs_f64(1.0 / config.fps.max(1) as f64);

    let spawned = std::thread::Builder::new()
        .name("camera-capture".into())
        .spawn(move || loop {
            match source.next_frame() {
                Ok(frame) => {
                    // send only fails with zero subscribers
                    if tx.send(frame).is_err() {
                        debug!("No MJPEG subscribers, frame discarded");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Camera frame capture failed, stopping");
                    break;
                }
            }
            std::thread::sleep(interval);
        });

    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start capture thread");
    }

    handle
}

/// Synthetic frame source for development and tests.
///
/// Emits structurally valid JPEG streams (SOI, comment segment, EOI) with a
/// frame counter in the comment. Not a decodable image; stands in for real
/// hardware the same way a test pattern generator would.
pub struct TestPattern {
    counter: u64,
}

impl TestPattern {
    pub fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for TestPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for TestPattern {
    fn next_frame(&mut self) -> Result<Bytes> {
        self.counter += 1;
        let comment = format!("yamabiko test frame {}", self.counter);

        let mut buf = Vec::with_capacity(comment.len() + 8);
        buf.extend_from_slice(&[0xFF, 0xD8]); // SOI
        buf.extend_from_slice(&[0xFF, 0xFE]); // COM
        buf.extend_from_slice(&((comment.len() + 2) as u16).to_be_bytes());
        buf.extend_from_slice(comment.as_bytes());
        buf.extend_from_slice(&[0xFF, 0xD9]); // EOI

        Ok(Bytes::from(buf))
    }
}
