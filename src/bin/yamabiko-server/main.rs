//! Yamabiko Server Binary
//!
//! Runs the signaling relay and, when credentials are configured, the
//! MJPEG camera preview endpoint.
//!
//! ## Usage
//!
//! ```bash
//! # Run with defaults (signaling only, port 7860)
//! yamabiko-server
//!
//! # Serve a static UI alongside the relay
//! YAMABIKO_UI_DIR=./ui yamabiko-server
//!
//! # Enable the camera preview (test pattern source)
//! YAMABIKO_CAMERA_USER=operator YAMABIKO_CAMERA_PASS=secret yamabiko-server
//!
//! # With verbose logging
//! RUST_LOG=yamabiko=debug yamabiko-server
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use yamabiko::capture::{self, CaptureConfig, TestPattern};
use yamabiko::server::Registry;
use yamabiko::web::{self, CameraCreds};

/// Server configuration from environment
struct Config {
    /// Address to bind the HTTP server to
    bind: SocketAddr,
    /// Optional directory of static UI files
    ui_dir: Option<PathBuf>,
    /// Camera preview credentials; preview disabled when unset
    camera_creds: Option<CameraCreds>,
    /// Camera capture rate
    camera_fps: u32,
}

impl Config {
    fn from_env() -> Result<Self> {
        let bind = std::env::var("YAMABIKO_BIND")
            .unwrap_or_else(|_| "0.0.0.0:7860".to_string())
            .parse()
            .context("Invalid YAMABIKO_BIND address")?;

        let ui_dir = std::env::var("YAMABIKO_UI_DIR").ok().map(PathBuf::from);

        let camera_creds = match (
            std::env::var("YAMABIKO_CAMERA_USER").ok(),
            std::env::var("YAMABIKO_CAMERA_PASS").ok(),
        ) {
            (Some(user), Some(pass)) => Some(CameraCreds { user, pass }),
            _ => None,
        };

        let camera_fps: u32 = std::env::var("YAMABIKO_CAMERA_FPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        Ok(Self {
            bind,
            ui_dir,
            camera_creds,
            camera_fps,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("yamabiko=info".parse().unwrap()),
        )
        .init();

    let config = Config::from_env()?;

    let registry = Registry::new();

    // Camera opens at startup and runs for the process lifetime
    let camera = config.camera_creds.as_ref().map(|_| {
        info!(fps = config.camera_fps, "Starting camera capture (test pattern)");
        capture::spawn(
            Box::new(TestPattern::new()),
            CaptureConfig {
                fps: config.camera_fps,
                ..CaptureConfig::default()
            },
        )
    });

    web::start(
        registry,
        config.bind,
        config.ui_dir,
        camera,
        config.camera_creds,
    )
    .await
}
