//! GStreamer initialization
//!
//! One process-wide `gst::init`, with the outcome remembered so every
//! engine constructed later sees the same result.

use std::sync::OnceLock;

static GSTREAMER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize GStreamer once per process.
///
/// Must be called before any GStreamer function is used.
pub fn init_gstreamer_env() -> Result<(), String> {
    GSTREAMER_INIT
        .get_or_init(|| match gstreamer::init() {
            Ok(()) => {
                log::info!("GStreamer initialized successfully");
                log_gstreamer_version();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to initialize GStreamer: {}", e);
                log::error!("Pipelines cannot be built with the GStreamer engine");
                Err(e.to_string())
            }
        })
        .clone()
}

fn log_gstreamer_version() {
    let (major, minor, micro, nano) = gstreamer::version();
    let nano_str = match nano {
        0 => String::new(),
        1 => " (CVS)".to_string(),
        2 => " (prerelease)".to_string(),
        _ => format!(" (nano: {})", nano),
    };
    log::info!("GStreamer version: {}.{}.{}{}", major, minor, micro, nano_str);
}
