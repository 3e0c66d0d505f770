// Built-in pipelines offered on first run

use super::{PipelineItem, PipelineLibrary, Result};

pub fn default_templates() -> Vec<PipelineItem> {
    vec![
        PipelineItem::new(
            "VAST",
            "udpsrc address=239.255.1.2 port=1650 multicast-iface=tun0 ! \
             application/x-rtp,media=video,clock-rate=90000,encoding-name=AV1 ! \
             rtpjitterbuffer latency=100 ! rtpav1depay ! av1parse ! dav1ddec n-threads=8 ! autovideosink",
        )
        .favorite(),
        PipelineItem::new(
            "CDS_HIGH_LOW",
            "udpsrc address=224.0.1.2 port=3000 ! queue2 ! tsparse ! tsdemux ! h264parse ! avdec_h264 ! glimagesink",
        )
        .favorite(),
    ]
}

/// Seed an empty library with the templates. Returns how many were added.
pub fn load_defaults_if_empty(library: &PipelineLibrary) -> Result<usize> {
    let mut items = library.load()?;
    if !items.is_empty() {
        return Ok(0);
    }
    items = default_templates();
    library.save(&items)?;
    log::info!("Seeded pipeline library with {} templates", items.len());
    Ok(items.len())
}
