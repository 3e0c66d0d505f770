// Saved pipeline entries

use serde::{Deserialize, Serialize};

/// One saved pipeline. Serialized with camelCase keys; times are epoch
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineItem {
    pub id: String,
    pub name: String,
    pub pipeline: String,
    pub created_time: i64,
    pub last_used_time: i64,
    pub is_favorite: bool,
}

impl PipelineItem {
    /// Fresh entry with a new id, created and last used now
    pub fn new(name: impl Into<String>, pipeline: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            pipeline: pipeline.into(),
            created_time: now,
            last_used_time: now,
            is_favorite: false,
        }
    }

    pub fn favorite(mut self) -> Self {
        self.is_favorite = true;
        self
    }

    pub fn category(&self) -> PipelineCategory {
        PipelineCategory::detect(&self.pipeline)
    }

    pub fn category_color(&self) -> u32 {
        self.category().color()
    }

    pub fn mark_used(&mut self) {
        self.last_used_time = now_millis();
    }
}

/// Coarse classification of a pipeline by its source elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineCategory {
    Test,
    Rtsp,
    Udp,
    File,
    Effects,
    Custom,
}

impl PipelineCategory {
    pub fn detect(pipeline: &str) -> Self {
        if pipeline.contains("videotestsrc") {
            Self::Test
        } else if pipeline.contains("rtspsrc") {
            Self::Rtsp
        } else if pipeline.contains("udpsrc") {
            Self::Udp
        } else if pipeline.contains("filesrc") {
            Self::File
        } else if ["edge", "aging", "mixer"].iter().any(|fx| pipeline.contains(fx)) {
            Self::Effects
        } else {
            Self::Custom
        }
    }

    /// ARGB badge colour
    pub fn color(&self) -> u32 {
        match self {
            Self::Test => 0xFFFF_9800,
            Self::Rtsp => 0xFF03_A9F4,
            Self::Udp => 0xFF4C_AF50,
            Self::Custom => 0xFF9C_27B0,
            Self::File | Self::Effects => 0xFF90_A4AE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Rtsp => "rtsp",
            Self::Udp => "udp",
            Self::File => "file",
            Self::Effects => "effects",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for PipelineCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
