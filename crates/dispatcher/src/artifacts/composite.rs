//! Composite plan for the external video compositing step
//!
//! Describes inputs and an ffmpeg-style filter graph; nothing here runs the
//! external tool.

use std::path::{Path, PathBuf};

use contracts::ArtifactPatterns;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::write_json;
use crate::error::Result;

pub const COMPOSITE_FILE: &str = "composite.json";

/// Picture-in-picture placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeLayout {
    /// Rear picture is scaled down by this divisor, placed top-right
    pub rear_divisor: u32,
    /// Map window scale, placed bottom-left
    pub map_scale: f64,
    /// Gap between the map window and the bottom edge
    pub map_margin_px: u32,
}

impl Default for CompositeLayout {
    fn default() -> Self {
        Self {
            rear_divisor: 4,
            map_scale: 0.8,
            map_margin_px: 55,
        }
    }
}

/// One input of the compositing command, in input-index order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompositeInput {
    /// Segment files played back to back
    Concat { role: String, files: Vec<String> },
    /// PNG sequence relative to the session directory
    ImageSequence {
        artifact: String,
        pattern: String,
        frame_rate: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositePlan {
    pub session_id: String,
    pub frame_rate: f64,
    pub front: Vec<String>,
    pub rear: Vec<String>,
    pub inputs: Vec<CompositeInput>,
    pub filter_graph: String,
    /// Label of the final video stream in `filter_graph`
    pub output_label: String,
    /// Audio is taken from input 0
    pub audio_input: usize,
}

struct Stage {
    inputs: String,
    filter: String,
    output: String,
}

impl CompositePlan {
    pub fn build(
        session_id: impl Into<String>,
        front: Vec<String>,
        rear: Vec<String>,
        artifacts: &ArtifactPatterns,
        frame_rate: f64,
        layout: &CompositeLayout,
    ) -> Self {
        let mut inputs = vec![CompositeInput::Concat {
            role: "front".into(),
            files: front.clone(),
        }];
        let mut stages = Vec::new();
        let mut current = "0:v".to_string();

        if !rear.is_empty() {
            let index = inputs.len();
            inputs.push(CompositeInput::Concat {
                role: "rear".into(),
                files: rear.clone(),
            });
            let div = layout.rear_divisor;
            stages.push(Stage {
                inputs: format!("[{index}:v]"),
                filter: format!("scale=iw/{div}:ih/{div}"),
                output: "rear".into(),
            });
            stages.push(Stage {
                inputs: format!("[{current}][rear]"),
                filter: "overlay=W-w:0:shortest=1".into(),
                output: "front_rear".into(),
            });
            current = "front_rear".into();
        }

        if let Some(pattern) = &artifacts.map {
            let index = inputs.len();
            inputs.push(CompositeInput::ImageSequence {
                artifact: "map".into(),
                pattern: pattern.clone(),
                frame_rate,
            });
            let scale = layout.map_scale;
            stages.push(Stage {
                inputs: format!("[{index}:v]"),
                filter: format!("scale=iw*{scale}:ih*{scale}"),
                output: "map".into(),
            });
            stages.push(Stage {
                inputs: format!("[{current}][map]"),
                filter: format!("overlay=x=0:y=H-h-{}", layout.map_margin_px),
                output: "with_map".into(),
            });
            current = "with_map".into();
        }

        if let Some(pattern) = &artifacts.overlay {
            let index = inputs.len();
            inputs.push(CompositeInput::ImageSequence {
                artifact: "overlay".into(),
                pattern: pattern.clone(),
                frame_rate,
            });
            stages.push(Stage {
                inputs: format!("[{current}][{index}:v]"),
                filter: "overlay=x=W-w:y=H-h".into(),
                output: "with_overlay".into(),
            });
        }

        let output_label = "outv".to_string();
        match stages.last_mut() {
            Some(last) => last.output = output_label.clone(),
            None => stages.push(Stage {
                inputs: "[0:v]".into(),
                filter: "null".into(),
                output: output_label.clone(),
            }),
        }
        let filter_graph = stages
            .iter()
            .map(|s| format!("{}{}[{}]", s.inputs, s.filter, s.output))
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            session_id: session_id.into(),
            frame_rate,
            front,
            rear,
            inputs,
            filter_graph,
            output_label,
            audio_input: 0,
        }
    }

    /// Write `composite.json` into the session directory
    #[instrument(name = "write_composite_plan", skip(self, session_dir), fields(session = %self.session_id))]
    pub fn write(&self, session_dir: &Path) -> Result<PathBuf> {
        let path = session_dir.join(COMPOSITE_FILE);
        write_json(&path, self)?;
        debug!(path = %path.display(), inputs = self.inputs.len(), "composite plan written");
        Ok(path)
    }
}
