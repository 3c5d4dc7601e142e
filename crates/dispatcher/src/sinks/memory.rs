//! MemorySink - keeps frames in memory, for tests and dry runs

use std::sync::{Arc, Mutex};

use contracts::{ContractError, FrameKind, FrameSink, RenderedFrame};
use tracing::debug;

/// Collects every written frame behind a shared handle
#[derive(Clone, Default)]
pub struct MemorySink {
    name: String,
    frames: Arc<Mutex<Vec<RenderedFrame>>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Arc::default(),
        }
    }

    /// Copy of everything written so far
    pub fn frames(&self) -> Vec<RenderedFrame> {
        self.frames
            .lock()
            .map(|frames| frames.clone())
            .unwrap_or_default()
    }

    /// Frames of one kind, in arrival order
    pub fn frames_of(&self, kind: FrameKind) -> Vec<RenderedFrame> {
        self.frames()
            .into_iter()
            .filter(|frame| frame.kind == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, frame: &RenderedFrame) -> Result<(), ContractError> {
        self.frames
            .lock()
            .map_err(|_| ContractError::sink_write(&self.name, "frame store poisoned"))?
            .push(frame.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, frames = self.len(), "MemorySink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frame;

    #[tokio::test]
    async fn clones_share_storage() {
        let sink = MemorySink::new("mem");
        let mut writer = sink.clone();
        writer.write(&test_frame(0)).await.unwrap();
        writer.write(&test_frame(1)).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.frames_of(FrameKind::Overlay).len(), 2);
        assert!(sink.frames_of(FrameKind::Map).is_empty());
    }
}
