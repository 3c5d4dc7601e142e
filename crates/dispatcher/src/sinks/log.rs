//! LogSink - frame headers to tracing, no pixels written
//!
//! Useful for dry conversions: the timeline and renderers run in full while
//! nothing touches the disk.

use std::collections::BTreeMap;

use contracts::{ContractError, FrameKind, FrameSink, RenderedFrame};
use tracing::{debug, info, instrument};

pub struct LogSink {
    name: String,
    /// (session, kind) -> (frames, last index)
    sequences: BTreeMap<(String, FrameKind), (u64, u64)>,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequences: BTreeMap::new(),
        }
    }

    /// Frames seen for one sequence
    pub fn frames_of(&self, session_id: &str, kind: FrameKind) -> u64 {
        self.sequences
            .get(&(session_id.to_string(), kind))
            .map_or(0, |(frames, _)| *frames)
    }
}

impl FrameSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, frame),
        fields(sink = %self.name, frame_index = frame.frame_index)
    )]
    async fn write(&mut self, frame: &RenderedFrame) -> Result<(), ContractError> {
        let entry = self
            .sequences
            .entry((frame.session_id.clone(), frame.kind))
            .or_insert((0, frame.frame_index));
        if entry.0 == 0 {
            info!(
                session = %frame.session_id,
                kind = frame.kind.as_str(),
                width = frame.image.width,
                height = frame.image.height,
                "Sequence started"
            );
        }
        entry.0 += 1;
        entry.1 = frame.frame_index;
        debug!(
            session = %frame.session_id,
            kind = frame.kind.as_str(),
            timestamp = %frame.timestamp,
            "Frame"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        for ((session, kind), (frames, last)) in &self.sequences {
            info!(session = %session, kind = kind.as_str(), frames, last_index = last, "Sequence closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_frame;

    #[tokio::test]
    async fn test_sequences_are_tracked() {
        let mut sink = LogSink::new("console");
        for i in 0..3 {
            sink.write(&test_frame(i)).await.unwrap();
        }
        let mut map = test_frame(0);
        map.kind = FrameKind::Map;
        sink.write(&map).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(sink.frames_of("trip_front", FrameKind::Overlay), 3);
        assert_eq!(sink.frames_of("trip_front", FrameKind::Map), 1);
        assert_eq!(sink.frames_of("other", FrameKind::Map), 0);
    }
}
