//! Dispatcher - fans rendered frames out to every configured sink

use std::path::Path;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{FrameKind, RenderedFrame, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{LogSink, PngSequenceSink};

/// Start one worker per configured sink; file sinks default to `output_dir`
#[instrument(name = "dispatcher_open_sinks", skip_all, fields(sinks = configs.len()))]
fn open_sinks(configs: &[SinkConfig], output_dir: &Path) -> Result<Vec<SinkHandle>, DispatcherError> {
    configs
        .iter()
        .map(|config| {
            debug!(sink = %config.name, sink_type = ?config.sink_type, "Opening sink");
            match config.sink_type {
                SinkType::Log => Ok(SinkHandle::spawn(
                    LogSink::new(&config.name),
                    config.queue_capacity,
                )),
                SinkType::Png => {
                    PngSequenceSink::from_params(&config.name, &config.params, output_dir)
                        .map(|sink| SinkHandle::spawn(sink, config.queue_capacity))
                        .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))
                }
            }
        })
        .collect()
}

/// What a finished dispatcher delivered
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub frames: u64,
    pub overlay_frames: u64,
    pub map_frames: u64,
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl DispatchSummary {
    pub fn frames_of(&self, kind: FrameKind) -> u64 {
        match kind {
            FrameKind::Overlay => self.overlay_frames,
            FrameKind::Map => self.map_frames,
        }
    }

    /// Every sink wrote every frame
    pub fn is_clean(&self) -> bool {
        self.sinks.iter().all(|(_, snapshot)| snapshot.is_clean())
    }

    fn count(&mut self, kind: FrameKind) {
        self.frames += 1;
        match kind {
            FrameKind::Overlay => self.overlay_frames += 1,
            FrameKind::Map => self.map_frames += 1,
        }
    }
}

/// Consumes the session's frame channel until every renderer has hung up
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<RenderedFrame>,
}

impl Dispatcher {
    /// Dispatcher over already running sink handles
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<RenderedFrame>) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Fan every frame out, waiting on full sink queues, then drain the sinks.
    #[instrument(name = "dispatcher_run", skip(self), fields(sinks = self.handles.len()))]
    pub async fn run(mut self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        while let Some(frame) = self.input_rx.recv().await {
            summary.count(frame.kind);
            // the last sink takes the frame itself, the others a clone
            if let Some((last, rest)) = self.handles.split_last() {
                for handle in rest {
                    handle.send(frame.clone()).await;
                }
                last.send(frame).await;
            }
            if summary.frames.is_multiple_of(500) {
                debug!(frames = summary.frames, "Dispatch progress");
            }
        }

        // queued writes land during shutdown, so snapshots are taken after it
        for handle in self.handles {
            let name = handle.name().to_string();
            let snapshot = handle.shutdown().await;
            summary.sinks.push((name, snapshot));
        }

        info!(
            overlay = summary.overlay_frames,
            map = summary.map_frames,
            clean = summary.is_clean(),
            "Frames dispatched"
        );
        summary
    }

    pub fn spawn(self) -> JoinHandle<DispatchSummary> {
        tokio::spawn(self.run())
    }
}

/// Open the configured sinks and wrap them around `input_rx`
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    output_dir: &Path,
    input_rx: mpsc::Receiver<RenderedFrame>,
) -> Result<Dispatcher, DispatcherError> {
    let handles = open_sinks(&sink_configs, output_dir)?;
    Ok(Dispatcher::with_handles(handles, input_rx))
}
