//! Frame sequence generators
//!
//! Both generators walk the same `FrameClock` and emit exactly one frame per
//! query, in frame order, through a bounded channel. Sends are awaited so a
//! slow sink slows rendering down instead of losing frames.

use std::sync::Arc;

use contracts::{FrameClock, FrameKind, GeoService, ImageData, RenderedFrame, SyncQuery, Track};
use sync_engine::Synchronizer;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::error::{RenderError, Result};
use crate::geocode_cache::GeocodeCache;
use crate::map_track::{MapLayout, MapRenderer, MapTrackState};
use crate::overlay::OverlayRenderer;

async fn emit(
    tx: &mpsc::Sender<RenderedFrame>,
    session_id: &str,
    kind: FrameKind,
    query: SyncQuery,
    image: ImageData,
    sent: u64,
) -> Result<()> {
    let frame = RenderedFrame {
        session_id: session_id.to_string(),
        kind,
        frame_index: query.frame_index,
        timestamp: query.at,
        image,
    };
    tx.send(frame).await.map_err(|_| RenderError::ChannelClosed {
        kind: kind.as_str(),
        sent,
    })
}

/// Overlay panel sequence with optional place names
pub struct OverlayGenerator<G> {
    renderer: OverlayRenderer,
    places: Option<(Arc<G>, Arc<GeocodeCache>)>,
}

impl<G: GeoService + Sync> OverlayGenerator<G> {
    pub fn new(renderer: OverlayRenderer) -> Self {
        Self {
            renderer,
            places: None,
        }
    }

    /// Resolve place names through `geo`, sharing `cache` across sessions
    pub fn with_geocoding(mut self, geo: Arc<G>, cache: Arc<GeocodeCache>) -> Self {
        self.places = Some((geo, cache));
        self
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    /// Render every frame of `clock`, returns the number of frames sent
    #[instrument(
        name = "render_overlay",
        skip(self, sync, clock, tx),
        fields(session = %session_id, frames = clock.frame_count())
    )]
    pub async fn run(
        &self,
        session_id: &str,
        sync: &Synchronizer,
        clock: &FrameClock,
        tx: &mpsc::Sender<RenderedFrame>,
    ) -> Result<u64> {
        let mut sent = 0u64;
        for query in clock.queries() {
            let position = sync.resolve_query(&query);
            let place = match (&self.places, position.fix()) {
                (Some((geo, cache)), Some(fix)) => {
                    cache
                        .place_name(geo.as_ref(), fix.sample.latitude, fix.sample.longitude)
                        .await
                }
                _ => None,
            };
            let image = self.renderer.render(&position, query.at, place.as_deref());
            emit(tx, session_id, FrameKind::Overlay, query, image, sent).await?;
            sent += 1;
        }

        metrics::counter!("dashtrack_frames_rendered_total", "kind" => "overlay").increment(sent);
        info!(frames = sent, "overlay sequence rendered");
        Ok(sent)
    }
}

/// Moving-map sequence over a prefetched basemap
pub struct MapTrackGenerator {
    renderer: MapRenderer,
}

impl MapTrackGenerator {
    pub fn new(renderer: MapRenderer) -> Self {
        Self { renderer }
    }

    /// Fetch the basemap covering `track` and build the generator.
    ///
    /// # Errors
    /// `BasemapUnavailable` from the geo service; the caller drops the map
    /// artifact for this session.
    #[instrument(name = "fetch_basemap", skip(layout, track, geo), fields(session = %track.session_id(), zoom = layout.zoom))]
    pub async fn prepare<G: GeoService + Sync>(
        layout: MapLayout,
        track: &Track,
        geo: &G,
    ) -> Result<Self> {
        let request = layout.basemap_request(track);
        let basemap = geo.fetch_basemap(&request).await?;
        debug!(
            tiles = basemap.tiles.len(),
            missing = basemap.missing_tiles,
            service = geo.name(),
            "basemap ready"
        );
        Ok(Self::new(MapRenderer::new(layout, Arc::new(basemap))))
    }

    pub fn renderer(&self) -> &MapRenderer {
        &self.renderer
    }

    /// Render every frame of `clock`, returns the number of frames sent
    #[instrument(
        name = "render_map",
        skip(self, sync, clock, tx),
        fields(session = %session_id, frames = clock.frame_count())
    )]
    pub async fn run(
        &self,
        session_id: &str,
        sync: &Synchronizer,
        clock: &FrameClock,
        tx: &mpsc::Sender<RenderedFrame>,
    ) -> Result<u64> {
        let mut state = MapTrackState::new(self.renderer.clone());
        let mut sent = 0u64;
        for query in clock.queries() {
            let position = sync.resolve_query(&query);
            let image = state.next_frame(position.fix());
            emit(tx, session_id, FrameKind::Map, query, image, sent).await?;
            sent += 1;
        }

        metrics::counter!("dashtrack_frames_rendered_total", "kind" => "map").increment(sent);
        info!(frames = sent, "map sequence rendered");
        Ok(sent)
    }
}
