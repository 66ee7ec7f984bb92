//! Annotation engine
//!
//! Owns the loaded document, view state, balloon store and the two
//! background coordinators, and exposes the operations a presentation
//! layer drives. Everything here runs on one logical thread; resolution
//! results only touch the store when they are merged through
//! [`AnnotationEngine::poll_events`], [`AnnotationEngine::next_event`] or
//! [`AnnotationEngine::settle`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collaborators::{
    DocumentGenerator, PdfRenderer, PixelPoint, RenderedPage, TextResolver,
};
use crate::config::{EngineConfig, OutOfBoundsPolicy, PlacementConfig};
use crate::coords::{to_document_space, to_viewport_space, DocPoint, ViewportBounds, ViewportPoint};
use crate::document::{next_epoch, DocumentHandle, Epoch};
use crate::error::BalloonError;
use crate::export::{Artifact, ExportCoordinator};
use crate::orchestrator::{ResolutionOrchestrator, ResolutionOutcome, ResolutionTicket};
use crate::registry::TypeRegistry;
use crate::store::{Balloon, BalloonId, BalloonRecord, BalloonStore, Generation, MergeOutcome};
use crate::view::{Orientation, ViewState};

/// Why a resolution result was dropped instead of merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// The balloon was moved after the request was issued
    Superseded,
    /// The balloon was removed
    Removed,
    /// The document was replaced or the balloons reset
    EpochChanged,
}

/// What happened when a resolution outcome was merged
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Resolved {
        balloon_id: BalloonId,
        candidates: Vec<String>,
    },
    ResolutionFailed {
        balloon_id: BalloonId,
        error: String,
    },
    Discarded {
        balloon_id: BalloonId,
        reason: DiscardReason,
    },
}

pub struct AnnotationEngine {
    renderer: Arc<dyn PdfRenderer>,
    orchestrator: ResolutionOrchestrator,
    exporter: ExportCoordinator,
    placement: PlacementConfig,
    document: Option<DocumentHandle>,
    page: Option<RenderedPage>,
    view: ViewState,
    store: BalloonStore,
    selected_type: String,
    epoch: Epoch,
    /// Top-left corner of the drawn page in viewport pixels
    origin: (f64, f64),
}

impl AnnotationEngine {
    pub fn new(
        config: &EngineConfig,
        renderer: Arc<dyn PdfRenderer>,
        resolver: Arc<dyn TextResolver>,
        generator: Arc<dyn DocumentGenerator>,
    ) -> Result<Self, BalloonError> {
        config
            .validate()
            .map_err(|e| BalloonError::Validation(format!("{:#}", e)))?;
        let types = TypeRegistry::with_defaults(config.types.defaults.iter().cloned());
        let selected_type = types.first().unwrap_or_default().to_string();
        let exporter = ExportCoordinator::new(generator, config.backend.generate_timeout())
            .with_template(config.export.template.clone())
            .with_report_filename(config.export.report_filename.clone())
            .with_separator(config.export.text_separator.clone());

        Ok(Self {
            renderer,
            orchestrator: ResolutionOrchestrator::new(resolver, config.backend.resolve_timeout()),
            exporter,
            placement: config.placement.clone(),
            document: None,
            page: None,
            view: ViewState::with_zoom_limits(
                config.view.min_zoom,
                config.view.max_zoom,
                config.view.zoom_step,
            ),
            store: BalloonStore::new(types),
            selected_type,
            epoch: next_epoch(),
            origin: (0.0, 0.0),
        })
    }

    /// Replace the current document. Clears every balloon, resets the
    /// view and orphans any resolution still in flight.
    pub fn load_document(&mut self, document: DocumentHandle) -> Result<(), BalloonError> {
        let size = self.renderer.intrinsic_page_size(&document)?;
        let mut view = self.view.clone();
        view.reset();
        view.page_size_known(size.width, size.height);
        let page = self.renderer.render(&document, view.zoom())?;

        self.view = view;
        self.page = Some(page);
        self.store.reset_all();
        self.epoch = document.epoch();
        info!(
            name = document.name(),
            pages = document.page_count(),
            width = size.width,
            height = size.height,
            epoch = self.epoch,
            orientation = ?self.view.orientation(),
            "Document loaded"
        );
        self.document = Some(document);
        Ok(())
    }

    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref()
    }

    /// Where the page's top-left corner sits in the viewport
    pub fn set_viewport_origin(&mut self, left: f64, top: f64) {
        self.origin = (left, top);
    }

    /// Bounding box of the page as currently drawn
    pub fn viewport_bounds(&self) -> Option<ViewportBounds> {
        let page = self.page.as_ref()?;
        let turned = self.view.rotation.is_quarter_turn() != self.view.orientation_swapped();
        let (width, height) = if turned {
            (page.pixel_height, page.pixel_width)
        } else {
            (page.pixel_width, page.pixel_height)
        };
        Some(ViewportBounds::new(self.origin.0, self.origin.1, width, height))
    }

    /// Place a balloon of the selected type under the pointer and start
    /// resolving its text. Must be called inside a tokio runtime.
    pub fn click(&mut self, point: ViewportPoint) -> Result<BalloonId, BalloonError> {
        let position = self.locate(point)?;
        let kind = self.selected_type.clone();
        let balloon = self.store.place(kind, position);
        let (id, generation) = (balloon.id, balloon.generation());
        info!(balloon_id = id, generation, nx = balloon.position.nx, ny = balloon.position.ny, "Balloon placed");
        self.request_resolution(id, generation);
        Ok(id)
    }

    /// Move a balloon under the pointer and re-resolve it. Unknown ids are
    /// a no-op and return `Ok(false)`.
    pub fn drag_to(&mut self, id: BalloonId, point: ViewportPoint) -> Result<bool, BalloonError> {
        let position = self.locate(point)?;
        match self.store.move_to(id, position) {
            Some(generation) => {
                debug!(balloon_id = id, generation, "Balloon moved");
                self.request_resolution(id, generation);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn relabel(&mut self, id: BalloonId, kind: impl Into<String>) -> bool {
        self.store.relabel(id, kind)
    }

    pub fn set_label(&mut self, id: BalloonId, label: Option<String>) -> bool {
        self.store.set_label(id, label)
    }

    pub fn remove(&mut self, id: BalloonId) -> bool {
        let removed = self.store.remove(id);
        if removed {
            debug!(balloon_id = id, "Balloon removed");
        }
        removed
    }

    /// Drop all balloons; results still in flight will be discarded
    pub fn reset_all(&mut self) {
        self.store.reset_all();
        self.epoch = next_epoch();
        info!(epoch = self.epoch, "Balloons reset");
    }

    /// Register a new type and select it. Duplicates change nothing.
    pub fn add_custom_type(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if !self.store.add_custom_type(label.clone()) {
            return false;
        }
        self.selected_type = label;
        true
    }

    /// Type used for the next placement; must be a registered type
    pub fn select_type(&mut self, label: &str) -> bool {
        if !self.store.types().contains(label) {
            return false;
        }
        self.selected_type = label.to_string();
        true
    }

    pub fn selected_type(&self) -> &str {
        &self.selected_type
    }

    pub fn types(&self) -> &[String] {
        self.store.types().types()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn zoom_in(&mut self) -> Result<(), BalloonError> {
        self.change_zoom(ViewState::zoom_in)
    }

    pub fn zoom_out(&mut self) -> Result<(), BalloonError> {
        self.change_zoom(ViewState::zoom_out)
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), BalloonError> {
        self.change_zoom(|view| view.set_zoom(zoom))
    }

    pub fn rotate_clockwise(&mut self) {
        self.view.rotate_clockwise();
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.view.rotate_counter_clockwise();
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.view.set_orientation(orientation);
    }

    pub fn enable_auto_orientation(&mut self) {
        self.view.enable_auto_orientation();
    }

    /// Where a balloon is drawn under the current view
    pub fn balloon_viewport_position(&self, id: BalloonId) -> Option<ViewportPoint> {
        let balloon = self.store.get(id)?;
        let bounds = self.viewport_bounds()?;
        Some(to_viewport_space(balloon.position, bounds, &self.view))
    }

    pub fn balloons(&self) -> &[Balloon] {
        self.store.balloons()
    }

    /// Per-balloon records in display order
    pub fn records(&self) -> Vec<BalloonRecord> {
        self.store.snapshot()
    }

    pub fn pending_resolutions(&self) -> usize {
        self.orchestrator.in_flight()
    }

    /// Merge every resolution that has already finished
    pub fn poll_events(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(outcome) = self.orchestrator.try_next() {
            events.push(self.merge(outcome));
        }
        events
    }

    /// Wait for the next resolution and merge it; `None` once idle
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        let outcome = self.orchestrator.next().await?;
        Some(self.merge(outcome))
    }

    /// Wait until no resolution is in flight
    pub async fn settle(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    /// Generate the report from the balloons as they are right now
    pub async fn export_report(&self) -> Result<Artifact, BalloonError> {
        let snapshot = self.store.balloons().to_vec();
        self.exporter.export_report(&snapshot).await
    }

    /// Flatten the current page raster and balloons into a PDF
    pub fn export_raster(&self) -> Result<Artifact, BalloonError> {
        let document = self.require_document()?;
        let surface = self.page.as_ref().and_then(|p| p.surface.as_deref());
        self.exporter
            .export_raster(surface, self.store.balloons(), document.stem())
    }

    fn require_document(&self) -> Result<&DocumentHandle, BalloonError> {
        self.document
            .as_ref()
            .ok_or_else(|| BalloonError::Validation("no document loaded".to_string()))
    }

    /// Render at the new zoom first; the view only changes if that works
    fn change_zoom(&mut self, change: impl FnOnce(&mut ViewState)) -> Result<(), BalloonError> {
        let mut view = self.view.clone();
        change(&mut view);
        if let Some(document) = &self.document {
            self.page = Some(self.renderer.render(document, view.zoom())?);
        }
        self.view = view;
        Ok(())
    }

    /// Pointer position to a storable document point, applying the
    /// out-of-bounds policy
    fn locate(&self, point: ViewportPoint) -> Result<DocPoint, BalloonError> {
        self.require_document()?;
        let bounds = self
            .viewport_bounds()
            .ok_or_else(|| BalloonError::Validation("page has not been rendered".to_string()))?;
        let position = to_document_space(point, bounds, &self.view);

        if self.placement.out_of_bounds == OutOfBoundsPolicy::Reject
            && position.overshoot() > self.placement.reject_tolerance
        {
            warn!(nx = position.nx, ny = position.ny, "Pointer outside the page");
            return Err(BalloonError::OutOfBounds {
                nx: position.nx,
                ny: position.ny,
            });
        }
        Ok(position.clamped())
    }

    fn request_resolution(&mut self, id: BalloonId, generation: Generation) {
        let (Some(document), Some(page), Some(balloon)) =
            (&self.document, &self.page, self.store.get(id))
        else {
            return;
        };
        let (x, y) = balloon
            .position
            .to_page_pixels(page.pixel_width, page.pixel_height);
        let ticket = ResolutionTicket {
            epoch: self.epoch,
            balloon_id: id,
            generation,
        };
        self.orchestrator.submit(
            ticket,
            document.clone(),
            PixelPoint {
                x,
                y,
                frame_width: page.pixel_width,
                frame_height: page.pixel_height,
            },
        );
    }

    fn merge(&mut self, outcome: ResolutionOutcome) -> EngineEvent {
        let ResolutionOutcome { ticket, result } = outcome;
        let balloon_id = ticket.balloon_id;
        let discarded = |reason: DiscardReason| {
            debug!(balloon_id, generation = ticket.generation, ?reason, "Resolution discarded");
            EngineEvent::Discarded { balloon_id, reason }
        };

        if ticket.epoch != self.epoch {
            return discarded(DiscardReason::EpochChanged);
        }
        match result {
            Ok(candidates) => {
                match self
                    .store
                    .merge_resolution(balloon_id, ticket.generation, candidates.clone())
                {
                    MergeOutcome::Applied => {
                        info!(balloon_id, candidates = candidates.len(), "Resolution merged");
                        EngineEvent::Resolved {
                            balloon_id,
                            candidates,
                        }
                    }
                    MergeOutcome::Stale { .. } => discarded(DiscardReason::Superseded),
                    MergeOutcome::Missing => discarded(DiscardReason::Removed),
                }
            }
            Err(error) => match self.store.merge_failure(balloon_id, ticket.generation) {
                MergeOutcome::Applied => EngineEvent::ResolutionFailed {
                    balloon_id,
                    error: error.to_string(),
                },
                MergeOutcome::Stale { .. } => discarded(DiscardReason::Superseded),
                MergeOutcome::Missing => discarded(DiscardReason::Removed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fixtures::pdf;
    use crate::document::PageSize;
    use crate::export::MappingEntry;
    use crate::render::PageGeometryRenderer;
    use crate::store::ResolutionStatus;
    use crate::surface::RasterSurface;
    use crate::view::Rotation;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    type Reply = Result<Vec<String>, BalloonError>;

    /// Resolves immediately with the pixel point it was given, unless a
    /// gate was registered for that x coordinate
    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
        gates: Mutex<HashMap<i64, oneshot::Receiver<Reply>>>,
        points: Mutex<Vec<PixelPoint>>,
    }

    impl FakeResolver {
        fn gate(&self, x: i64) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(x, rx);
            tx
        }
    }

    #[async_trait]
    impl TextResolver for FakeResolver {
        async fn resolve(&self, _: &DocumentHandle, point: PixelPoint) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.points.lock().unwrap().push(point);
            let gate = self.gates.lock().unwrap().remove(&(point.x.round() as i64));
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(BalloonError::Transport("gate dropped".into()))),
                None => Ok(vec![format!("{:.0},{:.0}", point.x, point.y)]),
            }
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentGenerator for FakeGenerator {
        async fn generate(&self, _: &str, mapping: &[MappingEntry]) -> Result<Vec<u8>, BalloonError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::to_vec(mapping).unwrap())
        }
    }

    struct Harness {
        engine: AnnotationEngine,
        resolver: Arc<FakeResolver>,
        generator: Arc<FakeGenerator>,
    }

    fn harness_with(config: EngineConfig) -> Harness {
        let resolver = Arc::new(FakeResolver::default());
        let generator = Arc::new(FakeGenerator::default());
        let surface = RasterSurface::from_rgb(4, 8, vec![255; 96]).unwrap();
        let renderer = Arc::new(PageGeometryRenderer::new(1.0).with_surface(surface));
        let mut engine =
            AnnotationEngine::new(&config, renderer, resolver.clone(), generator.clone()).unwrap();
        engine
            .load_document(DocumentHandle::load("bracket.pdf", pdf(400, 800, 0, false)).unwrap())
            .unwrap();
        Harness {
            engine,
            resolver,
            generator,
        }
    }

    fn harness() -> Harness {
        harness_with(EngineConfig::default())
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn test_click_zoom_and_back_projection() {
        let mut h = harness();
        let id = h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        assert_eq!(id, 1);
        let record = &h.engine.records()[0];
        assert!(close(record.nx, 0.25));
        assert!(close(record.ny, 0.0625));

        h.engine.set_zoom(2.0).unwrap();
        let bounds = h.engine.viewport_bounds().unwrap();
        assert_eq!((bounds.width, bounds.height), (800.0, 1600.0));
        let record = &h.engine.records()[0];
        assert!(close(record.nx, 0.25), "zoom must not move balloons");
        let p = h.engine.balloon_viewport_position(id).unwrap();
        assert!(close(p.x, 200.0) && close(p.y, 100.0));
    }

    #[tokio::test]
    async fn test_resolution_uses_pixels_at_current_zoom() {
        let mut h = harness();
        h.engine.set_zoom(2.0).unwrap();
        h.engine.click(ViewportPoint::new(200.0, 100.0)).unwrap();
        let events = h.engine.settle().await;

        assert_eq!(
            events,
            vec![EngineEvent::Resolved {
                balloon_id: 1,
                candidates: vec!["200,100".to_string()]
            }]
        );
        let point = h.resolver.points.lock().unwrap()[0];
        assert_eq!((point.frame_width, point.frame_height), (800.0, 1600.0));
        assert_eq!(h.engine.records()[0].status, ResolutionStatus::Resolved);
    }

    #[tokio::test]
    async fn test_stale_first_response_is_discarded() {
        let mut h = harness();
        let first = h.resolver.gate(100);
        let second = h.resolver.gate(300);

        let id = h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        assert!(h.engine.drag_to(id, ViewportPoint::new(300.0, 50.0)).unwrap());

        second.send(Ok(vec!["after move".into()])).unwrap();
        assert_eq!(
            h.engine.next_event().await,
            Some(EngineEvent::Resolved {
                balloon_id: id,
                candidates: vec!["after move".into()]
            })
        );

        first.send(Ok(vec!["before move".into()])).unwrap();
        assert_eq!(
            h.engine.next_event().await,
            Some(EngineEvent::Discarded {
                balloon_id: id,
                reason: DiscardReason::Superseded
            })
        );
        assert_eq!(h.engine.records()[0].resolution, vec!["after move".to_string()]);
        assert!(close(h.engine.records()[0].nx, 0.75));
    }

    #[tokio::test]
    async fn test_stale_response_before_move_resolves_leaves_pending() {
        let mut h = harness();
        let first = h.resolver.gate(100);
        let _second = h.resolver.gate(300);

        let id = h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        h.engine.drag_to(id, ViewportPoint::new(300.0, 50.0)).unwrap();
        first.send(Ok(vec!["old".into()])).unwrap();

        let event = h.engine.next_event().await.unwrap();
        assert!(matches!(event, EngineEvent::Discarded { .. }));
        let record = &h.engine.records()[0];
        assert!(record.resolution.is_empty());
        assert_eq!(record.status, ResolutionStatus::Pending);
    }

    #[tokio::test]
    async fn test_failure_leaves_resolution_empty_without_retry() {
        let mut h = harness();
        let gate = h.resolver.gate(100);
        h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        gate.send(Err(BalloonError::Transport("connection refused".into())))
            .unwrap();

        let events = h.engine.settle().await;
        assert!(matches!(
            events.as_slice(),
            [EngineEvent::ResolutionFailed { balloon_id: 1, .. }]
        ));
        let record = &h.engine.records()[0];
        assert!(record.resolution.is_empty());
        assert_eq!(record.status, ResolutionStatus::Failed);
        assert_eq!(h.resolver.calls.load(Ordering::SeqCst), 1);

        // Interaction continues normally
        assert_eq!(h.engine.click(ViewportPoint::new(10.0, 10.0)).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_removed_balloon_result_is_dropped() {
        let mut h = harness();
        let gate = h.resolver.gate(100);
        let id = h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        assert!(h.engine.remove(id));
        gate.send(Ok(vec!["x".into()])).unwrap();

        assert_eq!(
            h.engine.settle().await,
            vec![EngineEvent::Discarded {
                balloon_id: id,
                reason: DiscardReason::Removed
            }]
        );
        assert!(h.engine.records().is_empty());
    }

    #[tokio::test]
    async fn test_document_reload_orphans_in_flight_results() {
        let mut h = harness();
        let gate = h.resolver.gate(100);
        h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        h.engine.set_zoom(3.0).unwrap();
        h.engine.rotate_clockwise();

        h.engine
            .load_document(DocumentHandle::load("other.pdf", pdf(800, 400, 0, false)).unwrap())
            .unwrap();
        assert!(h.engine.records().is_empty());
        assert_eq!(h.engine.view().zoom(), 1.0);
        assert_eq!(h.engine.view().rotation, Rotation::Deg0);
        assert_eq!(h.engine.view().orientation(), Orientation::Landscape);

        // Same id on the new document; the old result must not land on it
        let id = h.engine.click(ViewportPoint::new(120.0, 50.0)).unwrap();
        assert_eq!(id, 1);
        gate.send(Ok(vec!["old document".into()])).unwrap();

        let events = h.engine.settle().await;
        assert!(events.contains(&EngineEvent::Discarded {
            balloon_id: 1,
            reason: DiscardReason::EpochChanged
        }));
        assert_ne!(h.engine.records()[0].resolution, vec!["old document".to_string()]);
    }

    #[tokio::test]
    async fn test_reset_all_restarts_ids_and_discards() {
        let mut h = harness();
        let gate = h.resolver.gate(100);
        h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        h.engine.reset_all();
        gate.send(Ok(vec!["late".into()])).unwrap();

        let events = h.engine.settle().await;
        assert_eq!(
            events,
            vec![EngineEvent::Discarded {
                balloon_id: 1,
                reason: DiscardReason::EpochChanged
            }]
        );
        assert_eq!(h.engine.click(ViewportPoint::new(5.0, 5.0)).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_out_of_bounds_clamped_by_default() {
        let mut h = harness();
        h.engine.click(ViewportPoint::new(-20.0, 900.0)).unwrap();
        let record = &h.engine.records()[0];
        assert_eq!((record.nx, record.ny), (0.0, 1.0));
    }

    #[tokio::test]
    async fn test_out_of_bounds_rejected_when_configured() {
        let mut config = EngineConfig::default();
        config.placement.out_of_bounds = OutOfBoundsPolicy::Reject;
        config.placement.reject_tolerance = 0.01;
        let mut h = harness_with(config);

        // 2px over a 400px width is within the 1% tolerance
        h.engine.click(ViewportPoint::new(402.0, 10.0)).unwrap();
        assert_eq!(h.engine.records()[0].nx, 1.0);

        let err = h.engine.click(ViewportPoint::new(-40.0, 10.0)).unwrap_err();
        assert!(matches!(err, BalloonError::OutOfBounds { .. }));
        assert_eq!(h.engine.records().len(), 1);
    }

    #[tokio::test]
    async fn test_click_without_document_is_validation_error() {
        let config = EngineConfig::default();
        let mut engine = AnnotationEngine::new(
            &config,
            Arc::new(PageGeometryRenderer::default()),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeGenerator::default()),
        )
        .unwrap();
        assert!(engine.click(ViewportPoint::new(1.0, 1.0)).unwrap_err().is_validation());
        assert!(engine.viewport_bounds().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.view.min_zoom = 3.0;
        config.view.max_zoom = 1.0;
        let err = AnnotationEngine::new(
            &config,
            Arc::new(PageGeometryRenderer::default()),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeGenerator::default()),
        )
        .err()
        .unwrap();
        assert!(err.is_validation());
        assert!(err.to_string().contains("min_zoom"));
    }

    /// Renders at zoom 1.0 only
    struct FixedZoomRenderer(PageGeometryRenderer);

    impl PdfRenderer for FixedZoomRenderer {
        fn render(&self, document: &DocumentHandle, zoom: f64) -> Result<RenderedPage, BalloonError> {
            if zoom != 1.0 {
                return Err(BalloonError::Pdf(format!("cannot render at {}", zoom)));
            }
            self.0.render(document, zoom)
        }

        fn intrinsic_page_size(&self, document: &DocumentHandle) -> Result<PageSize, BalloonError> {
            self.0.intrinsic_page_size(document)
        }
    }

    #[test]
    fn test_failed_render_keeps_zoom() {
        let mut engine = AnnotationEngine::new(
            &EngineConfig::default(),
            Arc::new(FixedZoomRenderer(PageGeometryRenderer::new(1.0))),
            Arc::new(FakeResolver::default()),
            Arc::new(FakeGenerator::default()),
        )
        .unwrap();
        engine
            .load_document(DocumentHandle::load("bracket.pdf", pdf(400, 800, 0, false)).unwrap())
            .unwrap();

        assert!(engine.zoom_in().is_err());
        assert!(engine.set_zoom(2.0).is_err());
        assert_eq!(engine.view().zoom(), 1.0);
        let bounds = engine.viewport_bounds().unwrap();
        assert_eq!((bounds.width, bounds.height), (400.0, 800.0));
    }

    #[tokio::test]
    async fn test_orientation_swap_turns_bounds() {
        let mut h = harness();
        h.engine.set_orientation(Orientation::Landscape);
        let bounds = h.engine.viewport_bounds().unwrap();
        assert_eq!((bounds.width, bounds.height), (800.0, 400.0));

        // Top-right corner of the landscape view is the page's top-left
        h.engine.click(ViewportPoint::new(800.0, 0.0)).unwrap();
        let record = &h.engine.records()[0];
        assert!(close(record.nx, 0.0) && close(record.ny, 0.0));

        h.engine.enable_auto_orientation();
        assert_eq!(h.engine.view().orientation(), Orientation::Portrait);
    }

    #[tokio::test]
    async fn test_types_and_selection() {
        let mut h = harness();
        assert_eq!(h.engine.selected_type(), "Diameter");
        assert!(h.engine.add_custom_type("Thread Pitch"));
        assert_eq!(h.engine.selected_type(), "Thread Pitch");
        assert!(h.engine.select_type("Angle"));
        assert!(!h.engine.add_custom_type("Thread Pitch"));
        assert_eq!(h.engine.selected_type(), "Angle");
        assert_eq!(
            h.engine.types().iter().filter(|t| *t == "Thread Pitch").count(),
            1
        );
        assert!(h.engine.select_type("Thread Pitch"));
        assert!(!h.engine.select_type("Unknown"));

        h.engine.click(ViewportPoint::new(10.0, 10.0)).unwrap();
        assert_eq!(h.engine.records()[0].kind, "Thread Pitch");

        let before = h.engine.records();
        assert!(!h.engine.relabel(3, "X"));
        assert_eq!(h.engine.records(), before);
        assert!(h.engine.relabel(1, "X"));
        assert_eq!(h.engine.records()[0].kind, "X");
    }

    #[tokio::test]
    async fn test_report_export_uses_snapshot() {
        let mut h = harness();
        assert!(h.engine.export_report().await.unwrap_err().is_validation());
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);

        h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        h.engine.click(ViewportPoint::new(200.0, 400.0)).unwrap();
        h.engine.settle().await;
        h.engine.set_label(2, Some("7.72".into()));

        let artifact = h.engine.export_report().await.unwrap();
        let mapping: Vec<MappingEntry> = serde_json::from_slice(&artifact.bytes).unwrap();
        assert_eq!(mapping[0].text, "100,50");
        assert_eq!(mapping[1].text, "7.72");
        assert_eq!(artifact.filename, "filled_report.docx");
    }

    #[tokio::test]
    async fn test_raster_export_named_after_document() {
        let mut h = harness();
        h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        let artifact = h.engine.export_raster().unwrap();
        assert_eq!(artifact.filename, "annotated_bracket.pdf");
        assert!(artifact.bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_poll_events_without_waiting() {
        let mut h = harness();
        assert!(h.engine.poll_events().is_empty());
        h.engine.click(ViewportPoint::new(100.0, 50.0)).unwrap();
        assert_eq!(h.engine.pending_resolutions(), 1);
        // Let the spawned resolution run
        let mut events = h.engine.poll_events();
        while events.is_empty() {
            tokio::task::yield_now().await;
            events = h.engine.poll_events();
        }
        assert_eq!(events.len(), 1);
        assert_eq!(h.engine.pending_resolutions(), 0);
    }
}
