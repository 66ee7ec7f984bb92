//! Balloon annotation and coordinate-transform engine
//!
//! Places numbered balloon markers on page 1 of a PDF drawing, keeps their
//! positions in a normalized document space that survives zoom, rotation
//! and orientation changes, resolves nearby text for each balloon through
//! an external collaborator, and exports the result as a filled report or
//! an annotated PDF.
//!
//! The collaborators (renderer, text resolver, document generator) are
//! traits in [`collaborators`]; HTTP implementations live in
//! `balloon-backend`.

pub mod collaborators;
pub mod config;
pub mod coords;
pub mod document;
pub mod engine;
pub mod error;
pub mod export;
pub mod nearby;
pub mod orchestrator;
pub mod registry;
pub mod render;
pub mod store;
pub mod surface;
pub mod view;

pub use collaborators::{DocumentGenerator, PdfRenderer, PixelPoint, RenderedPage, TextResolver};
pub use config::{EngineConfig, OutOfBoundsPolicy};
pub use coords::{to_document_space, to_viewport_space, DocPoint, ViewportBounds, ViewportPoint};
pub use document::{DocumentHandle, Epoch, PageSize};
pub use engine::{AnnotationEngine, DiscardReason, EngineEvent};
pub use error::{BalloonError, Operation};
pub use export::{Artifact, ExportCoordinator, MappingEntry};
pub use nearby::{PageSpans, SpanIndexResolver, TextSpan};
pub use orchestrator::{ResolutionOrchestrator, ResolutionOutcome, ResolutionTicket};
pub use registry::TypeRegistry;
pub use render::PageGeometryRenderer;
pub use store::{Balloon, BalloonId, BalloonRecord, BalloonStore, Generation, ResolutionStatus};
pub use surface::RasterSurface;
pub use view::{Orientation, Rotation, ViewState};
