pub mod annotator;
pub mod archiver;
pub mod error;
pub mod extractor;
pub mod feed;
pub mod object_store;
pub mod pipeline;
pub mod repository;
pub mod sanitizer;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod time_filter;
pub mod traits;

pub use annotator::{AnnotationTask, Annotator, AnnotatorSettings};
pub use archiver::Archiver;
pub use pipeline::{Pipeline, PipelineSettings, RunOutcome};
pub use repository::{PgRepository, WriteOutcome};
