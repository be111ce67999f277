//! The Lighthouse build pipeline.
//!
//! Takes a watched repository from its branch archive to a running compose
//! project: clean the scratch areas, fetch, stop the old container, extract,
//! discover and resolve secrets, build, clean again.

pub mod extract;
pub mod fetch;
pub mod lifecycle;
pub mod pipeline;
pub mod secrets;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use extract::{ExtractStats, extract_archive};
pub use fetch::{ArchiveSource, HttpFetcher};
pub use pipeline::{BuildPipeline, PipelineEvent};
pub use secrets::SecretResolver;
pub use workspace::Workspace;
