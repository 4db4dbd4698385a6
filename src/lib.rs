//! Replayable story archives from captured browser sessions.
//!
//! Given a test's DOM snapshots and the network responses its page issued, the archive writer
//! stores every replayable response under the archive directory, rewrites each snapshot so its
//! resource references point at the stored copies, and writes a story manifest for the test.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use story_archive::{
//!   write_test_result, ArchiveOptions, CapturedResponse, ChromaticConfig, NamedSnapshot, TestMeta,
//!   Viewport,
//! };
//!
//! # fn main() -> story_archive::Result<()> {
//! let meta = TestMeta {
//!   title_path: vec!["file.spec.ts".into(), "Test Story".into()],
//!   output_dir: "test-results/test-story-chromium".into(),
//!   page_url: "http://localhost:3000/".into(),
//!   viewport: Viewport { width: 800, height: 800 },
//! };
//! let snapshots = [NamedSnapshot::new("home", br#"{"childNodes":[]}"#.to_vec())];
//! let mut responses = BTreeMap::new();
//! responses.insert(
//!   "http://localhost:3000/home".to_string(),
//!   CapturedResponse::new(200, "Chromatic"),
//! );
//! write_test_result(
//!   &meta,
//!   &snapshots,
//!   &responses,
//!   &ChromaticConfig::default(),
//!   &ArchiveOptions::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod dom;
pub mod error;
pub mod naming;
pub mod resource;
pub mod rewrite;
pub mod session;

pub use archive::{
  plan_test_result, write_test_result, ArchiveManifest, ArchivePlan, ArchiveSummary,
  StoryDescriptor, TestMeta, Viewport,
};
pub use config::{ArchiveOptions, ChromaticConfig};
pub use dom::{NodeKind, SnapshotNode};
pub use error::{Error, Result};
pub use resource::{classify_origin, CapturedResponse, ResponseOrigin};
pub use rewrite::{rewrite_snapshot, LocalPaths};
pub use session::{NamedSnapshot, SnapshotStore};
