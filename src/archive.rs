//! Story archives: rewritten snapshots, archived responses and the story manifest.
//!
//! Writing a test result happens in two phases. [`plan_test_result`] does all the work that can
//! fail without touching the disk (URL classification, asset naming, snapshot parsing and
//! rewriting, manifest construction) and returns an [`ArchivePlan`]. [`ArchivePlan::write`] then
//! creates the asset directory and writes every file, manifest last.
//!
//! Layout under the archive root:
//!
//! ```text
//! <fileSlug>.stories.json                              manifest
//! archive/<fileSlug>-<snapshotSlug>.w<W>h<H>.snapshot.json
//! archive/<local path>                                 same-origin responses
//! archive/external/<hash>.<ext>                        foreign responses
//! ```
//!
//! Nothing here is transactional. An I/O failure halfway through leaves the files written so far
//! in place and no manifest.

use crate::config::{ArchiveOptions, ChromaticConfig};
use crate::dom::{parse_snapshot, serialize_snapshot};
use crate::error::{ArchiveError, Error, ParseError, Result};
use crate::naming::{derive_file_slug, derive_story_id, derive_title};
use crate::resource::{asset_path, classify_origin, hash_hex, with_name_suffix, CapturedResponse};
use crate::rewrite::{rewrite_in_place, LocalPaths};
use crate::session::NamedSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Directory created next to the test output directory when no archive dir is configured.
pub const DEFAULT_ARCHIVE_DIR: &str = "chromatic-archives";

/// Subdirectory of the archive root holding snapshots and archived responses.
pub const ASSET_DIR: &str = "archive";

/// Browser viewport the snapshots were taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
  pub width: u32,
  pub height: u32,
}

/// What the test framework tells us about the test that produced the snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMeta {
  /// Spec file, describe blocks, test name.
  pub title_path: Vec<String>,
  /// The framework's per-test output directory.
  pub output_dir: PathBuf,
  /// URL of the page under test; relative references resolve against it.
  pub page_url: String,
  pub viewport: Viewport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerParameters {
  pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryParameters {
  pub chromatic: ChromaticConfig,
  pub server: ServerParameters,
}

/// Manifest entry for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryDescriptor {
  pub name: String,
  pub parameters: StoryParameters,
}

/// The `<fileSlug>.stories.json` document.
///
/// Each write replaces the file; manifests are never merged with what is already on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveManifest {
  pub title: String,
  pub stories: Vec<StoryDescriptor>,
}

impl ArchiveManifest {
  /// Reads a manifest previously written by [`ArchivePlan::write`].
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::io_at(path, "read manifest", e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
      ParseError::InvalidManifest {
        message: format!("{}: {e}", path.display()),
      }
      .into()
    })
  }
}

/// A file the plan will write, relative to the archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
  pub path: PathBuf,
  pub bytes: Vec<u8>,
}

/// Everything a test result will write, computed up front.
#[derive(Debug, Clone)]
pub struct ArchivePlan {
  pub root: PathBuf,
  pub manifest_path: PathBuf,
  pub manifest: ArchiveManifest,
  /// Archived response bodies, in URL order.
  pub assets: Vec<PlannedFile>,
  /// Rewritten snapshots, in snapshot order.
  pub snapshots: Vec<PlannedFile>,
  /// Absolute URL to archived path, as used for rewriting.
  pub local_paths: LocalPaths,
}

/// Absolute paths of the files an [`ArchivePlan::write`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
  pub root: PathBuf,
  pub manifest_path: PathBuf,
  pub asset_paths: Vec<PathBuf>,
  pub snapshot_paths: Vec<PathBuf>,
}

/// Resolves the archive root for a test.
///
/// The framework's output directory is per test (and often per browser, e.g.
/// `test-results/test-story-chromium`), so the default root is a sibling of it.
pub fn archive_root(output_dir: &Path, options: &ArchiveOptions) -> PathBuf {
  if let Some(dir) = &options.archive_dir {
    return dir.clone();
  }
  output_dir
    .parent()
    .unwrap_or(output_dir)
    .join(DEFAULT_ARCHIVE_DIR)
}

pub fn manifest_file_name(file_slug: &str) -> String {
  format!("{file_slug}.stories.json")
}

/// File name of a rewritten snapshot. The viewport is part of the name so runs at different
/// viewports never overwrite each other.
pub fn snapshot_file_name(file_slug: &str, snapshot_name: &str, viewport: Viewport) -> String {
  format!(
    "{}.w{}h{}.snapshot.json",
    derive_story_id(file_slug, snapshot_name),
    viewport.width,
    viewport.height
  )
}

/// Computes every file a test result produces without writing anything.
///
/// Fails on an invalid page URL, on a snapshot that is not a serialized tree, and on snapshot
/// names that would produce the same story.
pub fn plan_test_result(
  meta: &TestMeta,
  snapshots: &[NamedSnapshot],
  responses: &BTreeMap<String, CapturedResponse>,
  config: &ChromaticConfig,
  options: &ArchiveOptions,
) -> Result<ArchivePlan> {
  let page_url = Url::parse(&meta.page_url).map_err(|e| ArchiveError::InvalidPageUrl {
    url: meta.page_url.clone(),
    reason: e.to_string(),
  })?;
  let root = archive_root(&meta.output_dir, options);
  let title = derive_title(&meta.title_path);
  let file_slug = derive_file_slug(&meta.title_path);
  tracing::debug!(
    title = %title,
    root = %root.display(),
    snapshots = snapshots.len(),
    responses = responses.len(),
    "planning story archive"
  );

  let (assets, local_paths) = plan_assets(&page_url, responses);

  let mut story_names: HashSet<&str> = HashSet::new();
  let mut story_ids: HashSet<String> = HashSet::new();
  let mut stories = Vec::with_capacity(snapshots.len());
  let mut planned_snapshots = Vec::with_capacity(snapshots.len());
  for snapshot in snapshots {
    let id = derive_story_id(&file_slug, &snapshot.name);
    if !story_names.insert(snapshot.name.as_str()) || !story_ids.insert(id.clone()) {
      return Err(
        ArchiveError::DuplicateStory {
          name: snapshot.name.clone(),
        }
        .into(),
      );
    }

    let mut tree = parse_snapshot(&snapshot.name, &snapshot.bytes)?;
    let rewritten = rewrite_in_place(&mut tree, &page_url, &local_paths);
    tracing::debug!(snapshot = %snapshot.name, rewritten, "rewrote snapshot references");

    planned_snapshots.push(PlannedFile {
      path: Path::new(ASSET_DIR).join(snapshot_file_name(
        &file_slug,
        &snapshot.name,
        meta.viewport,
      )),
      bytes: serialize_snapshot(&tree)?,
    });
    stories.push(StoryDescriptor {
      name: snapshot.name.clone(),
      parameters: StoryParameters {
        chromatic: config.clone(),
        server: ServerParameters { id },
      },
    });
  }

  Ok(ArchivePlan {
    manifest_path: root.join(manifest_file_name(&file_slug)),
    root,
    manifest: ArchiveManifest { title, stories },
    assets,
    snapshots: planned_snapshots,
    local_paths,
  })
}

/// Names every replayable response and records where each URL was archived.
///
/// Responses that land on the same archive path with identical bodies (`/home` and `/home/`, or
/// identical foreign payloads) are written once and every URL maps to the shared file. A different
/// body claiming a taken path is renamed with a hash of its bytes.
fn plan_assets(
  page_url: &Url,
  responses: &BTreeMap<String, CapturedResponse>,
) -> (Vec<PlannedFile>, LocalPaths) {
  let mut assets: Vec<PlannedFile> = Vec::new();
  let mut local_paths = LocalPaths::new();
  let mut taken: HashMap<String, usize> = HashMap::new();

  for (url, response) in responses {
    if !response.is_success() {
      tracing::debug!(url = %url, status = response.status_code, "skipping unsuccessful response");
      continue;
    }
    let parsed = match Url::parse(url) {
      Ok(parsed) if parsed.scheme() != "data" => parsed,
      Ok(_) => continue,
      Err(err) => {
        tracing::debug!(url = %url, error = %err, "skipping unparseable response url");
        continue;
      }
    };

    let preferred = asset_path(page_url, url, response);
    let mut local = preferred.clone();
    let mut attempt = 0usize;
    let is_new = loop {
      match taken.get(&local) {
        None => break true,
        Some(&idx) if assets[idx].bytes == response.body => break false,
        Some(_) => {
          let suffix = match attempt {
            0 => hash_hex(&response.body),
            n => format!("{}-{n}", hash_hex(&response.body)),
          };
          local = with_name_suffix(&preferred, &suffix);
          attempt += 1;
        }
      }
    };
    tracing::debug!(
      url = %url,
      origin = ?classify_origin(page_url, url),
      path = %local,
      renamed = local != preferred,
      "archiving response"
    );
    local_paths.insert(&parsed, local.clone());
    if is_new {
      taken.insert(local.clone(), assets.len());
      assets.push(PlannedFile {
        path: Path::new(ASSET_DIR).join(local.trim_start_matches('/')),
        bytes: response.body.clone(),
      });
    }
  }

  (assets, local_paths)
}

impl ArchivePlan {
  /// Writes the plan: asset directory, responses, snapshots, then the manifest.
  pub fn write(&self) -> Result<ArchiveSummary> {
    let asset_dir = self.root.join(ASSET_DIR);
    fs::create_dir_all(&asset_dir).map_err(|e| Error::io_at(&asset_dir, "create directory", e))?;

    let asset_paths = self.write_files(&self.assets)?;
    let snapshot_paths = self.write_files(&self.snapshots)?;

    let manifest_bytes = serde_json::to_vec_pretty(&self.manifest)?;
    write_file(&self.manifest_path, &manifest_bytes)?;
    tracing::debug!(
      manifest = %self.manifest_path.display(),
      stories = self.manifest.stories.len(),
      "wrote story archive"
    );

    Ok(ArchiveSummary {
      root: self.root.clone(),
      manifest_path: self.manifest_path.clone(),
      asset_paths,
      snapshot_paths,
    })
  }

  fn write_files(&self, files: &[PlannedFile]) -> Result<Vec<PathBuf>> {
    files
      .iter()
      .map(|file| {
        let path = self.root.join(&file.path);
        write_file(&path, &file.bytes)?;
        Ok(path)
      })
      .collect()
  }
}

/// Archives one test's snapshots and captured responses.
///
/// Equivalent to [`plan_test_result`] followed by [`ArchivePlan::write`].
pub fn write_test_result(
  meta: &TestMeta,
  snapshots: &[NamedSnapshot],
  responses: &BTreeMap<String, CapturedResponse>,
  config: &ChromaticConfig,
  options: &ArchiveOptions,
) -> Result<ArchiveSummary> {
  plan_test_result(meta, snapshots, responses, config, options)?.write()
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, "create directory", e))?;
  }
  fs::write(path, bytes).map_err(|e| Error::io_at(path, "write", e))
}
