//! Snapshots accumulated over a test run.
//!
//! A [`SnapshotStore`] is owned by whatever drives the test run: create it when the run starts,
//! [`record`](SnapshotStore::record) snapshots as tests take them, [`take`](SnapshotStore::take)
//! a test's snapshots when it finishes and hand them to the archive writer, and
//! [`clear`](SnapshotStore::clear) it when the run ends.

use crate::error::{ArchiveError, Result};
use crate::naming::slugify;
use std::collections::{HashMap, HashSet};

/// A snapshot name with its raw serialized bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSnapshot {
  pub name: String,
  pub bytes: Vec<u8>,
}

impl NamedSnapshot {
  pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
    Self {
      name: name.into(),
      bytes: bytes.into(),
    }
  }
}

/// Label given to the `n`th (1-based) unnamed snapshot of a test.
pub fn default_snapshot_name(n: usize) -> String {
  format!("Snapshot #{n}")
}

/// Snapshots per test id, in the order they were taken.
#[derive(Debug, Default)]
pub struct SnapshotStore {
  tests: HashMap<String, Vec<NamedSnapshot>>,
}

impl SnapshotStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records a snapshot for `test_id` and returns the name it was stored under.
  ///
  /// Without a name the snapshot is labelled `Snapshot #N`, N being its 1-based position among the
  /// test's snapshots, bumped past any label (or story id) already in use. Supplied names must be
  /// unique within a test.
  pub fn record(
    &mut self,
    test_id: &str,
    name: Option<&str>,
    bytes: impl Into<Vec<u8>>,
  ) -> Result<String> {
    let snapshots = self.tests.entry(test_id.to_string()).or_default();
    let name = match name {
      Some(name) => name.to_string(),
      None => next_default_name(snapshots),
    };
    if snapshots.iter().any(|s| s.name == name) {
      return Err(
        ArchiveError::DuplicateSnapshot {
          test_id: test_id.to_string(),
          name,
        }
        .into(),
      );
    }
    tracing::trace!(test_id, name = %name, "recorded snapshot");
    snapshots.push(NamedSnapshot::new(name.clone(), bytes));
    Ok(name)
  }

  /// Snapshots recorded for `test_id` so far.
  pub fn snapshots(&self, test_id: &str) -> &[NamedSnapshot] {
    self.tests.get(test_id).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Removes and returns the snapshots of `test_id`, in recording order.
  pub fn take(&mut self, test_id: &str) -> Vec<NamedSnapshot> {
    self.tests.remove(test_id).unwrap_or_default()
  }

  /// Number of tests with at least one recorded snapshot.
  pub fn len(&self) -> usize {
    self.tests.values().filter(|s| !s.is_empty()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn clear(&mut self) {
    self.tests.clear();
  }
}

fn next_default_name(snapshots: &[NamedSnapshot]) -> String {
  let used: HashSet<String> = snapshots.iter().map(|s| slugify(&s.name)).collect();
  (snapshots.len() + 1..)
    .map(default_snapshot_name)
    .find(|candidate| !used.contains(&slugify(candidate)))
    .unwrap_or_else(|| default_snapshot_name(snapshots.len() + 1))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn unnamed_snapshots_are_numbered_per_test() {
    let mut store = SnapshotStore::new();
    assert!(store.is_empty());
    assert_eq!(store.record("a", None, b"{}".to_vec()).unwrap(), "Snapshot #1");
    assert_eq!(store.record("a", None, b"{}".to_vec()).unwrap(), "Snapshot #2");
    assert_eq!(store.record("b", None, b"{}".to_vec()).unwrap(), "Snapshot #1");
    assert_eq!(store.len(), 2);

    let names: Vec<_> = store.snapshots("a").iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Snapshot #1", "Snapshot #2"]);
  }

  #[test]
  fn supplied_names_are_kept_in_order() {
    let mut store = SnapshotStore::new();
    store.record("a", Some("first snappy"), b"1".to_vec()).unwrap();
    store.record("a", Some("second snappy"), b"2".to_vec()).unwrap();
    let taken = store.take("a");
    assert_eq!(
      taken,
      vec![
        NamedSnapshot::new("first snappy", b"1".to_vec()),
        NamedSnapshot::new("second snappy", b"2".to_vec()),
      ]
    );
    assert!(store.snapshots("a").is_empty());
  }

  #[test]
  fn duplicate_names_are_rejected() {
    let mut store = SnapshotStore::new();
    store.record("a", Some("home"), b"1".to_vec()).unwrap();
    let err = store.record("a", Some("home"), b"2".to_vec()).unwrap_err();
    assert!(matches!(
      err,
      Error::Archive(ArchiveError::DuplicateSnapshot { .. })
    ));
    assert_eq!(store.snapshots("a").len(), 1);
  }

  #[test]
  fn unnamed_snapshots_skip_labels_already_taken() {
    let mut store = SnapshotStore::new();
    store.record("a", None, b"1".to_vec()).unwrap();
    store.record("a", Some("Snapshot #2"), b"2".to_vec()).unwrap();
    assert_eq!(store.record("a", None, b"3".to_vec()).unwrap(), "Snapshot #3");

    store.record("a", Some("snapshot 5"), b"4".to_vec()).unwrap();
    assert_eq!(store.record("a", None, b"5".to_vec()).unwrap(), "Snapshot #6");

    let names: Vec<_> = store.snapshots("a").iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
      names,
      ["Snapshot #1", "Snapshot #2", "Snapshot #3", "snapshot 5", "Snapshot #6"]
    );
  }

  #[test]
  fn clear_resets_the_run() {
    let mut store = SnapshotStore::new();
    store.record("a", None, b"{}".to_vec()).unwrap();
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.record("a", None, b"{}".to_vec()).unwrap(), "Snapshot #1");
  }
}
