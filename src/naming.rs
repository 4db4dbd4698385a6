//! Story titles, slugs and ids derived from a test's title path.
//!
//! The first title-path segment is the spec file (possibly with directories); the remaining
//! segments are describe blocks and the test name. Titles keep every segment verbatim except the
//! file name's extension, so dots in directories, describe blocks and test names survive:
//!
//! ```
//! use story_archive::naming::derive_title;
//!
//! let title = derive_title(&["a.directory/file.spec.ts", ".someFunction", ".someFunction() calls"]);
//! assert_eq!(title, "a.directory/file/.someFunction/.someFunction() calls");
//! ```

/// Framework markers stripped from spec file names after the extension.
const FRAMEWORK_SUFFIXES: &[&str] = &[".spec", ".cy"];

/// Strips the extension (and a `.spec` / `.cy` marker) from the file name part of `path`.
///
/// Only the last path component is touched; dot-files keep their leading dot.
pub fn strip_spec_extension(path: &str) -> String {
  let (dir, file) = match path.rfind('/') {
    Some(idx) => (&path[..=idx], &path[idx + 1..]),
    None => ("", path),
  };

  let mut stem = match file.rfind('.') {
    Some(idx) if idx > 0 => &file[..idx],
    _ => file,
  };
  for suffix in FRAMEWORK_SUFFIXES {
    if let Some(stripped) = stem.strip_suffix(suffix) {
      if !stripped.is_empty() {
        stem = stripped;
        break;
      }
    }
  }

  format!("{dir}{stem}")
}

/// Title segments: the spec file with its extension stripped, then the rest verbatim.
pub fn title_segments<S: AsRef<str>>(title_path: &[S]) -> Vec<String> {
  title_path
    .iter()
    .enumerate()
    .map(|(idx, segment)| {
      if idx == 0 {
        strip_spec_extension(segment.as_ref())
      } else {
        segment.as_ref().to_string()
      }
    })
    .collect()
}

/// Slash-joined story title.
pub fn derive_title<S: AsRef<str>>(title_path: &[S]) -> String {
  title_segments(title_path).join("/")
}

/// Lower-kebab, filesystem-safe form of `input`.
///
/// Runs of anything other than letters and digits collapse into a single `-`; leading and
/// trailing dashes are dropped.
pub fn slugify(input: &str) -> String {
  let mut slug = String::with_capacity(input.len());
  let mut pending_dash = false;
  for c in input.chars() {
    if c.is_alphanumeric() {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.extend(c.to_lowercase());
    } else {
      pending_dash = true;
    }
  }
  slug
}

/// File-scoped slug: every title segment slugified and joined with `-`.
///
/// Prefixes the manifest and snapshot file names and every story id, so two spec files (or two
/// describe groups) sharing a test name never collide.
pub fn derive_file_slug<S: AsRef<str>>(title_path: &[S]) -> String {
  title_segments(title_path)
    .iter()
    .map(|segment| slugify(segment))
    .filter(|slug| !slug.is_empty())
    .collect::<Vec<_>>()
    .join("-")
}

/// Id used by the replay server to locate a story: `<fileSlug>-<snapshotSlug>`.
pub fn derive_story_id(file_slug: &str, snapshot_name: &str) -> String {
  let snapshot_slug = slugify(snapshot_name);
  match (file_slug.is_empty(), snapshot_slug.is_empty()) {
    (true, _) => snapshot_slug,
    (false, true) => file_slug.to_string(),
    (false, false) => format!("{file_slug}-{snapshot_slug}"),
  }
}
