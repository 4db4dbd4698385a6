//! Rewrites resource references in snapshot trees to archived local paths.
//!
//! References are resolved against the page URL and looked up in a [`LocalPaths`] table. A hit
//! replaces the reference with the archived path; a miss leaves the original value alone, so
//! uncaptured and cross-origin resources stay live remote references on replay. The tree shape is
//! never changed: only attribute string values are.

use crate::dom::{AttributeValue, SnapshotNode};
use crate::resource::toggle_trailing_slash;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

/// Attributes whose whole value is a single URL.
const URL_ATTRIBUTES: &[&str] = &["src", "href", "xlink:href", "poster", "data", "background"];

/// Attributes holding a comma separated candidate list (`url descriptor, ...`).
const SRCSET_ATTRIBUTES: &[&str] = &["srcset"];

/// Attributes holding CSS text. `_cssText` is where the capture format inlines stylesheets.
const CSS_ATTRIBUTES: &[&str] = &["style", "_csstext"];

/// Absolute URL to archived path table consulted by the rewriter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPaths {
  entries: HashMap<String, String>,
}

impl LocalPaths {
  pub fn new() -> Self {
    Self::default()
  }

  /// Records that `url` was archived at `local_path`. Fragments are ignored.
  pub fn insert(&mut self, url: &Url, local_path: impl Into<String>) {
    let mut key = url.clone();
    key.set_fragment(None);
    self.entries.insert(key.into(), local_path.into());
  }

  /// Looks `url` up exactly, then with its trailing slash toggled.
  pub fn lookup(&self, url: &Url) -> Option<&str> {
    let mut key = url.clone();
    key.set_fragment(None);
    if let Some(path) = self.entries.get(key.as_str()) {
      return Some(path);
    }
    toggle_trailing_slash(&key)
      .and_then(|toggled| self.entries.get(toggled.as_str()))
      .map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self
      .entries
      .iter()
      .map(|(url, path)| (url.as_str(), path.as_str()))
  }
}

/// Resolves a raw attribute value against `base`.
///
/// Values that can never point at an archived response (empty, fragment-only, `data:`, script
/// and mail URLs) resolve to `None`.
pub fn resolve_reference(base: &Url, raw: &str) -> Option<Url> {
  let raw = raw.trim();
  if raw.is_empty() || raw.starts_with('#') {
    return None;
  }
  let lower = raw.to_ascii_lowercase();
  if ["data:", "javascript:", "vbscript:", "mailto:", "blob:", "about:"]
    .iter()
    .any(|scheme| lower.starts_with(scheme))
  {
    return None;
  }
  base.join(raw).ok()
}

/// Rewrites every mapped reference in `root` and returns the tree.
pub fn rewrite_snapshot(mut root: SnapshotNode, base: &Url, paths: &LocalPaths) -> SnapshotNode {
  rewrite_in_place(&mut root, base, paths);
  root
}

/// Rewrites `root` in place, returning how many references were replaced.
pub fn rewrite_in_place(root: &mut SnapshotNode, base: &Url, paths: &LocalPaths) -> usize {
  let rewriter = Rewriter { base, paths };
  let mut rewritten = 0;
  let mut stack = vec![root];
  while let Some(node) = stack.pop() {
    if let Some(attributes) = node.attributes.as_mut() {
      for (name, value) in attributes.iter_mut() {
        rewritten += rewriter.rewrite_attribute(name, value);
      }
    }
    if let Some(children) = node.child_nodes.as_mut() {
      stack.extend(children.iter_mut());
    }
  }
  rewritten
}

struct Rewriter<'a> {
  base: &'a Url,
  paths: &'a LocalPaths,
}

impl Rewriter<'_> {
  fn rewrite_attribute(&self, name: &str, value: &mut AttributeValue) -> usize {
    let AttributeValue::Text(text) = value else {
      return 0;
    };
    let name = name.to_ascii_lowercase();
    let replaced = if URL_ATTRIBUTES.contains(&name.as_str()) {
      self.map_reference(text).map(|mapped| (mapped, 1))
    } else if SRCSET_ATTRIBUTES.contains(&name.as_str()) {
      self.rewrite_srcset(text)
    } else if CSS_ATTRIBUTES.contains(&name.as_str()) {
      self.rewrite_css(text)
    } else {
      None
    };

    match replaced {
      Some((new_value, count)) => {
        tracing::trace!(attribute = %name, from = %text, to = %new_value, "rewrote reference");
        *text = new_value;
        count
      }
      None => 0,
    }
  }

  /// Maps one reference to its archived path, keeping any fragment.
  fn map_reference(&self, raw: &str) -> Option<String> {
    let resolved = resolve_reference(self.base, raw)?;
    let local = self.paths.lookup(&resolved)?;
    Some(match resolved.fragment() {
      Some(fragment) => format!("{local}#{fragment}"),
      None => local.to_string(),
    })
  }

  /// Rewrites the URL of each `srcset` candidate in place.
  ///
  /// Candidates are split the way browsers split them: a URL runs up to the next whitespace
  /// (trailing commas excepted), so commas inside `data:` URLs never end a candidate. Separators
  /// and descriptors are copied through byte for byte.
  fn rewrite_srcset(&self, srcset: &str) -> Option<(String, usize)> {
    let mut out = String::with_capacity(srcset.len());
    let mut count = 0;
    let mut rest = srcset;
    loop {
      let start = rest
        .find(|c: char| !(c.is_ascii_whitespace() || c == ','))
        .unwrap_or(rest.len());
      out.push_str(&rest[..start]);
      rest = &rest[start..];
      if rest.is_empty() {
        break;
      }

      let token_end = rest.find(|c: char| c.is_ascii_whitespace()).unwrap_or(rest.len());
      let url_part = rest[..token_end].trim_end_matches(',');
      match self.map_reference(url_part) {
        Some(mapped) => {
          count += 1;
          out.push_str(&mapped);
        }
        None => out.push_str(url_part),
      }
      rest = &rest[url_part.len()..];
      if url_part.len() < token_end {
        continue;
      }

      let descriptor_end = rest.find(',').unwrap_or(rest.len());
      out.push_str(&rest[..descriptor_end]);
      rest = &rest[descriptor_end..];
    }
    (count > 0).then_some((out, count))
  }

  fn rewrite_css(&self, css: &str) -> Option<(String, usize)> {
    static CSS_URL: OnceLock<Regex> = OnceLock::new();
    let css_url = CSS_URL.get_or_init(|| {
      Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#)
        .unwrap_or_else(|err| panic!("invalid css url regex: {err}"))
    });

    let mut count = 0;
    let rewritten = css_url.replace_all(css, |caps: &Captures<'_>| {
      let (raw, quote) = if let Some(m) = caps.get(1) {
        (m.as_str(), "\"")
      } else if let Some(m) = caps.get(2) {
        (m.as_str(), "'")
      } else {
        (caps.get(3).map(|m| m.as_str()).unwrap_or(""), "")
      };
      match self.map_reference(raw) {
        Some(mapped) => {
          count += 1;
          format!("url({quote}{mapped}{quote})")
        }
        None => caps[0].to_string(),
      }
    });
    (count > 0).then(|| (rewritten.into_owned(), count))
  }
}
