//! Captured network responses and their archive file names.
//!
//! Every archived response is addressed by a path rooted at the archive's asset directory
//! (always starting with `/`). Responses that share the page's origin keep a readable path derived
//! from their URL; everything else is named after a hash of its body so identical payloads share
//! one file and different payloads never collide.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

/// Directory (under the asset directory) holding foreign responses.
pub const EXTERNAL_ASSET_DIR: &str = "external";

/// Number of hex characters kept from a SHA-256 digest in file names.
const HASH_HEX_LEN: usize = 32;

/// One network exchange observed while the test ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
  pub status_code: u16,
  pub body: Vec<u8>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_type: Option<String>,
}

impl CapturedResponse {
  pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status_code,
      body: body.into(),
      content_type: None,
    }
  }

  pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
    self.content_type = Some(content_type.into());
    self
  }

  /// Whether the response can be replayed (2xx).
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status_code)
  }
}

/// Where a captured response came from relative to the page under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOrigin {
  /// Same scheme, host and port as the page.
  Local,
  /// Anything else, including URLs that cannot be parsed.
  Foreign,
}

/// Classifies `url` against the page URL.
///
/// Paths play no part: `http://host/home` and `http://host/home/` are both local to
/// `http://host/`.
pub fn classify_origin(page_url: &Url, url: &str) -> ResponseOrigin {
  match Url::parse(url) {
    Ok(parsed) if is_same_origin(page_url, &parsed) => ResponseOrigin::Local,
    _ => ResponseOrigin::Foreign,
  }
}

fn is_same_origin(a: &Url, b: &Url) -> bool {
  let origin = a.origin();
  origin.is_tuple() && origin == b.origin()
}

/// Returns the URL with its path's trailing slash toggled, used to match `/home` against `/home/`.
///
/// Returns `None` for the root path and for URLs that cannot carry a path.
pub fn toggle_trailing_slash(url: &Url) -> Option<Url> {
  if url.cannot_be_a_base() || url.path() == "/" {
    return None;
  }
  let mut toggled = url.clone();
  let path = url.path();
  let new_path = match path.strip_suffix('/') {
    Some(stripped) => stripped.to_string(),
    None => format!("{path}/"),
  };
  toggled.set_path(&new_path);
  Some(toggled)
}

/// Computes the archive path for a response. The result always starts with `/`.
pub fn asset_path(page_url: &Url, url: &str, response: &CapturedResponse) -> String {
  match (classify_origin(page_url, url), Url::parse(url)) {
    (ResponseOrigin::Local, Ok(parsed)) => local_asset_path(&parsed, response),
    _ => foreign_asset_path(url, response),
  }
}

fn local_asset_path(url: &Url, response: &CapturedResponse) -> String {
  let path = url.path();
  let (stem, ext) = if let Some(dir) = path.strip_suffix('/') {
    (format!("{dir}/index"), "html".to_string())
  } else {
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match split_extension(last_segment) {
      Some((_, ext)) => (
        path[..path.len() - ext.len() - 1].to_string(),
        ext.to_string(),
      ),
      None => match content_type_extension(response.content_type.as_deref()) {
        Some(ext) if ext != "html" => (path.to_string(), ext.to_string()),
        _ => (format!("{path}/index"), "html".to_string()),
      },
    }
  };

  let path = match url.query() {
    Some(query) => format!("{stem}-{}.{ext}", hash_hex(format!("?{query}").as_bytes())),
    None => format!("{stem}.{ext}"),
  };
  sanitize_path(&path)
}

fn foreign_asset_path(url: &str, response: &CapturedResponse) -> String {
  format!(
    "/{EXTERNAL_ASSET_DIR}/{}.{}",
    hash_hex(&response.body),
    extension_for_resource(response, url)
  )
}

/// Picks a file extension for a response: content type first, then the URL path, then `bin`.
pub fn extension_for_resource(response: &CapturedResponse, url: &str) -> String {
  if let Some(ext) = content_type_extension(response.content_type.as_deref()) {
    return ext.to_string();
  }

  if let Ok(parsed) = Url::parse(url) {
    if let Some(ext) = Path::new(parsed.path())
      .extension()
      .and_then(|e| e.to_str())
    {
      let ext = ext.to_ascii_lowercase();
      if !ext.is_empty() && ext.len() <= 8 {
        return ext;
      }
    }
  }

  "bin".to_string()
}

fn content_type_extension(content_type: Option<&str>) -> Option<&'static str> {
  let ct = content_type?.to_ascii_lowercase();
  let essence = ct.split(';').next().unwrap_or("").trim();
  let ext = match essence {
    "text/html" | "application/xhtml+xml" => "html",
    "text/css" => "css",
    "text/javascript" | "application/javascript" | "application/x-javascript" => "js",
    "application/json" => "json",
    "image/png" => "png",
    "image/jpeg" | "image/jpg" => "jpg",
    "image/gif" => "gif",
    "image/webp" => "webp",
    "image/avif" => "avif",
    "image/svg+xml" => "svg",
    "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
    "font/woff2" => "woff2",
    "font/woff" | "application/font-woff" => "woff",
    "font/ttf" | "application/x-font-ttf" => "ttf",
    "font/otf" => "otf",
    "video/mp4" => "mp4",
    "video/webm" => "webm",
    _ => return None,
  };
  Some(ext)
}

/// Inserts `-<suffix>` before the extension of the last path segment.
///
/// `/a_b.css` with suffix `f00` becomes `/a_b-f00.css`; `/LICENSE` becomes `/LICENSE-f00`.
pub fn with_name_suffix(path: &str, suffix: &str) -> String {
  let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
  let renamed = match split_extension(name) {
    Some((stem, ext)) => format!("{stem}-{suffix}.{ext}"),
    None => format!("{name}-{suffix}"),
  };
  if path.contains('/') {
    format!("{dir}/{renamed}")
  } else {
    renamed
  }
}

/// Splits `name` into stem and extension. Dot-files (`.env`) and names ending in a dot have no
/// extension.
fn split_extension(name: &str) -> Option<(&str, &str)> {
  let idx = name.rfind('.')?;
  if idx == 0 || idx + 1 == name.len() {
    return None;
  }
  Some((&name[..idx], &name[idx + 1..]))
}

/// Keeps the path readable while making each segment safe to create on disk.
fn sanitize_path(path: &str) -> String {
  path
    .split('/')
    .map(|segment| {
      let decoded = percent_decode(segment);
      let cleaned: String = decoded
        .chars()
        .map(|c| {
          if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' {
            c
          } else {
            '_'
          }
        })
        .collect();
      if cleaned == "." || cleaned == ".." {
        "_".repeat(cleaned.len())
      } else {
        cleaned
      }
    })
    .collect::<Vec<_>>()
    .join("/")
}

fn percent_decode(segment: &str) -> String {
  let bytes = segment.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if bytes[i] == b'%' && i + 2 < bytes.len() {
      let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
        .ok()
        .and_then(|hex| u8::from_str_radix(hex, 16).ok());
      if let Some(byte) = decoded {
        out.push(byte);
        i += 3;
        continue;
      }
    }
    out.push(bytes[i]);
    i += 1;
  }
  String::from_utf8_lossy(&out).into_owned()
}

/// Lowercase hex of the first bytes of the SHA-256 digest of `bytes`.
pub fn hash_hex(bytes: &[u8]) -> String {
  let digest = Sha256::digest(bytes);
  const HEX: &[u8; 16] = b"0123456789abcdef";
  let mut out = String::with_capacity(HASH_HEX_LEN);
  for &b in digest.iter().take(HASH_HEX_LEN / 2) {
    out.push(HEX[(b >> 4) as usize] as char);
    out.push(HEX[(b & 0x0f) as usize] as char);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn page() -> Url {
    Url::parse("http://localhost:3000/").expect("page url")
  }

  #[test]
  fn same_origin_ignores_path_and_trailing_slash() {
    let page = page();
    assert_eq!(
      classify_origin(&page, "http://localhost:3000/home"),
      ResponseOrigin::Local
    );
    assert_eq!(
      classify_origin(&page, "http://localhost:3000/home/"),
      ResponseOrigin::Local
    );
    assert_eq!(
      classify_origin(&page, "http://localhost:3000"),
      ResponseOrigin::Local
    );
  }

  #[test]
  fn different_scheme_host_or_port_is_foreign() {
    let page = page();
    for url in [
      "https://localhost:3000/home",
      "http://localhost:3001/home",
      "http://cdn.example.com/home",
      "data:text/plain,hi",
      "not a url",
    ] {
      assert_eq!(classify_origin(&page, url), ResponseOrigin::Foreign, "{url}");
    }
  }

  #[test]
  fn toggles_trailing_slash() {
    let with = Url::parse("http://host/home/").unwrap();
    let without = Url::parse("http://host/home").unwrap();
    assert_eq!(toggle_trailing_slash(&with), Some(without.clone()));
    assert_eq!(toggle_trailing_slash(&without), Some(with));
    assert_eq!(toggle_trailing_slash(&Url::parse("http://host/").unwrap()), None);
  }

  #[test]
  fn directory_like_local_paths_become_index_html() {
    let page = page();
    let body = CapturedResponse::new(200, "Chromatic");
    assert_eq!(
      asset_path(&page, "http://localhost:3000/home", &body),
      "/home/index.html"
    );
    assert_eq!(
      asset_path(&page, "http://localhost:3000/home/", &body),
      "/home/index.html"
    );
    assert_eq!(asset_path(&page, "http://localhost:3000/", &body), "/index.html");
  }

  #[test]
  fn local_paths_keep_their_extension() {
    let page = page();
    let css = CapturedResponse::new(200, "body{}").with_content_type("text/css");
    assert_eq!(
      asset_path(&page, "http://localhost:3000/static/app.v2.css", &css),
      "/static/app.v2.css"
    );
    let png = CapturedResponse::new(200, "img").with_content_type("image/png");
    assert_eq!(
      asset_path(&page, "http://localhost:3000/avatar", &png),
      "/avatar.png"
    );
  }

  #[test]
  fn query_strings_are_hashed_into_the_name() {
    let page = page();
    let png = CapturedResponse::new(200, "image").with_content_type("image/png");
    let path = asset_path(&page, "http://localhost:3000/img?src=some-path", &png);
    assert_eq!(path, format!("/img-{}.png", hash_hex(b"?src=some-path")));

    let other = asset_path(&page, "http://localhost:3000/img?src=other-path", &png);
    assert_ne!(path, other);
  }

  #[test]
  fn foreign_responses_are_named_by_body_hash() {
    let page = page();
    let font = CapturedResponse::new(200, "font-bytes").with_content_type("font/woff2");
    let a = asset_path(&page, "https://fonts.example.com/a.woff2", &font);
    let b = asset_path(&page, "https://cdn.example.com/other/name", &font);
    assert_eq!(a, b);
    assert_eq!(a, format!("/external/{}.woff2", hash_hex(b"font-bytes")));

    let different = CapturedResponse::new(200, "other-bytes").with_content_type("font/woff2");
    assert_ne!(
      a,
      asset_path(&page, "https://fonts.example.com/a.woff2", &different)
    );
  }

  #[test]
  fn extension_falls_back_to_url_then_bin() {
    let untyped = CapturedResponse::new(200, "x");
    assert_eq!(extension_for_resource(&untyped, "https://a.test/x/logo.SVG"), "svg");
    assert_eq!(extension_for_resource(&untyped, "https://a.test/x/logo"), "bin");
    let typed = CapturedResponse::new(200, "x").with_content_type("text/css; charset=utf-8");
    assert_eq!(extension_for_resource(&typed, "https://a.test/x/logo"), "css");
  }

  #[test]
  fn path_segments_are_sanitized() {
    let page = page();
    let css = CapturedResponse::new(200, "x").with_content_type("text/css");
    assert_eq!(
      asset_path(&page, "http://localhost:3000/my%20styles/a:b.css", &css),
      "/my_styles/a_b.css"
    );
  }

  #[test]
  fn name_suffix_goes_before_the_extension() {
    assert_eq!(with_name_suffix("/a_b.css", "f00"), "/a_b-f00.css");
    assert_eq!(with_name_suffix("/home/index.html", "f00"), "/home/index-f00.html");
    assert_eq!(with_name_suffix("/v1.2/LICENSE", "f00"), "/v1.2/LICENSE-f00");
    assert_eq!(with_name_suffix("/.env", "f00"), "/.env-f00");
  }

  #[test]
  fn hash_is_stable_hex() {
    let hash = hash_hex(b"image");
    assert_eq!(hash.len(), 32);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(hash, hash_hex(b"image"));
  }
}
