//! Resolving request paths to files across the search-path roots.

use std::path::{Component, Path, PathBuf};

/// Document served for `/`.
pub const INDEX_DOCUMENT: &str = "index.html";

/// A file found on disk, ready to be served.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Resolved path on disk
    pub path: PathBuf,

    /// File contents
    pub bytes: Vec<u8>,

    /// MIME type derived from the file extension
    pub content_type: &'static str,
}

impl Asset {
    /// Whether this asset should go through the HTML rewriter.
    pub fn is_html(&self) -> bool {
        self.content_type.starts_with("text/html")
    }
}

/// Ordered list of directories consulted for every request.
///
/// The first root that contains the requested file wins, so earlier roots
/// shadow later ones.
#[derive(Debug, Clone)]
pub struct SearchPath {
    roots: Vec<PathBuf>,
}

impl SearchPath {
    /// Create a search path over `roots`, highest priority first.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Find `request_path` in the first root that has it.
    pub async fn find(&self, request_path: &str) -> Option<Asset> {
        for root in &self.roots {
            if let Some(asset) = locate(root, request_path).await {
                return Some(asset);
            }
        }
        None
    }
}

/// Resolve a URL path against a single root.
///
/// Misses (absent file, directory, traversal attempt, unreadable file) all
/// come back as `None`.
pub async fn locate(root: &Path, request_path: &str) -> Option<Asset> {
    let relative = relative_path(request_path)?;
    let path = root.join(relative);

    let metadata = tokio::fs::metadata(&path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => Some(Asset {
            content_type: content_type(&path),
            path,
            bytes,
        }),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

/// Turn a URL path into a path relative to a root, refusing anything that
/// could step outside it.
fn relative_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    let trimmed = if trimmed.is_empty() {
        INDEX_DOCUMENT
    } else {
        trimmed
    };

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (!relative.as_os_str().is_empty()).then_some(relative)
}

/// Determine content type from file extension.
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" | "cjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
