//! Request path resolution
//!
//! Maps a URI path onto the served root. Resolution never yields a path
//! outside the canonical root: `..` segments are refused outright and the
//! canonicalized target is checked again so symlinks cannot escape either.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::ResolveError;
use crate::logger;

/// Characters escaped when a path segment is written back into a URL
pub const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What a request path points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A regular file to send
    File(PathBuf),
    /// A directory without an index file
    Directory {
        path: PathBuf,
        /// Decoded, normalized request path, always ending in `/`
        request_path: String,
    },
    /// A directory requested without its trailing slash; holds the
    /// normalized, re-encoded location
    Redirect(String),
}

/// Resolve `uri_path` (still percent-encoded) against the canonical `root`
pub async fn resolve(
    root: &Path,
    uri_path: &str,
    index_files: &[String],
) -> Result<Resolved, ResolveError> {
    let decoded = percent_decode_str(uri_path)
        .decode_utf8()
        .map_err(|_| ResolveError::BadRequest)?;

    let segments = path_segments(&decoded).inspect_err(|_| {
        logger::log_warning(&format!("Path traversal attempt blocked: {uri_path}"));
    })?;
    let relative: PathBuf = segments.iter().collect();
    let target = canonical_within(root, &root.join(relative), uri_path).await?;
    let metadata = fs::metadata(&target).await.map_err(|e| ResolveError::from_io(&e))?;

    if metadata.is_dir() {
        // Rebuilt from segments so `//host` style paths cannot leave the origin
        if !decoded.ends_with('/') {
            return Ok(Resolved::Redirect(directory_url(&segments, true)));
        }
        for index in index_files {
            match canonical_within(root, &target.join(index), uri_path).await {
                Ok(path) if is_file(&path).await => return Ok(Resolved::File(path)),
                Ok(_) | Err(ResolveError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        return Ok(Resolved::Directory {
            path: target,
            request_path: directory_url(&segments, false),
        });
    }

    if !metadata.is_file() {
        return Err(ResolveError::Forbidden);
    }
    // `/file.txt/` names a directory that does not exist
    if decoded.ends_with('/') {
        return Err(ResolveError::NotFound);
    }
    Ok(Resolved::File(target))
}

/// Split a decoded URI path into the segments of a relative path.
///
/// Empty and `.` segments are dropped; `..`, backslashes and NUL bytes are
/// refused so the result can only point below the root.
fn path_segments(decoded: &str) -> Result<Vec<&str>, ResolveError> {
    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(ResolveError::Forbidden),
            s if s.contains(['\\', '\0']) || (cfg!(windows) && s.contains(':')) => {
                return Err(ResolveError::Forbidden);
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

/// `/a/b/` from `["a", "b"]`, percent-encoding each segment when `encode`
fn directory_url(segments: &[&str], encode: bool) -> String {
    let mut url = String::from("/");
    for segment in segments {
        if encode {
            url.extend(utf8_percent_encode(segment, PATH_SEGMENT));
        } else {
            url.push_str(segment);
        }
        url.push('/');
    }
    url
}

/// Canonicalize `candidate` and require it to stay below `root`
async fn canonical_within(
    root: &Path,
    candidate: &Path,
    uri_path: &str,
) -> Result<PathBuf, ResolveError> {
    let canonical = fs::canonicalize(candidate)
        .await
        .map_err(|e| canonicalize_error(&e))?;
    if canonical.starts_with(root) {
        Ok(canonical)
    } else {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {uri_path} -> {}",
            canonical.display()
        ));
        Err(ResolveError::Forbidden)
    }
}

fn canonicalize_error(err: &io::Error) -> ResolveError {
    let resolved = ResolveError::from_io(err);
    if resolved == ResolveError::NotFound && err.kind() != io::ErrorKind::NotFound {
        logger::log_debug(&format!("Treating path error as 404: {err}"));
    }
    resolved
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}
