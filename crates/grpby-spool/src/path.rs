//! Spill directory resolution.
//!
//! A configured directory may reference environment variables as `${VAR}`
//! or `%%VAR%%`. After substitution the plain filesystem path is tried
//! first; if it does not exist, a `file:` URI form is accepted as a
//! fallback.

use std::io;
use std::path::{Path, PathBuf};

use grpby_error::{GroupByError, Result};

/// Maps a configured spill directory to a concrete path.
///
/// Implementations must be `Send + Sync` so one resolver can be shared by
/// every operator instance of a pipeline.
pub trait PathResolver: Send + Sync {
    /// Resolve `configured` to an existing directory.
    fn resolve(&self, configured: &str) -> Result<PathBuf>;
}

/// Resolver backed by the local filesystem and process environment.
///
/// An empty configured directory means the system temporary directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPathResolver;

impl PathResolver for LocalPathResolver {
    fn resolve(&self, configured: &str) -> Result<PathBuf> {
        let substituted = substitute_env(configured.trim());
        if substituted.is_empty() {
            return Ok(std::env::temp_dir());
        }
        let plain = PathBuf::from(&substituted);
        if plain.is_dir() {
            return absolute(&plain);
        }
        if let Some(uri_path) = strip_file_uri(&substituted) {
            if uri_path.is_dir() {
                return absolute(&uri_path);
            }
        }
        Err(GroupByError::SpillCreate {
            path: plain,
            source: io::Error::new(io::ErrorKind::NotFound, "spill directory does not exist"),
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// `file:///tmp/x`, `file://localhost/tmp/x` and `file:/tmp/x` all map to
/// `/tmp/x`.
fn strip_file_uri(text: &str) -> Option<PathBuf> {
    let rest = text.strip_prefix("file:")?;
    let rest = match rest.strip_prefix("//") {
        Some(authority_and_path) => {
            let slash = authority_and_path.find('/')?;
            let host = &authority_and_path[..slash];
            if !host.is_empty() && host != "localhost" {
                return None;
            }
            &authority_and_path[slash..]
        }
        None => rest,
    };
    Some(PathBuf::from(rest))
}

/// Replace `${VAR}` and `%%VAR%%` references with the variable's value.
/// References to unset variables are left as written.
pub fn substitute_env(text: &str) -> String {
    let once = substitute_delimited(text, "${", "}");
    substitute_delimited(&once, "%%", "%%")
}

fn substitute_delimited(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };
        let name = &after_open[..end];
        out.push_str(&rest[..start]);
        match std::env::var(name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            _ => {
                out.push_str(open);
                out.push_str(name);
                out.push_str(close);
            }
        }
        rest = &after_open[end + close.len()..];
    }
    out.push_str(rest);
    out
}
