//! Normalization of virtual store paths.
//!
//! Store paths are absolute, POSIX-style and case-sensitive: `/App.jsx`,
//! `/components/Calculator.jsx`. Relative input is rooted at `/`.

use crate::errors::StoreError;

pub const ROOT: &str = "/";

/// Collapse `raw` into canonical segments, rejecting anything that climbs
/// above the root or is not a POSIX path.
fn segments(raw: &str) -> Result<Vec<&str>, StoreError> {
    if raw.is_empty() {
        return Err(StoreError::invalid_path(raw, "empty path"));
    }
    if raw.contains('\\') {
        return Err(StoreError::invalid_path(
            raw,
            "backslash separators are not allowed",
        ));
    }
    if raw.contains('\0') {
        return Err(StoreError::invalid_path(raw, "NUL byte in path"));
    }

    let mut stack: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if stack.pop().is_none() {
                    return Err(StoreError::invalid_path(raw, "escapes the project root"));
                }
            }
            normal => stack.push(normal),
        }
    }
    Ok(stack)
}

fn render(segments: &[&str]) -> String {
    let mut out = String::with_capacity(segments.iter().map(|s| s.len() + 1).sum());
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Normalize a path naming a file
pub fn normalize(raw: &str) -> Result<String, StoreError> {
    if raw.ends_with('/') && raw != ROOT {
        return Err(StoreError::invalid_path(raw, "names a directory"));
    }
    let parts = segments(raw)?;
    if parts.is_empty() {
        return Err(StoreError::invalid_path(raw, "the root is a directory"));
    }
    Ok(render(&parts))
}

/// Normalize a path naming a directory; `/` is allowed
pub fn normalize_dir(raw: &str) -> Result<String, StoreError> {
    let parts = segments(raw)?;
    Ok(render(&parts))
}

/// Join `relative` onto the directory `base_dir` and normalize the result
pub fn join(base_dir: &str, relative: &str) -> Result<String, StoreError> {
    let combined = if relative.starts_with('/') {
        relative.to_string()
    } else {
        format!("{}/{}", base_dir.trim_end_matches('/'), relative)
    };
    let parts = segments(&combined)?;
    Ok(render(&parts))
}

/// Directory containing `path`; the root's parent is the root
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

/// Last segment of `path`
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension of the last segment, without the dot. Dotfiles have none.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 < name.len() => Some(&name[idx + 1..]),
        Some(_) => None,
    }
}

/// True if `path` lies strictly inside the directory `dir`
pub fn is_within(path: &str, dir: &str) -> bool {
    if dir == ROOT {
        return path != ROOT;
    }
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}
