//! Helpers for slash-separated coordination-tree paths.


/// Join a child name onto a base path.
pub fn join(base: &str, child: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{child}")
    } else {
        format!("{base}/{child}")
    }
}

/// Last path segment; the child node name.
pub fn child_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent path, or `None` for the root itself.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Non-empty path segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Every prefix path of `path`, shortest first.
///
/// `ancestors("/a/b/c")` yields `["/a", "/a/b", "/a/b/c"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    for segment in split_segments(path) {
        current.push('/');
        current.push_str(segment);
        result.push(current.clone());
    }
    result
}
