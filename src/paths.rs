//! POSIX-style path validation and normalization.
//!
//! All API-level paths use `/` as separator. Location paths start and end
//! with `/`; file paths start with `/` and end with a basename. `clean`
//! resolves `.` and `..` segments and refuses paths that escape above the
//! root.

use crate::errors::{Error, Operation, Result};

/// Resolves `.` and `..` segments and collapses repeated slashes in an
/// absolute path. The trailing slash of the input is preserved. Paths
/// that climb above `/` are rejected.
pub fn clean(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(Error::validation(Operation::Parse, format!("path {path:?} is not absolute")));
    }
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(Error::validation(Operation::Parse, format!("path {path:?} escapes above the root")));
                }
            }
            s => stack.push(s),
        }
    }
    let mut cleaned = String::with_capacity(path.len());
    for segment in &stack {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if cleaned.is_empty() {
        cleaned.push('/');
    } else if path.ends_with('/') {
        cleaned.push('/');
    }
    Ok(cleaned)
}

/// Cleans an absolute directory path and guarantees the leading and
/// trailing slash invariants of a location.
pub fn normalize_location(path: &str) -> Result<String> {
    let mut cleaned = clean(path)?;
    if !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    Ok(cleaned)
}

/// Cleans an absolute file path; the path must carry a basename.
pub fn normalize_file(path: &str) -> Result<String> {
    if path.ends_with('/') {
        return Err(Error::validation(Operation::Parse, format!("file path {path:?} ends with a slash")));
    }
    let cleaned = clean(path)?;
    if cleaned == "/" {
        return Err(Error::validation(Operation::Parse, format!("file path {path:?} has no basename")));
    }
    Ok(cleaned)
}

/// Validates a path used to derive a sub-location: relative, non-escaping.
pub fn validate_relative_location(rel: &str) -> Result<()> {
    if rel.starts_with('/') {
        return Err(Error::validation(Operation::Parse, format!("relative path {rel:?} is absolute")));
    }
    Ok(())
}

/// Validates a path used to derive a file: relative, non-empty, carrying
/// a basename.
pub fn validate_relative_file(rel: &str) -> Result<()> {
    if rel.is_empty() {
        return Err(Error::validation(Operation::Parse, "relative file path is empty"));
    }
    if rel.starts_with('/') {
        return Err(Error::validation(Operation::Parse, format!("relative path {rel:?} is absolute")));
    }
    if rel.ends_with('/') {
        return Err(Error::validation(Operation::Parse, format!("relative file path {rel:?} ends with a slash")));
    }
    Ok(())
}

/// Joins a location path with a relative directory path and normalizes.
pub fn join_location(base: &str, rel: &str) -> Result<String> {
    validate_relative_location(rel)?;
    normalize_location(&format!("{base}/{rel}"))
}

/// Joins a location path with a relative file path and normalizes.
pub fn join_file(base: &str, rel: &str) -> Result<String> {
    validate_relative_file(rel)?;
    normalize_file(&format!("{base}/{rel}"))
}

/// The final segment of a file path.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// The directory of a file path, with the trailing slash of a location.
pub fn dirname(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => format!("{}/", &trimmed[..i]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("/a/b/../c/./d", "/a/c/d")]
    #[case("/a//b///c/", "/a/b/c/")]
    #[case("/", "/")]
    #[case("/a/..", "/")]
    #[case("/./a/", "/a/")]
    fn clean_resolves_dots(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean(input).unwrap(), expected);
    }

    #[rstest]
    #[case("/..")]
    #[case("/a/../../b")]
    #[case("a/b")]
    fn clean_refuses_escape_and_relative(#[case] input: &str) {
        assert!(clean(input).is_err());
    }

    #[test]
    fn location_invariants() {
        assert_eq!(normalize_location("/a/b").unwrap(), "/a/b/");
        assert_eq!(normalize_location("/").unwrap(), "/");
        let p = normalize_location("/x/./y/../z").unwrap();
        assert!(p.starts_with('/') && p.ends_with('/'));
        assert_eq!(p, "/x/z/");
    }

    #[test]
    fn file_invariants() {
        assert_eq!(normalize_file("/a/b.txt").unwrap(), "/a/b.txt");
        assert!(normalize_file("/a/b/").is_err());
        assert!(normalize_file("/").is_err());
    }

    #[test]
    fn joins() {
        assert_eq!(join_location("/base/", "sub/deeper").unwrap(), "/base/sub/deeper/");
        assert_eq!(join_file("/base/", "sub/f.txt").unwrap(), "/base/sub/f.txt");
        assert_eq!(join_location("/base/sub/", "../sib").unwrap(), "/base/sib/");
        assert!(join_location("/base/", "/abs").is_err());
        assert!(join_file("/base/", "").is_err());
        assert!(join_file("/base/", "dir/").is_err());
    }

    #[test]
    fn basename_dirname() {
        assert_eq!(basename("/a/b/c.txt"), "c.txt");
        assert_eq!(dirname("/a/b/c.txt"), "/a/b/");
        assert_eq!(dirname("/c.txt"), "/");
        assert_eq!(basename("/a/b/"), "b");
    }
}
