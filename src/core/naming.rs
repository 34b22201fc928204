//! core::naming
//!
//! Dataset path conventions.
//!
//! Dataset entries map to slash-separated paths
//! `entity_type/category/.../<ref_id>.json`. A leaf may own a sibling
//! binary directory `<ref_id>_bin` (its sidecar). The repository info file
//! sits at the root under a reserved name.
//!
//! Category names are free text and may contain `/`, so each path segment is
//! percent-encoded for the few characters that would break the path.

/// Suffix of every leaf entity blob.
pub const DATASET_SUFFIX: &str = ".json";

/// Suffix of the sidecar directory that holds an entity's binary files.
pub const BIN_DIR_SUFFIX: &str = "_bin";

/// Reserved root file holding the serialized repository info.
pub const REPOSITORY_INFO_FILE: &str = "repository.json";

/// Encode a category or entity name into a single path segment.
///
/// # Example
///
/// ```
/// use datagit::core::naming::{decode_segment, encode_segment};
///
/// assert_eq!(encode_segment("a/b"), "a%2Fb");
/// assert_eq!(encode_segment("100%"), "100%25");
/// assert_eq!(decode_segment(&encode_segment("x/y\\z%")), "x/y\\z%");
/// ```
pub fn encode_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\\' => out.push_str("%5C"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`encode_segment`]. Unknown escapes are kept verbatim.
pub fn decode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let escape = rest.get(pos..pos + 3);
        match escape {
            Some("%25") => out.push('%'),
            Some("%2F") | Some("%2f") => out.push('/'),
            Some("%5C") | Some("%5c") => out.push('\\'),
            _ => {
                out.push('%');
                rest = &rest[pos + 1..];
                continue;
            }
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    out
}

/// Join a prefix and a name; an empty prefix means the root.
pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Split a path into its parent and final segment.
///
/// ```
/// use datagit::core::naming::split_last;
///
/// assert_eq!(split_last("process/a/b.json"), ("process/a", "b.json"));
/// assert_eq!(split_last("process"), ("", "process"));
/// ```
pub fn split_last(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// The leaf file name of an entity.
pub fn leaf_name(ref_id: &str) -> String {
    format!("{}{}", encode_segment(ref_id), DATASET_SUFFIX)
}

/// Whether a tree entry name is a leaf entity blob.
pub fn is_leaf(name: &str) -> bool {
    name.len() > DATASET_SUFFIX.len() && name.ends_with(DATASET_SUFFIX)
}

/// The sidecar directory name of a leaf (`X.json` → `X_bin`).
///
/// ```
/// use datagit::core::naming::sidecar_of;
///
/// assert_eq!(sidecar_of("abc.json").as_deref(), Some("abc_bin"));
/// assert_eq!(sidecar_of("abc_bin"), None);
/// ```
pub fn sidecar_of(leaf: &str) -> Option<String> {
    if !is_leaf(leaf) {
        return None;
    }
    let stem = &leaf[..leaf.len() - DATASET_SUFFIX.len()];
    Some(format!("{stem}{BIN_DIR_SUFFIX}"))
}

/// The owning leaf of a sidecar directory name (`X_bin` → `X.json`).
///
/// ```
/// use datagit::core::naming::owner_of_sidecar;
///
/// assert_eq!(owner_of_sidecar("abc_bin").as_deref(), Some("abc.json"));
/// assert_eq!(owner_of_sidecar("abc.json"), None);
/// ```
pub fn owner_of_sidecar(name: &str) -> Option<String> {
    let stem = name.strip_suffix(BIN_DIR_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(format!("{stem}{DATASET_SUFFIX}"))
}

/// If `path` lies inside a sidecar directory, return the sidecar's path and
/// the file path relative to it.
///
/// ```
/// use datagit::core::naming::split_sidecar_path;
///
/// assert_eq!(
///     split_sidecar_path("process/a_bin/img/x.png"),
///     Some(("process/a_bin", "img/x.png"))
/// );
/// assert_eq!(split_sidecar_path("process/a.json"), None);
/// ```
pub fn split_sidecar_path(path: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for segment in path.split('/') {
        let end = offset + segment.len();
        if owner_of_sidecar(segment).is_some() && end < path.len() {
            return Some((&path[..end], &path[end + 1..]));
        }
        offset = end + 1;
    }
    None
}
