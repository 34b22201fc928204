//! Architecture enforcement tests.
//!
//! The `git` module is the single doorway to git repositories: no other
//! module may touch `git2` directly. Stores reach repositories only through
//! `crate::git::Git`, and everything above the store layer talks to the
//! `ObjectStore` trait. These tests catch violations in CI.

use std::fs;
use std::path::{Path, PathBuf};

/// All `.rs` files below `dir`.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).expect("Failed to read source directory") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().is_some_and(|e| e == "rs") {
            files.push(path);
        }
    }
    files
}

fn src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

/// Lines of `content` outside `#[cfg(test)]` modules.
fn non_test_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .take_while(|line| !line.contains("#[cfg(test)]"))
}

#[test]
fn only_git_module_uses_git2() {
    let git_dir = src_dir().join("git");
    let mut violations = Vec::new();

    for file in rust_files(&src_dir()) {
        if file.starts_with(&git_dir) {
            continue;
        }
        let content = fs::read_to_string(&file).expect("Failed to read source file");
        if non_test_lines(&content).any(|line| line.contains("git2::")) {
            violations.push(file.display().to_string());
        }
    }

    assert!(
        violations.is_empty(),
        "git2 used outside src/git: {violations:?}"
    );
}

#[test]
fn sync_and_writer_only_see_object_stores() {
    let mut violations = Vec::new();

    for layer in ["sync", "writer"] {
        for file in rust_files(&src_dir().join(layer)) {
            let content = fs::read_to_string(&file).expect("Failed to read source file");
            if non_test_lines(&content)
                .any(|line| line.contains("crate::git::") || line.contains("GitStore"))
            {
                violations.push(file.display().to_string());
            }
        }
    }

    assert!(
        violations.is_empty(),
        "concrete repositories used above the store layer: {violations:?}"
    );
}

#[test]
fn library_code_does_not_unwrap() {
    let mut violations = Vec::new();

    for file in rust_files(&src_dir()) {
        let content = fs::read_to_string(&file).expect("Failed to read source file");
        for (number, line) in non_test_lines(&content).enumerate() {
            let code = line.trim_start();
            if code.starts_with("//") {
                continue;
            }
            if code.contains(".unwrap()") || code.contains(".expect(") {
                violations.push(format!("{}:{}", file.display(), number + 1));
            }
        }
    }

    assert!(violations.is_empty(), "unwrap/expect in library code: {violations:?}");
}
