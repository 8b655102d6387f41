//! Architecture enforcement tests.
//!
//! The address space is the only layer allowed to bind wrappers, so only
//! `space` (and the store that owns the slot) may touch store context
//! handles. Serializer backends stay independent of the address space so
//! they can be used on records alone.
//!
//! # Test Categories
//!
//! 1. **Context Ownership** - Only `src/space` and `src/store` set contexts
//! 2. **Backend Independence** - Backends do not import `crate::space`
//! 3. **No Panicking Shortcuts** - Library code does not unwrap or expect

use std::fs;
use std::path::{Path, PathBuf};

/// Backend files that must not depend on the address space.
const BACKEND_FILES: &[&str] = &[
    "src/serializer/mod.rs",
    "src/serializer/memory.rs",
    "src/serializer/json_file.rs",
];

/// Directories allowed to call `set_context`.
const CONTEXT_OWNERS: &[&str] = &["src/space", "src/store"];

fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).expect("Failed to read source directory") {
            let path = entry.expect("Failed to read entry").path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Source text before the first test module, without comment lines.
fn library_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(i, line)| (i + 1, line))
        .collect()
}

// =============================================================================
// Context Ownership
// =============================================================================

#[test]
fn only_space_and_store_set_contexts() {
    let mut violations = Vec::new();

    for path in rust_files(Path::new("src")) {
        let display = path.to_string_lossy().replace('\\', "/");
        if CONTEXT_OWNERS.iter().any(|owner| display.starts_with(owner)) {
            continue;
        }
        let content = fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read {}", display));
        for (line_no, line) in library_lines(&content) {
            if line.contains("set_context(") {
                violations.push(format!("{}:{}: sets a store context", display, line_no));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Context handles must only be managed by the address space:\n{}",
        violations.join("\n")
    );
}

// =============================================================================
// Backend Independence
// =============================================================================

#[test]
fn backends_do_not_depend_on_space() {
    let mut violations = Vec::new();

    for file in BACKEND_FILES {
        let content = fs::read_to_string(file).unwrap_or_else(|_| panic!("Failed to read {}", file));
        for (line_no, line) in library_lines(&content) {
            if line.contains("crate::space") {
                violations.push(format!("{}:{}: imports crate::space", file, line_no));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Serializer backends must work on records alone:\n{}",
        violations.join("\n")
    );
}

// =============================================================================
// No Panicking Shortcuts
// =============================================================================

#[test]
fn library_code_does_not_unwrap() {
    let mut violations = Vec::new();

    for path in rust_files(Path::new("src")) {
        let display = path.to_string_lossy().replace('\\', "/");
        let content = fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read {}", display));
        for (line_no, line) in library_lines(&content) {
            if line.contains(".unwrap()") || line.contains(".expect(") {
                violations.push(format!("{}:{}: {}", display, line_no, line.trim()));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Library code must propagate errors instead of panicking:\n{}",
        violations.join("\n")
    );
}
