//! Architectural Enforcement
//!
//! Source scanners shared by the policy tests in `tests/`:
//! - No `unwrap()` / `expect()` in production code
//! - No sleep() calls in production code
//!
//! Production code is everything under the crates' `src/` directories
//! except `#[cfg(test)]` items and the `test_utils` module.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Source roots that hold production code, relative to the workspace root
pub const PRODUCTION_ROOTS: [&str; 2] = ["spingen/core/src", "viewer/src"];

/// Files that only exist for tests
const TEST_ONLY_FILES: [&str; 1] = ["test_utils.rs"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File, relative to the workspace root
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The line, trimmed
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every production `.rs` file
pub fn production_sources() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_ROOTS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let file = entry.path();
            let is_rust = file.extension().and_then(|s| s.to_str()) == Some("rs");
            let test_only = file
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| TEST_ONLY_FILES.contains(&n));
            if is_rust && !test_only {
                files.push(file.to_path_buf());
            }
        }
    }
    files.sort();
    files
}

/// Code part of every production line: comments and `#[cfg(test)]` items
/// are left out. Yields `(1-based line number, code)`.
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut pending_test_item = false;
    let mut entered = false;
    let mut depth: usize = 0;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        if depth == 0 && trimmed.starts_with("#[cfg(test)]") {
            pending_test_item = true;
            continue;
        }

        if pending_test_item || depth > 0 {
            let opens = line.matches('{').count();
            let closes = line.matches('}').count();
            depth = (depth + opens).saturating_sub(closes);
            entered |= opens > 0;
            // A test item ends at its closing brace or, braceless, at the `;`
            if depth == 0 && (entered || trimmed.ends_with(';')) {
                pending_test_item = false;
                entered = false;
            }
            continue;
        }

        let code = line.split("//").next().unwrap_or(line);
        if !code.trim().is_empty() {
            lines.push((idx + 1, code));
        }
    }
    lines
}

/// Scan every production file for lines whose code matches `is_violation`
pub fn scan(is_violation: impl Fn(&str) -> bool) -> Vec<Violation> {
    let root = workspace_root();
    let mut violations = Vec::new();

    for file in production_sources() {
        let content = match fs::read_to_string(&file) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let relative = file.strip_prefix(&root).unwrap_or(&file).to_path_buf();

        for (line, code) in production_lines(&content) {
            if is_violation(code) {
                violations.push(Violation {
                    path: relative.clone(),
                    line,
                    text: code.trim().to_string(),
                });
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cfg_test_modules_are_skipped() {
        let source = [
            "fn real() -> u8 {",
            "    value.unwrap() // flagged",
            "}",
            "",
            "#[cfg(test)]",
            "mod tests {",
            "    fn helper() {",
            "        thing.unwrap();",
            "    }",
            "}",
            "",
            "fn after() {",
            "    other.expect(\"x\");",
            "}",
        ]
        .join("\n");

        let lines: Vec<usize> = production_lines(&source)
            .into_iter()
            .filter(|(_, code)| code.contains("unwrap") || code.contains("expect"))
            .map(|(n, _)| n)
            .collect();
        assert_eq!(lines, vec![2, 13]);
    }

    #[test]
    fn test_braceless_cfg_test_item_is_skipped() {
        let source = "#[cfg(test)]\nuse crate::x::y;\nfn keep() {}\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(3, "fn keep() {}")]);
    }

    #[test]
    fn test_comments_are_ignored() {
        let source = "/// value.unwrap()\n// sleep(1)\nlet x = 1; // .expect(\n";
        let lines = production_lines(source);
        assert_eq!(lines, vec![(3, "let x = 1; ")]);
    }

    #[test]
    fn test_production_sources_found() {
        let files = production_sources();
        assert!(files.iter().any(|f| f.ends_with("client.rs")));
        assert!(files.iter().any(|f| f.ends_with("app.rs")));
        assert!(!files.iter().any(|f| f.ends_with("test_utils.rs")));
    }
}
