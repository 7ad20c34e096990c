//! Architectural Enforcement
//!
//! Line-based source scanners shared by the policy tests in `tests/`.
//! They do not parse Rust; they walk backwards from a line to the nearest
//! function signature, which is enough for rustfmt-formatted code.

use std::path::{Path, PathBuf};

/// Kind of function enclosing a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enclosing {
    /// `async fn`
    Async,
    /// Plain `fn`
    Sync,
    /// Not inside a function (module level, or past an impl boundary)
    None,
}

/// A source line that breaks a policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File the line is in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What rule it breaks
    pub rule: &'static str,
    /// The offending line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.text
        )
    }
}

/// Strip visibility and qualifiers, returning the rest if the line starts a fn
fn fn_signature(line: &str) -> Option<&str> {
    let mut rest = line.trim_start();
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    for qualifier in ["const ", "unsafe "] {
        if let Some(stripped) = rest.strip_prefix(qualifier) {
            rest = stripped;
        }
    }
    (rest.starts_with("fn ") || rest.starts_with("async fn ")).then_some(rest)
}

fn is_boundary(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("mod ")
        || line.starts_with("pub mod ")
        || (line.starts_with("impl") && line.ends_with('{'))
}

/// Kind of the function enclosing `lines[current_idx]`
#[must_use]
pub fn enclosing_function(lines: &[&str], current_idx: usize) -> Enclosing {
    for i in (0..current_idx).rev() {
        if let Some(signature) = fn_signature(lines[i]) {
            return if signature.starts_with("async fn ") {
                Enclosing::Async
            } else {
                Enclosing::Sync
            };
        }
        if is_boundary(lines[i]) {
            return Enclosing::None;
        }
    }
    Enclosing::None
}

/// Whether `lines[current_idx]` is inside test code
///
/// True inside a `#[cfg(test)]` module, or a function marked `#[test]` or
/// `#[tokio::test]`.
#[must_use]
pub fn is_in_test_code(lines: &[&str], current_idx: usize) -> bool {
    let in_test_module = lines[..current_idx].iter().any(|line| {
        line.trim() == "#[cfg(test)]"
    });
    if in_test_module {
        return true;
    }

    let Some(fn_idx) = (0..current_idx)
        .rev()
        .find(|&i| fn_signature(lines[i]).is_some())
    else {
        return false;
    };

    for line in lines[..fn_idx].iter().rev() {
        let line = line.trim();
        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if !(line.starts_with("#[") || line.starts_with("///")) {
            break;
        }
    }
    false
}

/// Every `.rs` file under `dir`
#[must_use]
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Source directories of the workspace crates
#[must_use]
pub fn production_dirs() -> Vec<PathBuf> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    vec![
        root.join("presence/core/src"),
        root.join("presence/cli/src"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = [
            "    pub async fn connect(&self) -> Result<()> {",
            "        let contents = std::fs::read_to_string(\"file.txt\")?;",
            "    }",
        ];
        assert_eq!(enclosing_function(&code, 1), Enclosing::Async);
    }

    #[test]
    fn test_sync_function_detection() {
        let code = [
            "pub fn load_config() -> Result<ClientConfig, ConfigError> {",
            "    let contents = std::fs::read_to_string(\"presence.toml\")?;",
            "}",
        ];
        assert_eq!(enclosing_function(&code, 1), Enclosing::Sync);
    }

    #[test]
    fn test_impl_boundary_stops_scan() {
        let code = [
            "async fn before() {}",
            "impl Foo {",
            "    const X: usize = 1;",
        ];
        assert_eq!(enclosing_function(&code, 2), Enclosing::None);
    }

    #[test]
    fn test_test_function_detection() {
        let code = [
            "#[tokio::test(start_paused = true)]",
            "async fn test_something() {",
            "    let contents = std::fs::read_to_string(\"test.txt\")?;",
            "}",
        ];
        assert!(is_in_test_code(&code, 2));

        let code = ["async fn run() {", "    std::fs::remove_file(p);", "}"];
        assert!(!is_in_test_code(&code, 1));
    }

    #[test]
    fn test_test_module_detection() {
        let code = [
            "#[cfg(test)]",
            "mod tests {",
            "    async fn helper() {",
            "        std::fs::read(\"x\");",
        ];
        assert!(is_in_test_code(&code, 3));
    }

    #[test]
    fn test_production_dirs_exist() {
        for dir in production_dirs() {
            assert!(dir.is_dir(), "missing source dir {}", dir.display());
        }
    }
}
