//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code in the library and the CLI MUST NOT block the
//! runtime thread. The presence client shares its runtime with the host
//! application, so a blocking call in a background task stalls the host.
//!
//! **Required**: `tokio::fs`, `tokio::net`, `tokio::time::sleep` inside
//! `async fn`. Plain functions (config loading before the runtime starts)
//! and test code may block.

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    enclosing_function, is_in_test_code, production_dirs, rust_files, Enclosing, Violation,
};

/// Blocking calls and what to use instead
const FORBIDDEN_IN_ASYNC: [(&str, &str); 5] = [
    ("std::fs::", "Blocking file I/O (use tokio::fs)"),
    ("std::net::", "Blocking network I/O (use tokio::net)"),
    ("std::os::unix::net::", "Blocking Unix socket (use tokio::net::UnixStream)"),
    ("std::thread::sleep", "Thread sleep (use tokio::time::sleep)"),
    ("std::process::Command", "Blocking process (use tokio::process)"),
];

#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();
    for dir in production_dirs() {
        for file in rust_files(&dir) {
            check_file(&file, &mut violations);
        }
    }

    if !violations.is_empty() {
        eprintln!("\nBlocking calls found in async production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        panic!(
            "\nFound {} blocking call(s) in async code.",
            violations.len()
        );
    }
}

#[test]
fn test_no_blocking_std_io_traits_on_streams() {
    // The transport must only ever see tokio's async traits
    let transport = production_dirs()[0].join("transport");
    for file in rust_files(&transport) {
        let content = fs::read_to_string(&file).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        for (idx, line) in lines.iter().enumerate() {
            if is_in_test_code(&lines, idx) {
                continue;
            }
            assert!(
                !line.contains("std::io::Read") && !line.contains("std::io::Write"),
                "{}:{} uses blocking std::io traits",
                file.display(),
                idx + 1
            );
        }
    }
}

fn check_file(path: &Path, violations: &mut Vec<Violation>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let code = line.split("//").next().unwrap_or(line);

        if is_in_test_code(&lines, idx) {
            continue;
        }
        if enclosing_function(&lines, idx) != Enclosing::Async {
            continue;
        }

        for (pattern, rule) in FORBIDDEN_IN_ASYNC {
            if code.contains(pattern) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    rule,
                    text: line.trim().to_string(),
                });
            }
        }
    }
}
