//! `vidrelay logs` – show the tail of the log file.

use anyhow::{Context, Result};
use std::path::Path;

pub fn run_logs(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("No log file at {} yet.", path.display());
        return Ok(());
    }
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    for line in tail_lines(&text, lines) {
        println!("{}", line);
    }
    Ok(())
}

/// The last `n` lines of `text`, oldest first.
fn tail_lines(text: &str, n: usize) -> Vec<&str> {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(n)..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_the_newest_lines_in_order() {
        let text = "one\ntwo\nthree\nfour\n";
        assert_eq!(tail_lines(text, 2), vec!["three", "four"]);
        assert_eq!(tail_lines(text, 10), vec!["one", "two", "three", "four"]);
        assert!(tail_lines(text, 0).is_empty());
        assert!(tail_lines("", 5).is_empty());
    }

    #[test]
    fn missing_log_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        run_logs(&dir.path().join("vidrelay.log"), 10).unwrap();
    }
}
