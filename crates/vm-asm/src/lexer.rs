//! Line splitting: strips whitespace, collapses internal runs, drops blank
//! lines and `#`-comment lines.

/// One non-empty, non-comment source line: its 1-based line number and its
/// whitespace-split tokens, not yet classified.
#[derive(Debug, Clone)]
pub struct RawLine {
    pub number: usize,
    pub words: Vec<String>,
}

#[must_use]
pub fn split_lines(source: &str) -> Vec<RawLine> {
    source
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let words: Vec<String> = trimmed.split_whitespace().map(str::to_string).collect();
            Some(RawLine { number: i + 1, words })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::split_lines;

    #[test]
    fn blank_and_comment_lines_are_dropped_and_whitespace_collapses() {
        let source = "\n  # a comment\nmov   r0    42\n\n.word x 1\n";
        let lines = split_lines(source);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 3);
        assert_eq!(lines[0].words, vec!["mov", "r0", "42"]);
        assert_eq!(lines[1].number, 5);
    }
}
