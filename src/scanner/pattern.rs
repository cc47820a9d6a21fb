//! File name patterns for batch selection.
//!
//! A pattern is a comma-separated list of alternatives. Each alternative is
//! either a glob (`*.png`, `scans/**/*.tif`, `IMG_????.{jpg,heic}`) or a
//! bare extension (`png`, `.jpg`). Matching is case-insensitive. Globs
//! without a `/` are matched against the file name, the rest against the
//! path relative to the input root.

use regex::Regex;
use std::path::{Component, Path};

/// A compiled file pattern.
#[derive(Debug, Clone)]
pub struct FilePattern {
    source: String,
    name_regex: Option<Regex>,
    path_regex: Option<Regex>,
}

impl FilePattern {
    /// Compile a pattern.
    ///
    /// ```
    /// use fileforge::scanner::FilePattern;
    /// use std::path::Path;
    ///
    /// let pattern = FilePattern::new("png, *.JPG").unwrap();
    /// assert!(pattern.matches(Path::new("holiday/beach.png")));
    /// assert!(pattern.matches(Path::new("cat.jpg")));
    /// assert!(!pattern.matches(Path::new("notes.txt")));
    /// ```
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut name_alternatives = Vec::new();
        let mut path_alternatives = Vec::new();

        for token in split_top_level(pattern) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let glob = if is_bare_extension(token) {
                format!("*.{}", token.trim_start_matches('.'))
            } else {
                token.to_string()
            };
            let regex = glob_to_regex(&glob);
            if glob.contains('/') {
                path_alternatives.push(regex);
            } else {
                name_alternatives.push(regex);
            }
        }

        let compile = |alternatives: Vec<String>| -> Result<Option<Regex>, regex::Error> {
            if alternatives.is_empty() {
                return Ok(None);
            }
            Regex::new(&format!("(?i)^(?:{})$", alternatives.join("|"))).map(Some)
        };

        Ok(Self {
            source: pattern.to_string(),
            name_regex: compile(name_alternatives)?,
            path_regex: compile(path_alternatives)?,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Test a path relative to the input root.
    pub fn matches(&self, relative: &Path) -> bool {
        if self.name_regex.is_none() && self.path_regex.is_none() {
            return true;
        }

        if let Some(regex) = &self.name_regex {
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            if regex.is_match(&name) {
                return true;
            }
        }

        if let Some(regex) = &self.path_regex {
            let joined = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/");
            return regex.is_match(&joined);
        }

        false
    }
}

/// No glob syntax and either a leading dot or no dot at all.
fn is_bare_extension(token: &str) -> bool {
    !token.contains(['*', '?', '[', '{', '/'])
        && (token.starts_with('.') || !token.contains('.'))
}

/// Split on commas that are not inside `{...}`.
fn split_top_level(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in pattern.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&pattern[start..]);
    parts
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    let mut in_braces = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                in_braces += 1;
                out.push_str("(?:");
            }
            '}' if in_braces > 0 => {
                in_braces -= 1;
                out.push(')');
            }
            ',' if in_braces > 0 => out.push('|'),
            '[' => match chars[i + 1..].iter().position(|&c| c == ']') {
                Some(len) => {
                    let class: String = chars[i + 1..i + 1 + len].iter().collect();
                    let class = class
                        .strip_prefix('!')
                        .map(|rest| format!("^{rest}"))
                        .unwrap_or(class);
                    out.push('[');
                    out.push_str(&class.replace('\\', "\\\\"));
                    out.push(']');
                    i += len + 2;
                    continue;
                }
                None => out.push_str(r"\["),
            },
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    for _ in 0..in_braces {
        out.push(')');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        FilePattern::new(pattern).unwrap().matches(Path::new(path))
    }

    #[test]
    fn test_extension_lists() {
        assert!(matches("png,jpg", "a.PNG"));
        assert!(matches(".jpg", "deep/dir/b.jpg"));
        assert!(!matches("png", "png"));
        assert!(!matches("png", "a.png.bak"));
    }

    #[test]
    fn test_globs() {
        assert!(matches("*.png", "x/y/shot.png"));
        assert!(matches("IMG_????.jpg", "IMG_0042.jpg"));
        assert!(!matches("IMG_????.jpg", "IMG_42.jpg"));
        assert!(matches("*.{jpg,jpeg}", "a.jpeg"));
        assert!(matches("report[0-9].pdf", "report7.pdf"));
        assert!(!matches("report[!0-9].pdf", "report7.pdf"));
        assert!(matches("a+b (1).txt", "a+b (1).txt"));
    }

    #[test]
    fn test_path_globs() {
        assert!(matches("scans/**/*.tif", "scans/2021/may/page.tif"));
        assert!(matches("scans/**/*.tif", "scans/page.tif"));
        assert!(!matches("scans/*.tif", "scans/2021/page.tif"));
        assert!(!matches("scans/**/*.tif", "other/page.tif"));
    }

    #[test]
    fn test_literal_file_name() {
        assert!(matches("cover.png", "book/cover.png"));
        assert!(!matches("cover.png", "book/back.png"));
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        assert!(matches("", "anything.bin"));
        assert!(matches(" , ", "anything.bin"));
    }
}
