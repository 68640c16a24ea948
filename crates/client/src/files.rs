//! File-name arguments: comma lists and local wildcard expansion.

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};

use crate::error::ClientError;

/// Names containing these characters are patterns, not literal names.
const WILDCARDS: [char; 3] = ['*', '?', '~'];

pub fn has_wildcard(name: &str) -> bool {
    name.contains(WILDCARDS)
}

/// Splits a comma-separated argument, dropping blank entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expands `pattern` against `base`, one path component at a time. Only
/// regular files are returned, sorted, relative to `base` unless the
/// pattern is absolute.
pub fn expand_local(base: &Path, pattern: &str) -> Result<Vec<String>, ClientError> {
    let mut candidates = vec![PathBuf::new()];

    for component in Path::new(pattern).components() {
        let segment = match component {
            Component::Normal(segment) => segment.to_string_lossy(),
            other => {
                for candidate in &mut candidates {
                    candidate.push(other.as_os_str());
                }
                continue;
            }
        };

        if !segment.contains(['*', '?']) {
            for candidate in &mut candidates {
                candidate.push(&*segment);
            }
            continue;
        }

        let matcher = segment_matcher(&segment)?;
        let mut next = Vec::new();
        for candidate in &candidates {
            let Ok(entries) = std::fs::read_dir(base.join(candidate)) else {
                continue;
            };
            let mut names: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| matcher.is_match(name))
                .collect();
            names.sort();
            next.extend(names.into_iter().map(|name| candidate.join(name)));
        }
        candidates = next;
    }

    Ok(candidates
        .into_iter()
        .filter(|candidate| base.join(candidate).is_file())
        .map(|candidate| candidate.to_string_lossy().into_owned())
        .collect())
}

/// `*` and `?` are the only active characters; everything else, `~`
/// included, matches itself.
fn segment_matcher(segment: &str) -> Result<GlobMatcher, ClientError> {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '[' | ']' | '{' | '}' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    let glob = GlobBuilder::new(&escaped)
        .literal_separator(true)
        .backslash_escape(true)
        .build()?;
    Ok(glob.compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.log", "[x]1.txt", "~notes"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/d.txt"), b"x").unwrap();
        fs::create_dir(tmp.path().join("dir.txt")).unwrap();
        tmp
    }

    #[test]
    fn wildcard_markers() {
        assert!(has_wildcard("*.txt"));
        assert!(has_wildcard("file?.log"));
        assert!(has_wildcard("~backup"));
        assert!(!has_wildcard("plain.txt"));
    }

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn star_matches_files_only_sorted() {
        let tmp = tree();
        let found = expand_local(tmp.path(), "*.txt").unwrap();
        assert_eq!(found, vec!["[x]1.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn question_mark_and_nested_segments() {
        let tmp = tree();
        assert_eq!(expand_local(tmp.path(), "?.log").unwrap(), vec!["c.log"]);
        assert_eq!(expand_local(tmp.path(), "sub/*.txt").unwrap(), vec!["sub/d.txt"]);
        assert_eq!(expand_local(tmp.path(), "s*/d.txt").unwrap(), vec!["sub/d.txt"]);
    }

    #[test]
    fn brackets_and_tilde_are_literal() {
        let tmp = tree();
        assert_eq!(expand_local(tmp.path(), "[x]*").unwrap(), vec!["[x]1.txt"]);
        assert_eq!(expand_local(tmp.path(), "~notes").unwrap(), vec!["~notes"]);
        assert!(expand_local(tmp.path(), "~missing").unwrap().is_empty());
    }

    #[test]
    fn absolute_pattern_stays_absolute() {
        let tmp = tree();
        let pattern = format!("{}/a.*", tmp.path().display());
        let found = expand_local(Path::new("/nonexistent"), &pattern).unwrap();
        assert_eq!(found, vec![tmp.path().join("a.txt").display().to_string()]);
    }

    #[test]
    fn no_match_is_empty() {
        let tmp = tree();
        assert!(expand_local(tmp.path(), "*.csv").unwrap().is_empty());
    }
}
