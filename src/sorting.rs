//! # Group file ordering
//!
//! Orders the observation files named on the command line before they are
//! handed to the engine. The rule compares the byte length of the filename
//! **stem** (everything before the last `.`) first and falls back to plain
//! lexicographic comparison, so `points2.bin` sorts before `points10.bin`.
//!
//! The order matters for the sequential workflow: the first file seeds the
//! initial values and the first solution, and the per-group report numbering
//! follows it. The batch workflow's final answer is order-independent.

use std::cmp::Ordering;

use camino::{Utf8Path, Utf8PathBuf};

/// Byte length of the path string up to its last `.`; paths without a dot
/// count in full.
fn stem_len(path: &Utf8Path) -> usize {
    let s = path.as_str();
    s.rfind('.').unwrap_or(s.len())
}

/// Sort group filenames by stem length, then lexicographically.
pub fn sort_group_files(files: &mut [Utf8PathBuf]) {
    files.sort_by(|a, b| match stem_len(a).cmp(&stem_len(b)) {
        Ordering::Equal => a.as_str().cmp(b.as_str()),
        other => other,
    });
}

#[cfg(test)]
mod sorting_tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<Utf8PathBuf> {
        names.iter().map(Utf8PathBuf::from).collect()
    }

    #[test]
    fn test_shorter_stem_sorts_first() {
        let mut files = paths(&["points10.bin", "points2.bin", "b.bin"]);
        sort_group_files(&mut files);
        assert_eq!(files, paths(&["b.bin", "points2.bin", "points10.bin"]));
    }

    #[test]
    fn test_equal_stems_fall_back_to_lexicographic() {
        let mut files = paths(&["groupB.bin", "groupA.bin", "groupC.bin"]);
        sort_group_files(&mut files);
        assert_eq!(
            files,
            paths(&["groupA.bin", "groupB.bin", "groupC.bin"])
        );
    }

    #[test]
    fn test_paths_without_extension_use_full_length() {
        let mut files = paths(&["survey.bin", "ab", "x.dat"]);
        sort_group_files(&mut files);
        // stems: "survey" (6), "ab" (2), "x" (1)
        assert_eq!(files, paths(&["x.dat", "ab", "survey.bin"]));
    }
}
