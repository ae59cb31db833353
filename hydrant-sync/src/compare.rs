//! Artifact comparator — turns two artifact sets into a minimal changeset.
//!
//! The comparator is the no-op gate for the whole pipeline: when the next
//! set's fingerprint matches the previous one, the changeset is empty and
//! nothing downstream runs. Otherwise only paths whose bytes actually differ
//! appear in the changeset; files equal on both sides are never touched.

use std::collections::BTreeSet;
use std::path::Path;

use similar::TextDiff;

use hydrant_core::{Change, Changeset, HydratedArtifactSet};

/// Compare the previous artifact set (if any) with the next one.
///
/// `None` on the previous side means no artifacts have ever been produced,
/// so everything in `next` is an addition.
pub fn diff(previous: Option<&HydratedArtifactSet>, next: &HydratedArtifactSet) -> Changeset {
    let Some(previous) = previous else {
        let changes = next
            .iter()
            .map(|(path, contents)| Change::Added {
                path: path.to_path_buf(),
                contents: contents.to_vec(),
            })
            .collect();
        return Changeset::from_changes(changes);
    };

    if previous.fingerprint() == next.fingerprint() {
        return Changeset::default();
    }

    let mut paths: BTreeSet<&Path> = BTreeSet::new();
    paths.extend(previous.paths());
    paths.extend(next.paths());

    let mut changes = Vec::new();
    for path in paths {
        match (previous.get(path), next.get(path)) {
            (None, Some(contents)) => changes.push(Change::Added {
                path: path.to_path_buf(),
                contents: contents.to_vec(),
            }),
            (Some(old), None) => changes.push(Change::Removed {
                path: path.to_path_buf(),
                previous: old.to_vec(),
            }),
            (Some(old), Some(new)) if old != new => changes.push(Change::Modified {
                path: path.to_path_buf(),
                previous: old.to_vec(),
                contents: new.to_vec(),
            }),
            _ => {}
        }
    }
    Changeset::from_changes(changes)
}

// ---------------------------------------------------------------------------
// Unified diff rendering
// ---------------------------------------------------------------------------

/// Render a changeset as a unified diff for human review.
///
/// Text files get standard `a/` / `b/` hunks; binary files get a one-line
/// summary. Line endings are normalized for display only, never for the
/// comparison itself.
pub fn unified_diff(changeset: &Changeset) -> String {
    let mut out = String::new();
    for change in changeset.changes() {
        match change {
            Change::Added { path, contents } => match displayable(contents) {
                Some(new) => push_hunks(&mut out, path, "", &new, true, false),
                None => out.push_str(&format!(
                    "Binary file b/{} added ({} bytes)\n",
                    display_path(path),
                    contents.len()
                )),
            },
            Change::Removed { path, previous } => match displayable(previous) {
                Some(old) => push_hunks(&mut out, path, &old, "", false, true),
                None => out.push_str(&format!(
                    "Binary file a/{} removed ({} bytes)\n",
                    display_path(path),
                    previous.len()
                )),
            },
            Change::Modified {
                path,
                previous,
                contents,
            } => match (displayable(previous), displayable(contents)) {
                (Some(old), Some(new)) => push_hunks(&mut out, path, &old, &new, false, false),
                _ => out.push_str(&format!(
                    "Binary files a/{p} and b/{p} differ\n",
                    p = display_path(path)
                )),
            },
        }
    }
    out
}

fn push_hunks(out: &mut String, path: &Path, old: &str, new: &str, added: bool, removed: bool) {
    let old_header = if added {
        "/dev/null".to_string()
    } else {
        format!("a/{}", display_path(path))
    };
    let new_header = if removed {
        "/dev/null".to_string()
    } else {
        format!("b/{}", display_path(path))
    };
    let unified = TextDiff::from_lines(old, new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    out.push_str(&unified);
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn displayable(contents: &[u8]) -> Option<String> {
    if contents.contains(&0) {
        return None;
    }
    std::str::from_utf8(contents)
        .ok()
        .map(|s| s.replace("\r\n", "\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn set(files: &[(&str, &[u8])]) -> HydratedArtifactSet {
        files
            .iter()
            .map(|(p, c)| (PathBuf::from(p), c.to_vec()))
            .collect()
    }

    #[test]
    fn no_previous_means_everything_added() {
        let next = set(&[("a.yaml", b"1"), ("b.yaml", b"2")]);
        let changeset = diff(None, &next);
        assert_eq!(changeset.len(), 2);
        assert!(changeset
            .changes()
            .iter()
            .all(|c| matches!(c, Change::Added { .. })));
    }

    #[test]
    fn identical_sets_produce_empty_changeset() {
        let prev = set(&[("a.yaml", b"same")]);
        let next = set(&[("a.yaml", b"same")]);
        assert!(diff(Some(&prev), &next).is_empty());
    }

    #[test]
    fn only_differing_paths_appear() {
        let prev = set(&[
            ("keep.yaml", b"keep"),
            ("edit.yaml", b"old"),
            ("gone.yaml", b"bye"),
        ]);
        let next = set(&[
            ("keep.yaml", b"keep"),
            ("edit.yaml", b"new"),
            ("fresh.yaml", b"hi"),
        ]);

        let changeset = diff(Some(&prev), &next);
        assert_eq!(changeset.len(), 3);
        assert_eq!(changeset.counts(), (1, 1, 1));
        let labels: Vec<(&str, String)> = changeset
            .changes()
            .iter()
            .map(|c| (c.label(), c.path().display().to_string()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("modified", "edit.yaml".to_string()),
                ("added", "fresh.yaml".to_string()),
                ("removed", "gone.yaml".to_string()),
            ]
        );
    }

    #[test]
    fn diff_then_apply_reconstructs_next() {
        let prev = set(&[("a.yaml", b"1"), ("b.yaml", b"2")]);
        let next = set(&[("b.yaml", b"2x"), ("c.yaml", b"3")]);
        let changeset = diff(Some(&prev), &next);
        assert_eq!(changeset.apply(Some(&prev)), next);
    }

    #[test]
    fn unified_diff_uses_git_style_headers() {
        let prev = set(&[("app.yaml", b"region: us-east1\n")]);
        let next = set(&[("app.yaml", b"region: us-west1\n")]);
        let text = unified_diff(&diff(Some(&prev), &next));
        assert!(text.contains("--- a/app.yaml"));
        assert!(text.contains("+++ b/app.yaml"));
        assert!(text.contains("@@"));
        assert!(text.contains("-region: us-east1"));
        assert!(text.contains("+region: us-west1"));
    }

    #[test]
    fn added_files_diff_from_dev_null() {
        let next = set(&[("new.yaml", b"hello\n")]);
        let text = unified_diff(&diff(None, &next));
        assert!(text.contains("--- /dev/null"));
        assert!(text.contains("+++ b/new.yaml"));
    }

    #[test]
    fn binary_changes_are_summarized() {
        let prev = set(&[("blob.bin", &[0u8, 1, 2])]);
        let next = set(&[("blob.bin", &[0u8, 9, 9])]);
        let text = unified_diff(&diff(Some(&prev), &next));
        assert_eq!(text, "Binary files a/blob.bin and b/blob.bin differ\n");
    }
}
