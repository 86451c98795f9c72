//! Working-copy change sets.
//!
//! Both Mercurial's `hg status` and Git's `git status --porcelain` report one
//! path per line prefixed by a status code. They are folded into a single
//! [`ChangeSet`] grouped by [`ChangeKind`] so that status output, module
//! diffs, and the JSON report share one representation.

use std::collections::BTreeMap;

use console::style;
use serde::Serialize;

/// What happened to a path in the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    Deleted,
    Renamed,
    Copied,
    Unmerged,
    Untracked,
}

impl ChangeKind {
    /// Decode a Mercurial status letter. Clean and ignored files yield `None`.
    pub fn from_hg_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(Self::Added),
            'M' => Some(Self::Modified),
            'R' => Some(Self::Removed),
            '!' => Some(Self::Deleted),
            '?' => Some(Self::Untracked),
            _ => None,
        }
    }

    /// Decode a Git porcelain status letter.
    pub fn from_git_code(code: char) -> Option<Self> {
        match code {
            'A' => Some(Self::Added),
            'M' | 'T' => Some(Self::Modified),
            'D' => Some(Self::Deleted),
            'R' => Some(Self::Renamed),
            'C' => Some(Self::Copied),
            'U' => Some(Self::Unmerged),
            '?' => Some(Self::Untracked),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Removed => "Removed",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
            Self::Copied => "Copied",
            Self::Unmerged => "Unmerged",
            Self::Untracked => "Untracked",
        }
    }

    /// Whether the path is known to version control, and can thus be diffed.
    pub fn is_tracked(&self) -> bool {
        !matches!(self, Self::Untracked)
    }

    fn paint(&self, text: String) -> String {
        let styled = style(text);
        let painted = match self {
            Self::Added => styled.green(),
            Self::Modified => styled.yellow(),
            Self::Renamed | Self::Copied => styled.blue(),
            Self::Removed | Self::Deleted | Self::Unmerged | Self::Untracked => styled.red(),
        };
        painted.to_string()
    }
}

/// Paths grouped by change kind, each group in the order reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<ChangeKind, Vec<String>>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ChangeKind, path: impl Into<String>) {
        self.0.entry(kind).or_default().push(path.into());
    }

    pub fn get(&self, kind: ChangeKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Number of changed paths across every kind.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChangeKind, &str)> {
        self.0
            .iter()
            .flat_map(|(kind, paths)| paths.iter().map(move |path| (*kind, path.as_str())))
    }

    /// Paths under version control, suitable as `diff` arguments.
    pub fn tracked_paths(&self) -> Vec<String> {
        self.iter()
            .filter(|(kind, _)| kind.is_tracked())
            .map(|(_, path)| path.to_string())
            .collect()
    }

    /// Human-readable report: a `[name]` banner followed by one colored line
    /// per path. Empty when nothing changed.
    pub fn render(&self, name: &str) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut lines = vec![crate::output::repo_banner(name)];
        lines.extend(
            self.iter()
                .map(|(kind, path)| kind.paint(format!("{}: {}", kind.label(), path))),
        );
        lines
    }
}

/// Parse `hg status` output (`M path/to/file`).
pub fn parse_hg_status<'a>(lines: impl IntoIterator<Item = &'a str>) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for line in lines {
        let mut chars = line.chars();
        let Some(code) = chars.next() else { continue };
        let path = chars.as_str().trim_start();
        if path.is_empty() {
            continue;
        }
        if let Some(kind) = ChangeKind::from_hg_code(code) {
            changes.insert(kind, path);
        }
    }
    changes
}

/// Parse `git status --porcelain` output (`XY path` or `XY old -> new`).
///
/// The worktree column wins over the index column when both are set.
pub fn parse_git_status<'a>(lines: impl IntoIterator<Item = &'a str>) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for line in lines {
        let mut chars = line.chars();
        let (Some(index), Some(worktree)) = (chars.next(), chars.next()) else {
            continue;
        };
        let path = chars.as_str().trim_start();
        if path.is_empty() {
            continue;
        }
        let path = path.rsplit(" -> ").next().unwrap_or(path);
        let code = if index == 'U' || worktree == 'U' {
            'U'
        } else if worktree != ' ' {
            worktree
        } else {
            index
        };
        if let Some(kind) = ChangeKind::from_git_code(code) {
            changes.insert(kind, path);
        }
    }
    changes
}

/// Changed files listed in a git-style diff (`hg diff --git` or `git diff`).
pub fn changes_from_diff<'a>(lines: impl IntoIterator<Item = &'a str>) -> ChangeSet {
    let mut changes = ChangeSet::new();
    let mut current: Option<(ChangeKind, String)> = None;
    for line in lines {
        if let Some(header) = line.strip_prefix("diff --git ") {
            if let Some((kind, path)) = current.take() {
                changes.insert(kind, path);
            }
            let path = header
                .rsplit(" b/")
                .next()
                .unwrap_or(header)
                .to_string();
            current = Some((ChangeKind::Modified, path));
        } else if let Some((kind, _)) = current.as_mut() {
            if line.starts_with("new file mode") {
                *kind = ChangeKind::Added;
            } else if line.starts_with("deleted file mode") {
                *kind = ChangeKind::Removed;
            } else if line.starts_with("rename from") {
                *kind = ChangeKind::Renamed;
            } else if line.starts_with("copy from") {
                *kind = ChangeKind::Copied;
            }
        }
    }
    if let Some((kind, path)) = current {
        changes.insert(kind, path);
    }
    changes
}

/// Color a diff: removals red, additions green.
///
/// File headers (`--- a/x`, `+++ b/x`) are rewritten to be relative to the
/// workspace root by inserting `prefix`, so the output can be applied from
/// there.
pub fn colorize_diff<'a>(lines: impl IntoIterator<Item = &'a str>, prefix: &str) -> Vec<String> {
    lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .map(|line| {
            if let Some(rest) = line.strip_prefix("--- a/") {
                style(format!("--- a/{}/{}", prefix, rest)).red().to_string()
            } else if let Some(rest) = line.strip_prefix("+++ b/") {
                style(format!("+++ b/{}/{}", prefix, rest)).green().to_string()
            } else if line.starts_with('-') {
                style(line).red().to_string()
            } else if line.starts_with('+') {
                style(line).green().to_string()
            } else {
                line.to_string()
            }
        })
        .collect()
}
