//! # Repository Manifest
//!
//! A workspace is described by one or more INI manifests. Each section is a
//! repository:
//!
//! ```ini
//! [trytond]
//! repo = hg
//! url = https://hg.tryton.org/trytond
//! path = ./tryton
//! branch = 7.0
//!
//! [sao]
//! repo = git
//! url = ssh://git@github.com/tryton/sao.git
//! path = ./tryton
//! ```
//!
//! Recognized keys are `repo` (`hg` or `git`), `url`, `path`, `branch`,
//! `revision`, `pypi`, `unstable` and `patch`. A section with a `patch` key
//! is a patch-only entry and takes no part in SCM operations.
//!
//! ## Loading
//!
//! Without explicit paths, [`Manifest::load`] reads `config/*.cfg` (sorted by
//! file name) and then `local.cfg` from the workspace root. Files are merged
//! in order: a section repeated in a later file overrides the earlier keys
//! but keeps its original position. Within a single file a section name may
//! appear only once.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ini::{EscapePolicy, Ini, ParseOption};
use log::debug;
use serde::Serialize;

use crate::defaults;
use crate::error::{Error, Result};

/// Source control system a repository is managed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Mercurial,
    Git,
}

impl RepoKind {
    /// Parses the `repo` key of a manifest section.
    pub fn from_key(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hg" | "mercurial" => Some(RepoKind::Mercurial),
            "git" => Some(RepoKind::Git),
            _ => None,
        }
    }

    /// The value written in manifests.
    pub fn key(&self) -> &'static str {
        match self {
            RepoKind::Mercurial => "hg",
            RepoKind::Git => "git",
        }
    }

    pub fn default_branch(&self) -> &'static str {
        match self {
            RepoKind::Mercurial => "default",
            RepoKind::Git => "main",
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoKind::Mercurial => write!(f, "mercurial"),
            RepoKind::Git => write!(f, "git"),
        }
    }
}

/// One repository of the workspace, as described by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub kind: RepoKind,
    pub url: String,
    /// Working copy location: `<path>/<name>`.
    pub local_path: PathBuf,
    pub branch: String,
    /// Pinned revision; `None` tracks the branch tip.
    pub revision: Option<String>,
    /// Package index name (`pypi` key).
    pub package_index: Option<String>,
}

impl RepositoryDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: RepoKind,
        url: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            url: url.into(),
            local_path: local_path.into(),
            branch: kind.default_branch().to_string(),
            revision: None,
            package_index: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Whether the working copy exists on disk.
    pub fn is_present(&self) -> bool {
        self.local_path.exists()
    }
}

/// Flags altering which entries are read and how.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestOptions {
    /// Include sections marked `unstable = true`.
    pub unstable: bool,
    /// Drop pinned revisions so every repository tracks its branch tip.
    pub development: bool,
}

/// The repositories of a workspace, in manifest order.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    repositories: Vec<RepositoryDescriptor>,
    patch_only: Vec<String>,
    sources: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct RawSection {
    name: String,
    source: PathBuf,
    keys: Vec<(String, String)>,
}

impl RawSection {
    fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<&str> {
        self.get_non_empty(key).ok_or_else(|| Error::ManifestParse {
            path: self.source.display().to_string(),
            message: format!(
                "section [{}] is missing required key '{}'",
                self.name, key
            ),
        })
    }

    fn merge(&mut self, other: RawSection) {
        for (key, value) in other.keys {
            match self.keys.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => self.keys.push((key, value)),
            }
        }
        self.source = other.source;
    }
}

fn parse_options() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

fn parse_sections(content: &str, source: &Path) -> Result<Vec<RawSection>> {
    let parse_error = |message: String| Error::ManifestParse {
        path: source.display().to_string(),
        message,
    };

    let ini = Ini::load_from_str_opt(content, parse_options())
        .map_err(|e| parse_error(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut sections = Vec::new();
    for (section, properties) in ini.iter() {
        let Some(name) = section else {
            if properties.iter().next().is_some() {
                return Err(parse_error(
                    "entries found before the first section header".to_string(),
                ));
            }
            continue;
        };
        let name = name.trim();
        if !seen.insert(name.to_string()) {
            return Err(parse_error(format!("duplicate section [{}]", name)));
        }
        sections.push(RawSection {
            name: name.to_string(),
            source: source.to_path_buf(),
            keys: properties
                .iter()
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                .collect(),
        });
    }
    Ok(sections)
}

fn is_true(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("1" | "yes" | "true" | "on")
    )
}

impl Manifest {
    /// Reads the manifests of the workspace at `root`.
    ///
    /// With an empty `paths`, the conventional search path is used and
    /// [`Error::ManifestNotFound`] is returned when it yields nothing. An
    /// explicitly requested file that does not exist is also
    /// `ManifestNotFound`.
    pub fn load(root: &Path, paths: &[PathBuf], options: ManifestOptions) -> Result<Self> {
        let files = if paths.is_empty() {
            let found = search_paths(root)?;
            if found.is_empty() {
                return Err(Error::ManifestNotFound {
                    searched: format!(
                        "{}, {}",
                        root.join(defaults::MANIFEST_DIR)
                            .join(defaults::MANIFEST_PATTERN)
                            .display(),
                        root.join(defaults::LOCAL_MANIFEST).display()
                    ),
                    hint: Some(
                        "Create a manifest under config/ or pass --config <FILE>".to_string(),
                    ),
                });
            }
            found
        } else {
            for path in paths {
                if !path.is_file() {
                    return Err(Error::ManifestNotFound {
                        searched: path.display().to_string(),
                        hint: None,
                    });
                }
            }
            paths.to_vec()
        };

        let mut merged: Vec<RawSection> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for file in &files {
            debug!("reading manifest {}", file.display());
            let content = fs::read_to_string(file)?;
            for section in parse_sections(&content, file)? {
                match positions.get(&section.name) {
                    Some(&index) => merged[index].merge(section),
                    None => {
                        positions.insert(section.name.clone(), merged.len());
                        merged.push(section);
                    }
                }
            }
        }

        let mut manifest = Self::build(merged, root, options)?;
        manifest.sources = files;
        Ok(manifest)
    }

    /// Parses a single manifest held in memory.
    pub fn parse(content: &str, root: &Path, options: ManifestOptions) -> Result<Self> {
        let sections = parse_sections(content, Path::new("<inline>"))?;
        Self::build(sections, root, options)
    }

    fn build(sections: Vec<RawSection>, root: &Path, options: ManifestOptions) -> Result<Self> {
        let mut repositories = Vec::new();
        let mut patch_only = Vec::new();

        for section in sections {
            if section.get("patch").is_some() {
                patch_only.push(section.name);
                continue;
            }
            if is_true(section.get("unstable")) && !options.unstable {
                debug!("skipping unstable repository {}", section.name);
                continue;
            }
            repositories.push(descriptor(&section, root, options)?);
        }

        Ok(Self {
            repositories,
            patch_only,
            sources: Vec::new(),
        })
    }

    pub fn repositories(&self) -> &[RepositoryDescriptor] {
        &self.repositories
    }

    pub fn into_repositories(self) -> Vec<RepositoryDescriptor> {
        self.repositories
    }

    /// Names of the patch-only sections.
    pub fn patch_only(&self) -> &[String] {
        &self.patch_only
    }

    /// Files the manifest was read from, in reading order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryDescriptor> {
        self.repositories.iter().find(|repo| repo.name == name)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

fn descriptor(
    section: &RawSection,
    root: &Path,
    options: ManifestOptions,
) -> Result<RepositoryDescriptor> {
    let kind_value = section.required("repo")?;
    let kind = RepoKind::from_key(kind_value).ok_or_else(|| Error::ManifestParse {
        path: section.source.display().to_string(),
        message: format!(
            "section [{}] has unknown repository type '{}' (expected 'hg' or 'git')",
            section.name, kind_value
        ),
    })?;
    let url = section.required("url")?;
    let path = section.required("path")?;

    Ok(RepositoryDescriptor {
        name: section.name.clone(),
        kind,
        url: url.to_string(),
        local_path: root.join(path).join(&section.name),
        branch: section
            .get_non_empty("branch")
            .unwrap_or(kind.default_branch())
            .to_string(),
        revision: if options.development {
            None
        } else {
            section.get_non_empty("revision").map(String::from)
        },
        package_index: section.get_non_empty("pypi").map(String::from),
    })
}

/// Manifest files found on the conventional search path of `root`.
pub fn search_paths(root: &Path) -> Result<Vec<PathBuf>> {
    let dir = root.join(defaults::MANIFEST_DIR);
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        defaults::MANIFEST_PATTERN
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let local = root.join(defaults::LOCAL_MANIFEST);
    if local.is_file() {
        files.push(local);
    }
    Ok(files)
}

/// Writes `key` into every repository section of the manifest at `path`.
///
/// `value_for` receives the section name and returns the value to write, or
/// `None` to leave that section alone. Patch-only sections are never touched.
/// Returns the number of sections updated.
pub fn set_key<F>(path: &Path, key: &str, value_for: F) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let mut ini = Ini::load_from_file_opt(path, parse_options())?;
    let names: Vec<String> = ini
        .iter()
        .filter_map(|(section, properties)| {
            let name = section?;
            if properties.contains_key("patch") {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect();

    let mut updated = 0;
    for name in names {
        if let Some(value) = value_for(&name) {
            ini.with_section(Some(name.as_str())).set(key, value);
            updated += 1;
        }
    }
    ini.write_to_file_policy(path, EscapePolicy::Nothing)?;
    Ok(updated)
}

/// Whether an SSH agent is reachable from this process.
pub fn ssh_agent_available() -> bool {
    env::var_os("SSH_AUTH_SOCK").is_some()
}

/// The URL to contact: without an SSH agent, `ssh` URLs fall back to
/// `https`.
pub fn effective_url(url: &str, ssh_agent: bool) -> String {
    if !ssh_agent {
        if let Some(rest) = url.strip_prefix("ssh") {
            return format!("https{}", rest);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[trytond]
repo = hg
url = https://hg.tryton.org/trytond
path = ./tryton

[proteus]
repo = hg
url = https://hg.tryton.org/proteus
path = ./tryton
branch = 7.0
revision = 4f2a9c1e

[sao]
repo = git
url = ssh://git@github.com/tryton/sao.git
path = ./tryton
pypi = tryton-sao

[account_invoice_fix]
patch = True

[experimental]
repo = git
url = https://github.com/example/experimental.git
path = ./modules
unstable = true
"#;

    fn parse(content: &str, options: ManifestOptions) -> Result<Manifest> {
        Manifest::parse(content, Path::new("."), options)
    }

    #[test]
    fn test_parse_sample() {
        let manifest = parse(SAMPLE, ManifestOptions::default()).unwrap();
        let names: Vec<_> = manifest.repositories().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["trytond", "proteus", "sao"]);

        let trytond = manifest.get("trytond").unwrap();
        assert_eq!(trytond.kind, RepoKind::Mercurial);
        assert_eq!(trytond.branch, "default");
        assert_eq!(trytond.revision, None);
        assert_eq!(trytond.local_path, Path::new("./tryton/trytond"));

        let proteus = manifest.get("proteus").unwrap();
        assert_eq!(proteus.branch, "7.0");
        assert_eq!(proteus.revision.as_deref(), Some("4f2a9c1e"));

        let sao = manifest.get("sao").unwrap();
        assert_eq!(sao.kind, RepoKind::Git);
        assert_eq!(sao.branch, "main");
        assert_eq!(sao.package_index.as_deref(), Some("tryton-sao"));
    }

    #[test]
    fn test_values_are_taken_literally() {
        let content = "[a]\nrepo = hg\nurl = C:\\repos\\trytond\npath = p\nbranch = \"7.0\"\n";
        let manifest = parse(content, ManifestOptions::default()).unwrap();
        let a = manifest.get("a").unwrap();
        assert_eq!(a.url, "C:\\repos\\trytond");
        assert_eq!(a.branch, "\"7.0\"");
    }

    #[test]
    fn test_patch_sections_are_excluded() {
        let manifest = parse(SAMPLE, ManifestOptions::default()).unwrap();
        assert!(manifest.get("account_invoice_fix").is_none());
        assert_eq!(manifest.patch_only(), &["account_invoice_fix".to_string()]);
    }

    #[test]
    fn test_unstable_entries_need_flag() {
        let stable = parse(SAMPLE, ManifestOptions::default()).unwrap();
        assert!(stable.get("experimental").is_none());

        let unstable = parse(
            SAMPLE,
            ManifestOptions {
                unstable: true,
                development: false,
            },
        )
        .unwrap();
        assert!(unstable.get("experimental").is_some());
        assert_eq!(unstable.len(), 4);
    }

    #[test]
    fn test_development_strips_pinned_revisions() {
        let manifest = parse(
            SAMPLE,
            ManifestOptions {
                unstable: false,
                development: true,
            },
        )
        .unwrap();
        assert!(manifest.repositories().iter().all(|r| r.revision.is_none()));
        assert_eq!(manifest.get("proteus").unwrap().branch, "7.0");
    }

    #[test]
    fn test_duplicate_section_is_rejected() {
        let content = "[a]\nrepo = hg\nurl = u\npath = p\n[a]\nrepo = hg\nurl = u\npath = p\n";
        let err = parse(content, ManifestOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ManifestParse { .. }));
        assert!(err.to_string().contains("duplicate section [a]"));
    }

    #[test]
    fn test_missing_required_key() {
        let content = "[a]\nrepo = hg\npath = ./modules\n";
        let err = parse(content, ManifestOptions::default()).unwrap_err();
        assert!(err.to_string().contains("missing required key 'url'"));
    }

    #[test]
    fn test_unknown_repository_type() {
        let content = "[a]\nrepo = svn\nurl = u\npath = p\n";
        let err = parse(content, ManifestOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unknown repository type 'svn'"));
    }

    #[test]
    fn test_entries_outside_sections_are_rejected() {
        let content = "repo = hg\n[a]\nrepo = hg\nurl = u\npath = p\n";
        let err = parse(content, ManifestOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ManifestParse { .. }));
    }

    #[test]
    fn test_load_without_manifests_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = Manifest::load(temp.path(), &[], ManifestOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound { .. }));
        assert!(err.to_string().contains("hint:"));
    }

    #[test]
    fn test_load_explicit_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.cfg");
        let err = Manifest::load(temp.path(), &[missing], ManifestOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound { .. }));
    }

    #[test]
    fn test_load_merges_search_path_in_order() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config");
        fs::create_dir_all(&config).unwrap();
        fs::write(
            config.join("a-base.cfg"),
            "[trytond]\nrepo = hg\nurl = https://old/trytond\npath = ./tryton\n\
             [proteus]\nrepo = hg\nurl = https://hg/proteus\npath = ./tryton\n",
        )
        .unwrap();
        fs::write(
            config.join("b-customer.cfg"),
            "[customer]\nrepo = git\nurl = https://git/customer\npath = ./modules\n\
             [trytond]\nurl = https://new/trytond\n",
        )
        .unwrap();
        fs::write(config.join("notes.txt"), "not a manifest").unwrap();

        let manifest = Manifest::load(temp.path(), &[], ManifestOptions::default()).unwrap();
        let names: Vec<_> = manifest.repositories().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["trytond", "proteus", "customer"]);
        assert_eq!(manifest.get("trytond").unwrap().url, "https://new/trytond");
        assert_eq!(manifest.sources().len(), 2);
    }

    #[test]
    fn test_search_paths_includes_local_manifest_last() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("config")).unwrap();
        fs::write(temp.path().join("config/base.cfg"), "").unwrap();
        fs::write(temp.path().join("local.cfg"), "").unwrap();

        let files = search_paths(temp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[1].ends_with("local.cfg"));
    }

    #[test]
    fn test_set_key_skips_patch_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("base.cfg");
        fs::write(&path, SAMPLE).unwrap();

        let updated = set_key(&path, "branch", |_| Some("7.2".to_string())).unwrap();
        assert_eq!(updated, 4);

        let content = fs::read_to_string(&path).unwrap();
        let reloaded = Manifest::parse(
            &content,
            Path::new("."),
            ManifestOptions {
                unstable: true,
                development: false,
            },
        )
        .unwrap();
        assert!(reloaded.repositories().iter().all(|r| r.branch == "7.2"));
        assert_eq!(reloaded.patch_only(), &["account_invoice_fix".to_string()]);

        let raw = Ini::load_from_str(&content).unwrap();
        let patch_section = raw.section(Some("account_invoice_fix")).unwrap();
        assert!(patch_section.get("branch").is_none());
    }

    #[test]
    fn test_set_key_only_for_selected_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("base.cfg");
        fs::write(&path, SAMPLE).unwrap();

        let updated = set_key(&path, "revision", |name| {
            (name == "trytond").then(|| "abcdef012345".to_string())
        })
        .unwrap();
        assert_eq!(updated, 1);

        let content = fs::read_to_string(&path).unwrap();
        let reloaded = Manifest::parse(&content, Path::new("."), ManifestOptions::default()).unwrap();
        assert_eq!(
            reloaded.get("trytond").unwrap().revision.as_deref(),
            Some("abcdef012345")
        );
        assert_eq!(
            reloaded.get("proteus").unwrap().revision.as_deref(),
            Some("4f2a9c1e")
        );
    }

    #[test]
    fn test_effective_url_rewrites_ssh_without_agent() {
        assert_eq!(
            effective_url("ssh://hg@hg.example.com/trytond", false),
            "https://hg@hg.example.com/trytond"
        );
        assert_eq!(
            effective_url("ssh://hg@hg.example.com/trytond", true),
            "ssh://hg@hg.example.com/trytond"
        );
        assert_eq!(
            effective_url("https://hg.example.com/trytond", false),
            "https://hg.example.com/trytond"
        );
    }

    #[test]
    fn test_repo_kind_keys() {
        assert_eq!(RepoKind::from_key("hg"), Some(RepoKind::Mercurial));
        assert_eq!(RepoKind::from_key(" GIT "), Some(RepoKind::Git));
        assert_eq!(RepoKind::from_key("svn"), None);
        assert_eq!(RepoKind::Mercurial.key(), "hg");
        assert_eq!(RepoKind::Git.to_string(), "git");
    }

    #[test]
    #[serial_test::serial]
    fn test_ssh_agent_detected_from_environment() {
        let saved = env::var_os("SSH_AUTH_SOCK");

        env::set_var("SSH_AUTH_SOCK", "/tmp/ssh-agent.sock");
        assert!(ssh_agent_available());
        env::remove_var("SSH_AUTH_SOCK");
        assert!(!ssh_agent_available());

        if let Some(value) = saved {
            env::set_var("SSH_AUTH_SOCK", value);
        }
    }
}
