use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// A directory to inspect, kept as the base it was discovered from plus the
/// suffix below that base.
///
/// An empty `rel` names the base itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub base: PathBuf,
    pub rel: PathBuf,
}

impl Location {
    pub fn new(base: impl Into<PathBuf>, rel: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            rel: rel.into(),
        }
    }

    /// Location for a base directory with no suffix.
    pub fn root(base: impl Into<PathBuf>) -> Self {
        Self::new(base, PathBuf::new())
    }

    /// The directory handed to the resolver: `base` joined with `rel`.
    pub fn path(&self) -> PathBuf {
        join_clean(&self.base, &self.rel)
    }

    /// Name shown in reports: the last component of `base` joined with `rel`,
    /// so sub-packages found by a walk stay distinguishable.
    pub fn display_name(&self) -> String {
        let head = match self.base.file_name() {
            Some(name) => PathBuf::from(name),
            None => self.base.clone(),
        };
        join_clean(&head, &self.rel).display().to_string()
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

/// Joins `rel` onto `base` without leaving a trailing separator when `rel`
/// is empty or `.`.
fn join_clean(base: &Path, rel: &Path) -> PathBuf {
    if rel.as_os_str().is_empty() || rel == Path::new(".") {
        base.to_path_buf()
    } else {
        base.join(rel)
    }
}

/// Lexically normalizes `path`: drops `.` components and folds `..` into
/// the preceding component. Does not touch the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Metadata for the package found in one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Package name; replaced by [`Location::display_name`] before reporting
    pub name: String,

    /// Directory the package was read from
    pub dir: PathBuf,

    /// Import path relative to the enclosing src root, or `"."` when the
    /// directory lies outside every root
    pub import_path: String,

    /// Imported package paths, sorted and unique
    pub imports: Vec<String>,

    /// Source files that contributed to the package
    #[serde(default)]
    pub go_files: Vec<String>,

    /// `_test.go` files; they name the package but add no imports
    #[serde(default)]
    pub test_go_files: Vec<String>,

    #[serde(default)]
    pub binary_only: bool,
}

/// Result of a find-only lookup: where an import path lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundPackage {
    pub src_root: PathBuf,
    pub import_path: String,
}

impl From<FoundPackage> for Location {
    fn from(found: FoundPackage) -> Self {
        Location::new(found.src_root, found.import_path)
    }
}
