use crate::model::{FoundPackage, PackageDescriptor};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no buildable Go source files in {}", dir.display())]
    NoGoFiles { dir: PathBuf },
    #[error("build constraints exclude all Go files in {}", dir.display())]
    Excluded { dir: PathBuf },
    #[error("found packages {first} ({first_file}) and {second} ({second_file}) in {}", dir.display())]
    MultiplePackages {
        dir: PathBuf,
        first: String,
        first_file: String,
        second: String,
        second_file: String,
    },
    #[error("{}: {message}", file.display())]
    Syntax { file: PathBuf, message: String },
    #[error("binary-only package in {} requires binary mode", dir.display())]
    BinaryOnly { dir: PathBuf },
    #[error("invalid import path: {0:?}")]
    InvalidImportPath(String),
    #[error("cannot find package {identifier:?} in any of:{}", format_roots(searched))]
    NotFound {
        identifier: String,
        searched: Vec<PathBuf>,
    },
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_roots(roots: &[PathBuf]) -> String {
    if roots.is_empty() {
        return " (no source roots configured)".to_string();
    }
    roots
        .iter()
        .map(|r| format!("\n\t{}", r.display()))
        .collect()
}

/// Flags controlling how a directory is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportMode {
    /// Accept packages marked `//go:binary-only-package`.
    pub allow_binary: bool,
}

impl ImportMode {
    pub const ALLOW_BINARY: ImportMode = ImportMode { allow_binary: true };
}

/// Package-metadata capability consumed by the collector and reporter.
///
/// Implementations are free to cache or not; callers assume nothing beyond
/// one answer per call.
pub trait PackageResolver {
    /// Describes the package stored in `dir`.
    fn import_dir(&self, dir: &Path, mode: ImportMode) -> Result<PackageDescriptor, ResolveError>;

    /// Locates the source root holding the package named by an import path,
    /// without reading any of its files.
    fn find(&self, identifier: &str) -> Result<FoundPackage, ResolveError>;
}

impl<R: PackageResolver + ?Sized> PackageResolver for &R {
    fn import_dir(&self, dir: &Path, mode: ImportMode) -> Result<PackageDescriptor, ResolveError> {
        (**self).import_dir(dir, mode)
    }

    fn find(&self, identifier: &str) -> Result<FoundPackage, ResolveError> {
        (**self).find(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_searched_roots() {
        let err = ResolveError::NotFound {
            identifier: "example.com/x".to_string(),
            searched: vec![PathBuf::from("/go/src"), PathBuf::from("/usr/lib/go/src")],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"example.com/x\""));
        assert!(msg.contains("\n\t/go/src"));
        assert!(msg.contains("\n\t/usr/lib/go/src"));
    }

    #[test]
    fn test_no_go_files_message() {
        let err = ResolveError::NoGoFiles {
            dir: PathBuf::from("/tmp/empty"),
        };
        assert_eq!(err.to_string(), "no buildable Go source files in /tmp/empty");
    }

    #[test]
    fn test_default_mode_rejects_binary() {
        assert!(!ImportMode::default().allow_binary);
        assert!(ImportMode::ALLOW_BINARY.allow_binary);
    }
}
