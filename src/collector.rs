//! Path collection.
//!
//! Turns command-line arguments into the ordered list of [`Location`]s to
//! report on. Arguments naming directories are taken as-is (made absolute);
//! anything else is looked up as an import path through the resolver. In
//! recursive mode every base is then walked and each distinct directory
//! holding a source file becomes its own location.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::model::{clean_path, Location};
use crate::traits::{PackageResolver, ResolveError};

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error("cannot determine working directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("walking {}: {source}", base.display())]
    Walk {
        base: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("{} is not below {}", dir.display(), base.display())]
    Relative { base: PathBuf, dir: PathBuf },
}

/// Collector configuration.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Walk each base for source directories
    pub recursive: bool,

    /// Look up non-directory arguments as import paths instead of failing
    pub resolve_identifiers: bool,

    /// Extension (without the dot) marking a source file
    pub source_extension: String,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            resolve_identifiers: true,
            source_extension: "go".to_string(),
        }
    }
}

impl CollectOptions {
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_identifier_lookup(mut self, enabled: bool) -> Self {
        self.resolve_identifiers = enabled;
        self
    }

    pub fn with_source_extension(mut self, ext: impl Into<String>) -> Self {
        self.source_extension = ext.into();
        self
    }
}

/// An argument that could not be turned into a location.
#[derive(Debug)]
pub struct SkippedArg {
    pub arg: String,
    pub error: ResolveError,
}

/// Outcome of collection: the locations to report plus arguments that were
/// dropped along the way.
#[derive(Debug, Default)]
pub struct Collection {
    pub locations: Vec<Location>,
    pub skipped: Vec<SkippedArg>,

    /// Arguments (or the working directory) that became a location before
    /// any walk; a walk may still find nothing under them
    pub resolved: usize,
}

pub struct Collector {
    options: CollectOptions,
    cwd: Option<PathBuf>,
}

impl Collector {
    pub fn new(options: CollectOptions) -> Self {
        Self { options, cwd: None }
    }

    /// Resolves relative arguments against `cwd` instead of the process
    /// working directory.
    pub fn with_working_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Builds the location list for `args`.
    ///
    /// # Errors
    ///
    /// Fails when the working directory is unavailable, when a literal path
    /// is missing (identifier lookup disabled), or when a walk fails. Failed
    /// identifier lookups are reported in [`Collection::skipped`] instead.
    pub fn collect<R>(&self, args: &[String], resolver: &R) -> Result<Collection, CollectError>
    where
        R: PackageResolver + ?Sized,
    {
        let mut collection = Collection::default();

        if args.is_empty() {
            collection.locations.push(Location::root(self.working_dir()?));
        }
        for arg in args {
            let candidate = self.absolute(Path::new(arg))?;
            if candidate.is_dir() {
                collection.locations.push(Location::root(candidate));
                continue;
            }
            if !self.options.resolve_identifiers {
                return Err(CollectError::NotADirectory {
                    path: PathBuf::from(arg),
                });
            }
            match resolver.find(arg) {
                Ok(found) => {
                    debug!(arg = %arg, root = %found.src_root.display(), "resolved import path");
                    collection.locations.push(found.into());
                }
                Err(error) => collection.skipped.push(SkippedArg {
                    arg: arg.clone(),
                    error,
                }),
            }
        }

        collection.resolved = collection.locations.len();

        if self.options.recursive {
            let mut walked = Vec::new();
            for location in &collection.locations {
                walked.extend(self.source_dirs(&location.base)?);
            }
            collection.locations = walked;
        }

        info!(
            locations = collection.locations.len(),
            skipped = collection.skipped.len(),
            "Collection completed"
        );
        Ok(collection)
    }

    /// Walks `base` and returns one location per distinct directory that
    /// directly contains a source file, in walk order.
    pub fn source_dirs(&self, base: &Path) -> Result<Vec<Location>, CollectError> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut found = Vec::new();

        for entry in WalkDir::new(base).sort_by_file_name() {
            let entry = entry.map_err(|source| CollectError::Walk {
                base: base.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !self.is_source(entry.path()) {
                continue;
            }
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            if seen.contains(dir) {
                continue;
            }
            let rel = dir
                .strip_prefix(base)
                .map_err(|_| CollectError::Relative {
                    base: base.to_path_buf(),
                    dir: dir.to_path_buf(),
                })?
                .to_path_buf();
            debug!(dir = %dir.display(), "found source directory");
            seen.insert(dir.to_path_buf());
            found.push(Location::new(base, rel));
        }
        Ok(found)
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .map_or(false, |ext| ext == self.options.source_extension.as_str())
    }

    fn working_dir(&self) -> Result<PathBuf, CollectError> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir().map_err(CollectError::CurrentDir),
        }
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf, CollectError> {
        if path.is_absolute() {
            Ok(clean_path(path))
        } else {
            Ok(clean_path(&self.working_dir()?.join(path)))
        }
    }
}
