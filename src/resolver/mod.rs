//! Go package resolver.
//!
//! [`GoResolver`] implements [`PackageResolver`] over a [`GoContext`]:
//! - `import_dir` reads every buildable `.go` file in a directory and merges
//!   their package clauses and imports into a [`PackageDescriptor`];
//!   `_test.go` files only name the package
//! - `find` maps an import path onto the first source root that holds it
//!
//! Only file headers are read (see [`scan`]). Build constraints and
//! `_GOOS`/`_GOARCH` file-name suffixes are honoured (see [`constraint`]).

pub mod constraint;
pub mod scan;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

use crate::model::{FoundPackage, PackageDescriptor};
use crate::traits::{ImportMode, PackageResolver, ResolveError};
use constraint::{matches_file_name, TagSet};

/// Where and for which target packages are resolved.
#[derive(Debug, Clone)]
pub struct GoContext {
    /// Directories import paths are resolved against, in search order
    pub src_roots: Vec<PathBuf>,

    /// Target operating system (`GOOS`)
    pub goos: String,

    /// Target architecture (`GOARCH`)
    pub goarch: String,

    /// Additional build tags considered satisfied
    pub build_tags: Vec<String>,

    /// Whether the `cgo` tag is satisfied
    pub cgo_enabled: bool,
}

impl GoContext {
    /// Creates a context for the host target with the given source roots.
    pub fn new(src_roots: Vec<PathBuf>) -> Self {
        Self {
            src_roots,
            goos: host_goos().to_string(),
            goarch: host_goarch().to_string(),
            build_tags: Vec::new(),
            cgo_enabled: true,
        }
    }

    /// Builds a context the way the Go toolchain does by default:
    /// `$GOROOT/src` first (asking `go env GOROOT` when the variable is
    /// unset), then `src` under each `$GOPATH` entry (`$HOME/go` when unset).
    /// `GOOS`/`GOARCH` override the host target. cgo follows `CGO_ENABLED`
    /// and is otherwise on only for native builds.
    pub fn from_env() -> Self {
        let mut roots = Vec::new();
        let goroot = std::env::var_os("GOROOT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| toolchain_goroot("go"));
        if let Some(goroot) = goroot {
            roots.push(goroot.join("src"));
        }
        match std::env::var_os("GOPATH").filter(|v| !v.is_empty()) {
            Some(gopath) => {
                for entry in std::env::split_paths(&gopath) {
                    if !entry.as_os_str().is_empty() {
                        roots.push(entry.join("src"));
                    }
                }
            }
            None => {
                if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
                    roots.push(PathBuf::from(home).join("go").join("src"));
                }
            }
        }

        let mut ctx = Self::new(roots);
        if let Ok(goos) = std::env::var("GOOS") {
            if !goos.is_empty() {
                ctx.goos = goos;
            }
        }
        if let Ok(goarch) = std::env::var("GOARCH") {
            if !goarch.is_empty() {
                ctx.goarch = goarch;
            }
        }
        ctx.cgo_enabled = match std::env::var("CGO_ENABLED").as_deref() {
            Ok("0") => false,
            Ok("1") => true,
            _ => ctx.goos == host_goos() && ctx.goarch == host_goarch(),
        };
        debug!(
            roots = ?ctx.src_roots,
            goos = %ctx.goos,
            goarch = %ctx.goarch,
            cgo = ctx.cgo_enabled,
            "Go context"
        );
        ctx
    }

    pub fn with_target(mut self, goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        self.goos = goos.into();
        self.goarch = goarch.into();
        self
    }

    pub fn with_build_tags(mut self, tags: Vec<String>) -> Self {
        self.build_tags = tags;
        self
    }

    pub fn with_cgo(mut self, enabled: bool) -> Self {
        self.cgo_enabled = enabled;
        self
    }

    fn tag_set(&self) -> TagSet {
        TagSet::new(&self.goos, &self.goarch, self.cgo_enabled, &self.build_tags)
    }

    /// Slash-separated import path of `dir` under the first root that
    /// contains it.
    fn import_path_of(&self, dir: &Path) -> Option<String> {
        self.src_roots.iter().find_map(|root| {
            let rel = dir.strip_prefix(root).ok()?;
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("/"))
            }
        })
    }
}

/// GOROOT as reported by `<program> env GOROOT`; `None` when the command
/// cannot be run or prints nothing.
fn toolchain_goroot(program: &str) -> Option<PathBuf> {
    let output = match Command::new(program).args(["env", "GOROOT"]).output() {
        Ok(output) => output,
        Err(e) => {
            debug!(program, error = %e, "no Go toolchain to ask for GOROOT");
            return None;
        }
    };
    if !output.status.success() {
        debug!(program, status = %output.status, "go env GOROOT failed");
        return None;
    }
    parse_goroot(&output.stdout)
}

fn parse_goroot(stdout: &[u8]) -> Option<PathBuf> {
    let value = String::from_utf8_lossy(stdout);
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "wasm32" => "wasm",
        other => other,
    }
}

/// [`PackageResolver`] reading Go sources from disk.
#[derive(Debug, Clone)]
pub struct GoResolver {
    ctx: GoContext,
}

impl GoResolver {
    pub fn new(ctx: GoContext) -> Self {
        Self { ctx }
    }
}

/// Files the toolchain never builds regardless of constraints.
fn is_candidate(name: &str) -> bool {
    name.ends_with(".go") && !name.starts_with('_') && !name.starts_with('.')
}

fn is_test_file(name: &str) -> bool {
    name.ends_with("_test.go")
}

impl PackageResolver for GoResolver {
    fn import_dir(&self, dir: &Path, mode: ImportMode) -> Result<PackageDescriptor, ResolveError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ResolveError::Io { path, source }
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(io_err(&path))?;
            // Symlinked files count; directories and links to them do not.
            if file_type.is_dir() || (file_type.is_symlink() && path.is_dir()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_candidate(&name) {
                names.push(name);
            }
        }
        names.sort();

        let tags = self.ctx.tag_set();
        let mut package: Option<(String, String)> = None;
        let mut imports = BTreeSet::new();
        let mut go_files = Vec::new();
        let mut test_go_files = Vec::new();
        let mut binary_only = false;
        let mut excluded = 0usize;

        for name in names {
            if !matches_file_name(&name, &tags) {
                trace!(file = %name, "excluded by file name");
                excluded += 1;
                continue;
            }
            let path = dir.join(&name);
            let src = fs::read_to_string(&path).map_err(io_err(&path))?;
            let scanned = scan::scan_file(&src).map_err(|message| ResolveError::Syntax {
                file: path.clone(),
                message,
            })?;
            let keep = scanned
                .constraints
                .eval(&tags)
                .map_err(|message| ResolveError::Syntax {
                    file: path.clone(),
                    message,
                })?;
            if !keep {
                trace!(file = %name, "excluded by build constraint");
                excluded += 1;
                continue;
            }

            let header = scanned.header;
            let is_test = is_test_file(&name);
            // External test packages (`package foo_test`) belong to `foo`.
            let mut package_name = header.package;
            if is_test {
                if let Some(base) = package_name.strip_suffix("_test") {
                    package_name = base.to_string();
                }
            }
            if let Some((first, first_file)) = &package {
                if *first != package_name {
                    return Err(ResolveError::MultiplePackages {
                        dir: dir.to_path_buf(),
                        first: first.clone(),
                        first_file: first_file.clone(),
                        second: package_name,
                        second_file: name,
                    });
                }
            } else {
                package = Some((package_name, name.clone()));
            }
            if is_test {
                test_go_files.push(name);
                continue;
            }
            binary_only |= header.binary_only;
            imports.extend(header.imports);
            go_files.push(name);
        }

        let Some((name, _)) = package else {
            return Err(if excluded > 0 {
                ResolveError::Excluded {
                    dir: dir.to_path_buf(),
                }
            } else {
                ResolveError::NoGoFiles {
                    dir: dir.to_path_buf(),
                }
            });
        };
        if binary_only && !mode.allow_binary {
            return Err(ResolveError::BinaryOnly {
                dir: dir.to_path_buf(),
            });
        }

        debug!(dir = %dir.display(), package = %name, imports = imports.len(), "resolved package");
        Ok(PackageDescriptor {
            name,
            dir: dir.to_path_buf(),
            import_path: self
                .ctx
                .import_path_of(dir)
                .unwrap_or_else(|| ".".to_string()),
            imports: imports.into_iter().collect(),
            go_files,
            test_go_files,
            binary_only,
        })
    }

    fn find(&self, identifier: &str) -> Result<FoundPackage, ResolveError> {
        let rel = Path::new(identifier);
        let valid = !identifier.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(ResolveError::InvalidImportPath(identifier.to_string()));
        }

        for root in &self.ctx.src_roots {
            let candidate = root.join(rel);
            trace!(candidate = %candidate.display(), "probing");
            if candidate.is_dir() {
                return Ok(FoundPackage {
                    src_root: root.clone(),
                    import_path: identifier.to_string(),
                });
            }
        }
        Err(ResolveError::NotFound {
            identifier: identifier.to_string(),
            searched: self.ctx.src_roots.clone(),
        })
    }
}
