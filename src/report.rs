//! Package reporting.
//!
//! [`Reporter`] resolves one [`Location`] at a time and writes a block per
//! package to its writer, flushing after each block so output keeps pace
//! with resolution.

use std::io::Write;
use thiserror::Error;
use tracing::debug;

use crate::model::{Location, PackageDescriptor};
use crate::traits::{ImportMode, PackageResolver, ResolveError};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("encoding {location} as JSON: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("writing report: {0}")]
    Io(#[from] std::io::Error),
}

/// How a package block is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Line-oriented text; `show_import_path` adds the `ImportPath:` line.
    Text { show_import_path: bool },
    /// One JSON object per line.
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text {
            show_import_path: true,
        }
    }
}

/// Renders the text block for one package, without the separating blank
/// line.
pub fn render_text(pkg: &PackageDescriptor, show_import_path: bool) -> String {
    let mut out = format!("Package: {}\n", pkg.name);
    if show_import_path {
        out.push_str(&format!("ImportPath: {}\n", pkg.import_path));
    }
    out.push_str(&format!("Dir: {}\n", pkg.dir.display()));
    if !pkg.imports.is_empty() {
        out.push_str("Imports:\n");
        for import in &pkg.imports {
            out.push_str(&format!(" {}\n", import));
        }
    }
    out
}

pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
    mode: ImportMode,
    written: usize,
}

impl<W: Write> Reporter<W> {
    /// Creates a reporter that accepts binary-only packages.
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            mode: ImportMode::ALLOW_BINARY,
            written: 0,
        }
    }

    /// Number of blocks written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Resolves `location`, renames the package after the location and
    /// writes its block.
    ///
    /// # Errors
    ///
    /// Resolution failures are returned untouched so the caller can stop the
    /// run; nothing is written for the failed location.
    pub fn report<R>(
        &mut self,
        location: &Location,
        resolver: &R,
    ) -> Result<PackageDescriptor, ReportError>
    where
        R: PackageResolver + ?Sized,
    {
        let mut pkg = resolver.import_dir(&location.path(), self.mode)?;
        pkg.name = location.display_name();
        debug!(package = %pkg.name, imports = pkg.imports.len(), "reporting package");

        let block = match self.format {
            OutputFormat::Text { show_import_path } => {
                let text = render_text(&pkg, show_import_path);
                if self.written > 0 {
                    format!("\n{}", text)
                } else {
                    text
                }
            }
            OutputFormat::Json => {
                let mut line =
                    serde_json::to_string(&pkg).map_err(|source| ReportError::Json {
                        location: location.to_string(),
                        source,
                    })?;
                line.push('\n');
                line
            }
        };
        self.out.write_all(block.as_bytes())?;
        self.out.flush()?;
        self.written += 1;
        Ok(pkg)
    }
}
