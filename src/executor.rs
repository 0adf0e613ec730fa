use crate::collector::{CollectError, CollectOptions, Collector};
use crate::report::{OutputFormat, ReportError, Reporter};
use crate::traits::PackageResolver;
use std::io::Write;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("none of the {0} argument(s) could be resolved")]
    NothingToReport(usize),
}

/// Counts for a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reported: usize,
    pub skipped: usize,
}

/// Runs collection then reporting, stopping at the first fatal error.
pub struct ImportsExecutor {
    collector: Collector,
    format: OutputFormat,
}

impl ImportsExecutor {
    pub fn new(options: CollectOptions, format: OutputFormat) -> Self {
        Self {
            collector: Collector::new(options),
            format,
        }
    }

    pub fn with_collector(mut self, collector: Collector) -> Self {
        self.collector = collector;
        self
    }

    /// Collects `args` and writes one block per location to `out`.
    ///
    /// Each argument dropped during collection is logged with exactly one
    /// `warn!` event naming the argument and its error. When every argument
    /// was dropped the run fails with [`RunError::NothingToReport`]; a walk
    /// that finds no source directories under a resolved argument is not an
    /// error.
    #[instrument(skip(self, resolver, out))]
    pub fn execute<R, W>(
        &self,
        args: &[String],
        resolver: &R,
        out: W,
    ) -> Result<RunSummary, RunError>
    where
        R: PackageResolver + ?Sized,
        W: Write,
    {
        let collection = self.collector.collect(args, resolver)?;
        for skipped in &collection.skipped {
            warn!("{}: {}", skipped.arg, skipped.error);
        }
        if collection.resolved == 0 && !collection.skipped.is_empty() {
            return Err(RunError::NothingToReport(collection.skipped.len()));
        }

        info!("Starting report for {} location(s)", collection.locations.len());
        let mut reporter = Reporter::new(out, self.format);
        for location in &collection.locations {
            reporter.report(location, resolver)?;
        }

        info!("Finished report");
        Ok(RunSummary {
            reported: reporter.written(),
            skipped: collection.skipped.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FoundPackage, PackageDescriptor};
    use crate::traits::{ImportMode, ResolveError};
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    // Resolves any directory holding a `.go` file; finds only `good/pkg`.
    struct FakeResolver {
        root: PathBuf,
    }

    impl PackageResolver for FakeResolver {
        fn import_dir(
            &self,
            dir: &Path,
            _mode: ImportMode,
        ) -> Result<PackageDescriptor, ResolveError> {
            let has_go = fs::read_dir(dir)
                .map(|rd| {
                    rd.filter_map(Result::ok)
                        .any(|e| e.path().extension().map_or(false, |x| x == "go"))
                })
                .unwrap_or(false);
            if !has_go {
                return Err(ResolveError::NoGoFiles {
                    dir: dir.to_path_buf(),
                });
            }
            Ok(PackageDescriptor {
                name: "x".to_string(),
                dir: dir.to_path_buf(),
                import_path: ".".to_string(),
                imports: vec![],
                go_files: vec![],
                test_go_files: vec![],
                binary_only: false,
            })
        }

        fn find(&self, identifier: &str) -> Result<FoundPackage, ResolveError> {
            if identifier == "good/pkg" {
                Ok(FoundPackage {
                    src_root: self.root.clone(),
                    import_path: identifier.to_string(),
                })
            } else {
                Err(ResolveError::NotFound {
                    identifier: identifier.to_string(),
                    searched: vec![self.root.clone()],
                })
            }
        }
    }

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        for rel in ["a/x.go", "a/b/y.go", "good/pkg/z.go", "empty/readme.txt"] {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "package x\n").unwrap();
        }
        tmp
    }

    // Log sink shared with the test through the subscriber's writer.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn text() -> OutputFormat {
        OutputFormat::Text {
            show_import_path: false,
        }
    }

    #[test]
    fn test_skipped_argument_does_not_abort() {
        let tmp = tree();
        let resolver = FakeResolver {
            root: tmp.path().to_path_buf(),
        };
        let executor = ImportsExecutor::new(CollectOptions::default(), text());

        let mut out = Vec::<u8>::new();
        let args = vec!["bad/pkg".to_string(), "good/pkg".to_string()];
        let summary = executor.execute(&args, &resolver, &mut out).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                reported: 1,
                skipped: 1
            }
        );
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("Package:").count(), 1);
    }

    #[test]
    fn test_all_arguments_skipped_is_an_error() {
        let tmp = tree();
        let resolver = FakeResolver {
            root: tmp.path().to_path_buf(),
        };
        let executor = ImportsExecutor::new(CollectOptions::default(), text());

        let err = executor
            .execute(&["nope".to_string()], &resolver, Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, RunError::NothingToReport(1)));
    }

    #[test]
    fn test_directory_without_sources_is_fatal() {
        let tmp = tree();
        let resolver = FakeResolver {
            root: tmp.path().to_path_buf(),
        };
        let executor = ImportsExecutor::new(CollectOptions::default(), text());

        let args = vec![
            tmp.path().join("empty").display().to_string(),
            tmp.path().join("a").display().to_string(),
        ];
        let mut out = Vec::<u8>::new();
        let err = executor.execute(&args, &resolver, &mut out).unwrap_err();
        assert!(matches!(
            err,
            RunError::Report(ReportError::Resolve(ResolveError::NoGoFiles { .. }))
        ));
        // The run stops before the second location.
        assert!(out.is_empty());
    }

    #[test]
    fn test_recursive_run_is_repeatable() {
        let tmp = tree();
        let resolver = FakeResolver {
            root: tmp.path().to_path_buf(),
        };
        let executor =
            ImportsExecutor::new(CollectOptions::default().with_recursive(true), text());
        let args = vec![tmp.path().join("a").display().to_string()];

        let mut first = Vec::<u8>::new();
        let summary = executor.execute(&args, &resolver, &mut first).unwrap();
        assert_eq!(summary.reported, 2);

        let mut second = Vec::<u8>::new();
        executor.execute(&args, &resolver, &mut second).unwrap();
        assert_eq!(first, second);

        let out = String::from_utf8(first).unwrap();
        assert!(out.starts_with("Package: a/b\n"));
        assert!(out.contains("\n\nPackage: a\n"));
    }

    #[test]
    fn test_each_skipped_argument_warns_once() {
        let tmp = tree();
        let resolver = FakeResolver {
            root: tmp.path().to_path_buf(),
        };
        let executor = ImportsExecutor::new(CollectOptions::default(), text());

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .finish();

        let args = vec!["bad/pkg".to_string(), "good/pkg".to_string()];
        tracing::subscriber::with_default(subscriber, || {
            executor
                .execute(&args, &resolver, Vec::<u8>::new())
                .unwrap();
        });

        let logs = logs.contents();
        let warnings: Vec<&str> = logs.lines().filter(|l| l.contains("WARN")).collect();
        assert_eq!(warnings.len(), 1, "{logs}");
        assert!(warnings[0].contains("bad/pkg"));
        assert!(!logs.contains("good/pkg:"));
    }

    #[test]
    fn test_empty_walk_with_skipped_argument_succeeds() {
        let tmp = tree();
        let resolver = FakeResolver {
            root: tmp.path().to_path_buf(),
        };
        let executor =
            ImportsExecutor::new(CollectOptions::default().with_recursive(true), text());

        let args = vec![
            tmp.path().join("empty").display().to_string(),
            "no/such".to_string(),
        ];
        let mut out = Vec::<u8>::new();
        let summary = executor.execute(&args, &resolver, &mut out).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                reported: 0,
                skipped: 1
            }
        );
        assert!(out.is_empty());
    }
}
