use crate::{CancelToken, Error, Result};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A directory tree of raw page dumps.
#[derive(Debug, Clone)]
pub struct DumpCorpus {
    root: PathBuf,
    prefix: String,
}

/// What a pass over a corpus actually read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files_read: u64,
    pub files_skipped: u64,
    pub bytes_read: u64,
}

impl DumpCorpus {
    pub fn open<P: AsRef<Path>>(path: P, prefix: &str) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::DirectoryNotFound {
                path: root.display().to_string(),
            });
        }
        Ok(Self {
            root,
            prefix: prefix.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_dump(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix)
    }

    /// Qualifying dump files under the root, in file-name order per directory.
    ///
    /// Symbolic links are followed, so a linked dump counts like a regular
    /// one. Link loops are reported and skipped.
    pub fn dump_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", self.root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if self.is_dump(&entry.file_name().to_string_lossy()) {
                files.push(entry.into_path());
            }
        }
        files
    }

    /// Reads every dump in turn and hands its bytes to `visit`.
    ///
    /// Each buffer lives only for the duration of its callback. Files that
    /// cannot be read are skipped. The token is checked before each file.
    pub fn for_each_dump<F>(&self, cancel: &CancelToken, mut visit: F) -> Result<ScanSummary>
    where
        F: FnMut(&Path, &[u8]) -> ControlFlow<()>,
    {
        let mut summary = ScanSummary::default();

        for path in self.dump_files() {
            cancel.check()?;

            let data = match std::fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Skipping unreadable dump {}: {}", path.display(), e);
                    summary.files_skipped += 1;
                    continue;
                }
            };

            debug!("Read dump {} ({} bytes)", path.display(), data.len());
            summary.files_read += 1;
            summary.bytes_read += data.len() as u64;

            if visit(&path, &data).is_break() {
                break;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_only_prefixed_files_are_dumps() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-1.img"), b"aaaa").unwrap();
        fs::write(dir.path().join("pagemap-1.img"), b"bbbb").unwrap();
        fs::write(dir.path().join("core.img"), b"cccc").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("pages-2.img"), b"dd").unwrap();

        let corpus = DumpCorpus::open(dir.path(), "pages").unwrap();
        let mut names: Vec<String> = corpus
            .dump_files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["pages-1.img", "pages-2.img"]);
    }

    #[test]
    fn test_missing_directory_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            DumpCorpus::open(&missing, "pages"),
            Err(Error::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_scan_summary_and_early_stop() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-a"), vec![1u8; 100]).unwrap();
        fs::write(dir.path().join("pages-b"), vec![2u8; 50]).unwrap();

        let corpus = DumpCorpus::open(dir.path(), "pages").unwrap();
        let summary = corpus
            .for_each_dump(&CancelToken::new(), |_, _| ControlFlow::Continue(()))
            .unwrap();
        assert_eq!(summary.files_read, 2);
        assert_eq!(summary.bytes_read, 150);

        let summary = corpus
            .for_each_dump(&CancelToken::new(), |_, _| ControlFlow::Break(()))
            .unwrap();
        assert_eq!(summary.files_read, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_dump_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-a"), vec![1u8; 100]).unwrap();
        fs::write(dir.path().join("pages-b"), vec![2u8; 40]).unwrap();
        fs::write(dir.path().join("pages-c"), vec![3u8; 60]).unwrap();

        let locked = dir.path().join("pages-b");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            // Permission bits do not apply to root.
            return;
        }

        let corpus = DumpCorpus::open(dir.path(), "pages").unwrap();
        let mut seen = Vec::new();
        let summary = corpus
            .for_each_dump(&CancelToken::new(), |path, _| {
                seen.push(path.file_name().unwrap().to_string_lossy().to_string());
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(seen, vec!["pages-a", "pages-c"]);
        assert_eq!(summary.files_read, 2);
        assert_eq!(summary.files_skipped, 1);
        assert_eq!(summary.bytes_read, 160);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dumps_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("pages-real");
        fs::write(&target, vec![5u8; 30]).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("pages-link")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let corpus = DumpCorpus::open(dir.path(), "pages").unwrap();
        let summary = corpus
            .for_each_dump(&CancelToken::new(), |_, _| ControlFlow::Continue(()))
            .unwrap();
        assert_eq!(summary.files_read, 1);
        assert_eq!(summary.bytes_read, 30);
    }

    #[test]
    fn test_cancelled_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pages-a"), vec![1u8; 10]).unwrap();

        let corpus = DumpCorpus::open(dir.path(), "pages").unwrap();
        let token = CancelToken::new();
        token.cancel();
        let result = corpus.for_each_dump(&token, |_, _| ControlFlow::Continue(()));
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
