//! Zip extraction into the staging area.
//!
//! Every entry name is resolved against the staging root and checked before
//! anything is written. An archive with a single escaping entry is rejected
//! as a whole and leaves the staging area untouched.

use lighthouse_core::{Error, Result};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zip::ZipArchive;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// Counts from a finished extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Extract `archive` under `staging_root` on the blocking pool.
///
/// `cancel` is checked between entries. On cancellation this only returns
/// once the blocking task has stopped writing, so the staging area is never
/// touched after the call completes.
pub async fn extract_archive(
    archive: &Path,
    staging_root: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractStats> {
    let archive = archive.to_path_buf();
    let staging_root = staging_root.to_path_buf();
    let cancel = cancel.clone();

    let stats =
        tokio::task::spawn_blocking(move || extract_blocking(&archive, &staging_root, &cancel))
            .await
            .map_err(|e| Error::Internal(format!("extraction task failed: {}", e)))??;

    Ok(stats)
}

struct PlannedEntry {
    index: usize,
    dest: PathBuf,
    is_dir: bool,
}

fn extract_blocking(
    archive: &Path,
    staging_root: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractStats> {
    let root = std::path::absolute(staging_root).map_err(|e| {
        Error::Extraction(format!(
            "cannot resolve staging root {}: {}",
            staging_root.display(),
            e
        ))
    })?;
    let root = clean_path(&root);

    let file = File::open(archive)
        .map_err(|e| Error::Extraction(format!("cannot open {}: {}", archive.display(), e)))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| Error::Extraction(format!("cannot read {}: {}", archive.display(), e)))?;

    let mut plan = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let entry = zip
            .by_index_raw(index)
            .map_err(|e| Error::Extraction(format!("bad entry #{}: {}", index, e)))?;
        let dest = resolve_entry_path(&root, entry.name())?;
        let is_dir = entry.is_dir() || entry.unix_mode().is_some_and(|m| m & S_IFMT == S_IFDIR);
        plan.push(PlannedEntry {
            index,
            dest,
            is_dir,
        });
    }

    let mut stats = ExtractStats::default();
    for planned in plan {
        if cancel.is_cancelled() {
            warn!(archive = %archive.display(), written = stats.files, "Extraction cancelled");
            return Err(Error::Cancelled);
        }
        if planned.is_dir {
            std::fs::create_dir_all(&planned.dest).map_err(|e| io_error(&planned.dest, e))?;
            stats.directories += 1;
            continue;
        }

        if let Some(parent) = planned.dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        // Symlink entries land here too: the link text becomes file content.
        let mut entry = zip
            .by_index(planned.index)
            .map_err(|e| Error::Extraction(format!("bad entry #{}: {}", planned.index, e)))?;
        let mut out = File::create(&planned.dest).map_err(|e| io_error(&planned.dest, e))?;
        let written =
            std::io::copy(&mut entry, &mut out).map_err(|e| io_error(&planned.dest, e))?;

        stats.files += 1;
        stats.bytes += written;
    }

    info!(
        archive = %archive.display(),
        files = stats.files,
        directories = stats.directories,
        bytes = stats.bytes,
        "Archive extracted"
    );
    Ok(stats)
}

fn io_error(path: &Path, e: std::io::Error) -> Error {
    Error::Extraction(format!("failed to write {}: {}", path.display(), e))
}

/// Where entry `name` would land under `root`, or a security error if that is
/// not strictly inside `root`.
///
/// `root` must already be absolute and cleaned.
pub fn resolve_entry_path(root: &Path, name: &str) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    let dest = clean_path(&root.join(&normalized));

    if dest.starts_with(root) && dest != root {
        Ok(dest)
    } else {
        warn!(entry = %name, root = %root.display(), "Rejecting archive entry outside staging area");
        Err(Error::Security(format!(
            "archive entry {:?} escapes {}",
            name,
            root.display()
        )))
    }
}

/// Lexically normalize a path: drop `.`, let `..` remove the previous
/// component. `..` at the root is dropped; leading `..` on a relative path is kept.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    out.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Entry, zip_bytes};

    fn write_archive(dir: &Path, entries: &[Entry<'_>]) -> PathBuf {
        let path = dir.join("archive.zip");
        std::fs::write(&path, zip_bytes(entries)).unwrap();
        path
    }

    fn staging(dir: &Path) -> PathBuf {
        let staging = dir.join("staging");
        std::fs::create_dir_all(&staging).unwrap();
        staging
    }

    fn count_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("/../../etc")), PathBuf::from("/etc"));
        assert_eq!(clean_path(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(clean_path(Path::new("/s/x/")), PathBuf::from("/s/x"));
    }

    #[test]
    fn test_resolve_entry_path() {
        let root = Path::new("/srv/staging");

        assert_eq!(
            resolve_entry_path(root, "blog-main/src/app.py").unwrap(),
            PathBuf::from("/srv/staging/blog-main/src/app.py")
        );
        assert_eq!(
            resolve_entry_path(root, "blog-main/docs/../README.md").unwrap(),
            PathBuf::from("/srv/staging/blog-main/README.md")
        );

        for hostile in [
            "../evil.txt",
            "blog-main/../../evil.txt",
            "/etc/passwd",
            "..\\..\\evil.txt",
            "./",
            "blog-main/..",
            "../staging2/evil.txt",
        ] {
            let err = resolve_entry_path(root, hostile).unwrap_err();
            assert!(err.is_security(), "{} should be rejected", hostile);
        }
    }

    #[tokio::test]
    async fn test_extracts_two_files_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let archive = write_archive(
            dir.path(),
            &[
                Entry::Dir("blog-main/"),
                Entry::File("blog-main/compose.yaml", b"services:\n  web:\n    image: blog\n"),
                Entry::File("blog-main/static/logo.bin", &binary),
            ],
        );
        let staging = staging(dir.path());

        let stats = extract_archive(&archive, &staging, &CancellationToken::new()).await.unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.bytes, 4096 + 33);
        assert_eq!(
            std::fs::read(staging.join("blog-main/compose.yaml")).unwrap(),
            b"services:\n  web:\n    image: blog\n"
        );
        assert_eq!(
            std::fs::read(staging.join("blog-main/static/logo.bin")).unwrap(),
            binary
        );
    }

    #[tokio::test]
    async fn test_traversal_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            &[
                Entry::File("blog-main/ok.txt", b"fine"),
                Entry::File("../evil.txt", b"pwned"),
            ],
        );
        let staging = staging(dir.path());

        let err = extract_archive(&archive, &staging, &CancellationToken::new()).await.unwrap_err();

        assert!(err.is_security());
        assert_eq!(count_entries(&staging), 0);
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[tokio::test]
    async fn test_absolute_entry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("abs.txt");
        let name = target.to_string_lossy().to_string();
        let archive = write_archive(dir.path(), &[Entry::File(&name, b"pwned")]);
        let staging = staging(dir.path());

        let err = extract_archive(&archive, &staging, &CancellationToken::new()).await.unwrap_err();

        assert!(err.is_security());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_relative_staging_root() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), &[Entry::File("../escape.txt", b"x")]);

        let err = extract_archive(
            &archive,
            Path::new("relative-staging"),
            &CancellationToken::new(),
        )
        .await
            .unwrap_err();

        assert!(err.is_security());
        assert!(!Path::new("relative-staging").exists());
    }

    #[tokio::test]
    async fn test_symlink_entry_written_as_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(
            dir.path(),
            &[Entry::Symlink("blog-main/link", "/etc/passwd")],
        );
        let staging = staging(dir.path());

        extract_archive(&archive, &staging, &CancellationToken::new()).await.unwrap();

        let link = staging.join("blog-main/link");
        let meta = std::fs::symlink_metadata(&link).unwrap();
        assert!(meta.file_type().is_file());
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "/etc/passwd");
    }

    fn many_files(count: usize) -> Vec<(String, Vec<u8>)> {
        (0..count)
            .map(|i| (format!("blog-main/files/{}.txt", i), vec![b'x'; 512]))
            .collect()
    }

    fn count_files(dir: &Path) -> usize {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive(dir.path(), &[Entry::File("blog-main/a.txt", b"a")]);
        let staging = staging(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = extract_archive(&archive, &staging, &cancel).await.unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(count_entries(&staging), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_writes_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let files = many_files(5000);
        let entries: Vec<Entry<'_>> = files
            .iter()
            .map(|(name, data)| Entry::File(name, data))
            .collect();
        let archive = write_archive(dir.path(), &entries);
        let staging = staging(dir.path());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let result = extract_archive(&archive, &staging, &cancel).await;
        let written = count_files(&staging.join("blog-main/files"));
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        // Whether or not the cancel landed mid-way, nothing is written afterwards.
        assert_eq!(count_files(&staging.join("blog-main/files")), written);
        match result {
            Ok(stats) => assert_eq!(stats.files, 5000),
            Err(e) => {
                assert!(matches!(e, Error::Cancelled));
                assert!(written < 5000);
            }
        }
    }

    #[tokio::test]
    async fn test_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        std::fs::write(&archive, b"this is not a zip file").unwrap();
        let staging = staging(dir.path());

        let err = extract_archive(&archive, &staging, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
