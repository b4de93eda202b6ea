//! Filesystem capabilities consumed by the tree builder.
//!
//! [`DirectoryLister`] abstracts directory listing so trees can be built over
//! the real filesystem ([`FsLister`]), a virtual workspace, or a test fixture.
//! [`IgnorePredicate`] filters candidate entries a batch at a time.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }
}

/// Boxed future returned by [`DirectoryLister::read_directory`].
pub type ListFuture<'a> = Pin<Box<dyn Future<Output = io::Result<Vec<DirEntry>>> + Send + 'a>>;

/// Boxed future returned by [`IgnorePredicate::ignored`].
pub type IgnoreFuture<'a> = Pin<Box<dyn Future<Output = Vec<bool>> + Send + 'a>>;

/// Lists the immediate children of a directory.
///
/// Entries are returned in the lister's own order; callers must not assume
/// they are sorted. Implementations should stop early and return an error
/// once `cancel` fires.
pub trait DirectoryLister: Send + Sync {
    fn read_directory<'a>(&'a self, path: &'a Path, cancel: &'a CancellationToken)
    -> ListFuture<'a>;
}

/// Decides which candidate paths to leave out of a tree.
///
/// Receives a whole listing at once and returns one flag per path, `true`
/// meaning "ignore". A result shorter than the input leaves the remaining
/// paths in.
pub trait IgnorePredicate: Send + Sync {
    fn ignored<'a>(&'a self, paths: &'a [PathBuf]) -> IgnoreFuture<'a>;
}

/// Lists directories on the local filesystem via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl DirectoryLister for FsLister {
    fn read_directory<'a>(
        &'a self,
        path: &'a Path,
        cancel: &'a CancellationToken,
    ) -> ListFuture<'a> {
        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "directory listing cancelled",
                )),
                listing = list_dir(path) => listing,
            }
        })
    }
}

async fn list_dir(path: &Path) -> io::Result<Vec<DirEntry>> {
    let mut reader = tokio::fs::read_dir(path).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        // Follow symlinks so a linked directory lists as a directory.
        let is_dir = match tokio::fs::metadata(entry.path()).await {
            Ok(meta) => meta.is_dir(),
            Err(_) => entry.file_type().await?.is_dir(),
        };
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind: if is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
        });
    }
    Ok(entries)
}

/// An ignore predicate backed by a synchronous per-path closure.
///
/// ```ignore
/// let ignore = FnIgnore::new(|path: &Path| {
///     path.file_name().is_some_and(|n| n == "target" || n == ".git")
/// });
/// ```
pub struct FnIgnore<F>(F)
where
    F: Fn(&Path) -> bool + Send + Sync;

impl<F> FnIgnore<F>
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> IgnorePredicate for FnIgnore<F>
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn ignored<'a>(&'a self, paths: &'a [PathBuf]) -> IgnoreFuture<'a> {
        let flags = paths.iter().map(|p| (self.0)(p)).collect();
        Box::pin(async move { flags })
    }
}
