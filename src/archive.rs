//! Deterministic tar packaging of fetched content
//!
//! Headers are normalised (zero mtime and ownership, fixed modes) and
//! directory entries are walked in file-name order, so the same input tree
//! always yields the same bytes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::job::{ArchiveRef, ContentRef};

const DIR_MODE: u32 = 0o755;
const EXEC_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("No content to package")]
    NoContent,

    #[error("Archive source missing: {0}")]
    SourceMissing(PathBuf),

    #[error("Archive I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Archive task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Archiver;

impl Archiver {
    pub fn new() -> Self {
        Self
    }

    /// Package `content` into a tar file at `dest` off the async runtime
    pub async fn archive(&self, content: &ContentRef, dest: &Path) -> Result<ArchiveRef> {
        let content = content.clone();
        let dest = dest.to_path_buf();

        tokio::task::spawn_blocking(move || archive_blocking(&content, &dest))
            .await
            .map_err(|e| ArchiveError::Aborted(e.to_string()))?
    }
}

/// Synchronous packaging, for callers already on a blocking thread
pub fn archive_blocking(content: &ContentRef, dest: &Path) -> Result<ArchiveRef> {
    let source = content.path().ok_or(ArchiveError::NoContent)?;
    let root_name = source
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| ArchiveError::SourceMissing(source.to_path_buf()))?;

    let is_dir = match std::fs::metadata(source) {
        Ok(metadata) => metadata.is_dir(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArchiveError::SourceMissing(source.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let file = File::create(dest)?;
    let mut builder = Builder::new(BufWriter::new(file));
    builder.follow_symlinks(false);

    match content {
        ContentRef::SingleFile(_) if !is_dir => append_file(&mut builder, source, &root_name)?,
        ContentRef::DirectoryTree(_) if is_dir => append_tree(&mut builder, source, &root_name)?,
        // Shape mismatch means the fetcher lied about what it produced
        _ => return Err(ArchiveError::SourceMissing(source.to_path_buf())),
    }

    let mut writer = builder.into_inner()?;
    writer.flush()?;

    debug!(source = %source.display(), dest = %dest.display(), "Archive written");
    Ok(ArchiveRef::new(dest))
}

fn append_tree<W: Write>(builder: &mut Builder<W>, source: &Path, root_name: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| ArchiveError::SourceMissing(entry.path().to_path_buf()))?;
        let name = root_name.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            let mut header = normalized_header(EntryType::Directory, 0, DIR_MODE);
            builder.append_data(&mut header, &name, io::empty())?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            let mut header = normalized_header(EntryType::Symlink, 0, FILE_MODE);
            builder.append_link(&mut header, &name, &target)?;
        } else {
            append_file(builder, entry.path(), &name)?;
        }
    }
    Ok(())
}

fn append_file<W: Write>(builder: &mut Builder<W>, path: &Path, name: &Path) -> Result<()> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    let mut header = normalized_header(EntryType::Regular, metadata.len(), file_mode(&metadata));
    builder.append_data(&mut header, name, file)?;
    Ok(())
}

fn normalized_header(entry_type: EntryType, size: u64, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        EXEC_MODE
    } else {
        FILE_MODE
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    FILE_MODE
}
