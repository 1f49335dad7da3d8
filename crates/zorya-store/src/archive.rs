use crate::{fsync_dir, StoreError};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use zorya_schema::ArchiveFormat;

/// Where [`pack_directory`] writes before renaming into place.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Pack `source_dir` as a gzip tar at `dest`, with every entry under
/// `top_level/`.
///
/// The archive is reproducible:
/// - entries sorted lexicographically by relative path
/// - all timestamps set to 0 (Unix epoch), gzip header included
/// - all ownership set to 0:0
/// - permissions preserved as-is from source
///
/// Regular files and directories are packed; anything else is skipped with a
/// warning. The output appears at `dest` only once complete.
pub fn pack_directory(source_dir: &Path, top_level: &str, dest: &Path) -> Result<(), StoreError> {
    let mut entries = collect_entries(source_dir, source_dir)?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let partial = partial_path(dest);
    let out = BufWriter::new(File::create(&partial)?);
    let mut ar = tar::Builder::new(GzEncoder::new(out, Compression::default()));
    ar.follow_symlinks(false);

    append_dir(&mut ar, top_level, source_dir)?;
    for (rel_path, full_path) in &entries {
        let ft = match full_path.symlink_metadata() {
            Ok(m) => m.file_type(),
            Err(e) => {
                warn!("skipping {rel_path}: metadata error: {e}");
                continue;
            }
        };
        let name = format!("{top_level}/{rel_path}");
        if ft.is_file() {
            append_file(&mut ar, &name, full_path)?;
        } else if ft.is_dir() {
            append_dir(&mut ar, &name, full_path)?;
        } else {
            warn!("skipping unsupported file type: {rel_path}");
        }
    }

    let out = ar.into_inner()?.finish()?;
    let file = out.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);

    fs::rename(&partial, dest)?;
    if let Some(parent) = dest.parent() {
        fsync_dir(parent)?;
    }
    debug!("packed {} -> {}", source_dir.display(), dest.display());
    Ok(())
}

/// Extract `archive` into `target_dir`.
///
/// Entries that would escape `target_dir` fail the whole extraction.
/// Symlinks, hard links and device nodes are skipped.
pub fn unpack_archive(
    archive: &Path,
    format: ArchiveFormat,
    target_dir: &Path,
) -> Result<(), StoreError> {
    fs::create_dir_all(target_dir)?;
    let reader = open_reader(archive, format)?;
    let mut ar = tar::Archive::new(reader);
    ar.set_preserve_permissions(false);
    ar.set_unpack_xattrs(false);

    for entry in ar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(StoreError::UnsafeEntry {
                archive: archive.display().to_string(),
                entry: path.display().to_string(),
            });
        }
        match entry.header().entry_type() {
            tar::EntryType::Regular | tar::EntryType::Directory => {
                entry.unpack_in(target_dir)?;
            }
            other => {
                warn!(
                    "skipping {} in {}: unsupported entry type {other:?}",
                    path.display(),
                    archive.display()
                );
            }
        }
    }
    Ok(())
}

/// Entry names of a tar or gzip tar archive, in archive order.
pub fn archive_entries(archive: &Path) -> Result<Vec<String>, StoreError> {
    let mut magic = [0u8; 2];
    let gzipped = File::open(archive)?.read_exact(&mut magic).is_ok() && magic == [0x1f, 0x8b];
    let format = if gzipped {
        ArchiveFormat::TarGz
    } else {
        ArchiveFormat::Tar
    };
    let mut ar = tar::Archive::new(open_reader(archive, format)?);
    let mut names = Vec::new();
    for entry in ar.entries()? {
        names.push(entry?.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

fn open_reader(archive: &Path, format: ArchiveFormat) -> Result<Box<dyn Read>, StoreError> {
    let file = BufReader::new(File::open(archive)?);
    Ok(match format {
        ArchiveFormat::Tar => Box::new(file),
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
    })
}

/// Recursively collect (relative_path, full_path) pairs from a directory tree.
fn collect_entries(root: &Path, current: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut result = Vec::new();
    if !current.exists() {
        return Ok(result);
    }
    for entry in fs::read_dir(current)? {
        let full = entry?.path();
        let rel = full
            .strip_prefix(root)
            .map_err(|e| StoreError::Io(std::io::Error::other(format!("path strip: {e}"))))?
            .to_string_lossy()
            .to_string();

        if full.symlink_metadata()?.is_dir() {
            result.push((rel, full.clone()));
            result.extend(collect_entries(root, &full)?);
        } else {
            result.push((rel, full));
        }
    }
    Ok(result)
}

fn make_header(full_path: &Path, entry_type: tar::EntryType) -> Result<tar::Header, StoreError> {
    let meta = full_path.symlink_metadata()?;
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(meta.permissions().mode());
    Ok(header)
}

fn append_file<W: std::io::Write>(
    ar: &mut tar::Builder<W>,
    name: &str,
    full_path: &Path,
) -> Result<(), StoreError> {
    let file = File::open(full_path)?;
    let mut header = make_header(full_path, tar::EntryType::Regular)?;
    header.set_size(file.metadata()?.len());
    header.set_cksum();
    ar.append_data(&mut header, name, BufReader::new(file))?;
    Ok(())
}

fn append_dir<W: std::io::Write>(
    ar: &mut tar::Builder<W>,
    name: &str,
    full_path: &Path,
) -> Result<(), StoreError> {
    let mut header = make_header(full_path, tar::EntryType::Directory)?;
    header.set_size(0);
    header.set_cksum();
    let path = if name.ends_with('/') {
        name.to_owned()
    } else {
        format!("{name}/")
    };
    ar.append_data(&mut header, &path, &[] as &[u8])?;
    Ok(())
}
