//! Layer archive extraction.
//!
//! Extraction sits behind the [`Extractor`] capability so the pull
//! sequencing can be exercised without a real decompression tool. Two
//! implementations exist: [`TarCommand`] shells out to the system `tar`
//! utility, [`NativeUnpacker`] unpacks in-process and honours OCI
//! whiteout markers.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use minibox_common::config::ExtractorKind;
use minibox_common::error::{MiniboxError, Result};

/// Prefix marking a deleted path in an OCI layer.
const WHITEOUT_PREFIX: &str = ".wh.";

/// Marker hiding every lower-layer entry of its directory.
const OPAQUE_WHITEOUT: &str = ".wh..wh..opq";

/// Gzip stream magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Unpacks one compressed layer archive into a directory.
pub trait Extractor {
    /// Extracts `archive` into `dest`, overwriting existing entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or unpacked.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Returns the extractor selected by configuration.
///
/// # Errors
///
/// Returns an error if the `tar` utility is selected but not installed.
pub fn extractor_for(kind: ExtractorKind) -> Result<Box<dyn Extractor>> {
    match kind {
        ExtractorKind::Tar => Ok(Box::new(TarCommand::locate()?)),
        ExtractorKind::Native => Ok(Box::new(NativeUnpacker)),
    }
}

/// Extracts through the system `tar` utility (`tar -xzf <src> -C <dest>`).
#[derive(Debug, Clone)]
pub struct TarCommand {
    program: PathBuf,
}

impl TarCommand {
    /// Finds `tar` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Config` if no `tar` executable is found.
    pub fn locate() -> Result<Self> {
        let program = which::which("tar").map_err(|e| MiniboxError::Config {
            message: format!("tar utility not found: {e}"),
        })?;
        tracing::debug!(program = %program.display(), "using system tar");
        Ok(Self { program })
    }

    /// Uses an explicit `tar`-compatible program.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Extractor for TarCommand {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        tracing::info!(
            archive = %archive.display(),
            target = %dest.display(),
            "extracting layer with tar"
        );
        let status = Command::new(&self.program)
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| MiniboxError::Extract {
                archive: archive.to_path_buf(),
                message: format!("could not run {}: {e}", self.program.display()),
            })?;
        if !status.success() {
            return Err(MiniboxError::Extract {
                archive: archive.to_path_buf(),
                message: format!("{} exited with {status}", self.program.display()),
            });
        }
        Ok(())
    }
}

/// In-process extraction of plain or gzip-compressed tar layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeUnpacker;

impl Extractor for NativeUnpacker {
    /// Whiteouts only hide lower layers, so all of a layer's whiteouts are
    /// applied in a first pass and its regular entries unpacked in a second.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        tracing::info!(
            archive = %archive.display(),
            target = %dest.display(),
            "extracting layer in-process"
        );
        let extract_err = |e: std::io::Error| MiniboxError::Extract {
            archive: archive.to_path_buf(),
            message: e.to_string(),
        };
        std::fs::create_dir_all(dest).map_err(|e| MiniboxError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut whiteouts = open_layer(archive)?;
        for entry in whiteouts.entries().map_err(extract_err)? {
            let entry = entry.map_err(extract_err)?;
            let path = entry.path().map_err(extract_err)?;
            if whiteout_name(&path).is_some() {
                apply_whiteout(&path, dest)?;
            }
        }

        let mut tar = open_layer(archive)?;
        tar.set_preserve_permissions(true);
        tar.set_preserve_ownerships(running_as_root());
        tar.set_overwrite(true);
        for entry in tar.entries().map_err(extract_err)? {
            let mut entry = entry.map_err(extract_err)?;
            let path = entry.path().map_err(extract_err)?.into_owned();
            if whiteout_name(&path).is_some() {
                continue;
            }
            if !entry.unpack_in(dest).map_err(extract_err)? {
                tracing::warn!(path = %path.display(), "skipped entry escaping the root");
            }
        }
        Ok(())
    }
}

/// Opens a plain or gzip-compressed layer for one pass over its entries.
fn open_layer(archive: &Path) -> Result<tar::Archive<Box<dyn Read>>> {
    let io_err = |e: std::io::Error| MiniboxError::Io {
        path: archive.to_path_buf(),
        source: e,
    };
    let mut file = File::open(archive).map_err(io_err)?;
    let reader: Box<dyn Read> = if is_gzip(&mut file).map_err(io_err)? {
        Box::new(flate2::read::GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(tar::Archive::new(reader))
}

/// Ownership can only be restored by root; otherwise files belong to the caller, as with `tar -x`.
fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Sniffs the gzip magic and rewinds the file.
fn is_gzip(file: &mut File) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let read = file.read(&mut magic)?;
    let _ = file.seek(SeekFrom::Start(0))?;
    Ok(read == magic.len() && magic == GZIP_MAGIC)
}

/// File name of a whiteout entry, `None` for regular entries.
fn whiteout_name(entry_path: &Path) -> Option<&str> {
    entry_path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|name| name.starts_with(WHITEOUT_PREFIX))
}

/// Applies a whiteout entry to the lower layers already in `dest`.
fn apply_whiteout(entry_path: &Path, dest: &Path) -> Result<()> {
    let Some(name) = whiteout_name(entry_path) else {
        return Ok(());
    };
    if !is_contained(entry_path) {
        tracing::warn!(path = %entry_path.display(), "ignoring whiteout escaping the root");
        return Ok(());
    }
    let parent = dest.join(entry_path.parent().unwrap_or_else(|| Path::new("")));
    // Symlinked parents are resolved host-side here, so they must stay under dest.
    let (Ok(real_parent), Ok(real_dest)) = (parent.canonicalize(), dest.canonicalize()) else {
        return Ok(());
    };
    if !real_parent.starts_with(&real_dest) {
        tracing::warn!(path = %entry_path.display(), "ignoring whiteout escaping the root");
        return Ok(());
    }

    if name == OPAQUE_WHITEOUT {
        tracing::debug!(dir = %parent.display(), "opaque whiteout");
        let Ok(children) = std::fs::read_dir(&parent) else {
            return Ok(());
        };
        for child in children.flatten() {
            remove_path(&child.path())?;
        }
    } else {
        let target = parent.join(&name[WHITEOUT_PREFIX.len()..]);
        tracing::debug!(path = %target.display(), "whiteout");
        remove_path(&target)?;
    }
    Ok(())
}

fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };
    let removed = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    removed.map_err(|e| MiniboxError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
