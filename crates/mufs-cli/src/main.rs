//! mufs: browse and manipulate any mufs address from a terminal.
//!
//! Usage:
//!   mufs ls ~/src
//!   mufs --json stat file://localhost/etc/hosts
//!   mufs cp /tmp/a.txt ~/backup/
//!   mufs chmod u+x ./build.sh
//!
//! Logging goes to stderr; `RUST_LOG` overrides the configured filter.

mod mode;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mufs_kernel::vfs::{FileRef, WildcardFilter};
use mufs_kernel::{FileFactory, FileObject, FileOperation, VfsConfig, VfsError};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::mode::ModeChange;

#[derive(Parser, Debug)]
#[command(name = "mufs")]
#[command(about = "Uniform access to local and virtual filesystems")]
struct Args {
    /// Configuration file (default: the user config dir's mufs/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        path: String,
        /// Include hidden files
        #[arg(short, long)]
        all: bool,
        /// Only names matching this wildcard (`*.rs`)
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// Show metadata of a file
    Stat { path: String },
    /// Write a file's content to stdout
    Cat { path: String },
    /// Copy a file
    Cp { src: String, dst: String },
    /// Move or rename a file
    Mv { src: String, dst: String },
    /// Create a directory
    Mkdir {
        path: String,
        /// Create missing parents too
        #[arg(short, long)]
        parents: bool,
    },
    /// Delete a file or an empty directory
    Rm { path: String },
    /// Change permission bits (`u+x`, `go-w`)
    Chmod { mode: ModeChange, path: String },
    /// List mounted volumes
    Volumes,
    /// Show the volume a file lives on
    Volume { path: String },
}

/// Serializable view of one file.
#[derive(Serialize, Debug)]
struct FileInfo {
    name: String,
    url: String,
    path: String,
    directory: bool,
    symlink: bool,
    hidden: bool,
    size: Option<u64>,
    modified: Option<u64>,
    permissions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    capabilities: Vec<FileOperation>,
}

impl FileInfo {
    fn of(file: &dyn FileObject, detailed: bool) -> Self {
        let directory = file.is_directory();
        Self {
            name: file.name(),
            url: file.url().to_url_string(false, true),
            path: file.absolute_path(),
            directory,
            symlink: file.is_symlink(),
            hidden: file.is_hidden(),
            size: if directory { None } else { file.size().ok() },
            modified: file.last_modified().ok().and_then(epoch_seconds),
            permissions: file.permissions().bits().to_string(),
            owner: detailed.then(|| file.owner()).flatten(),
            group: detailed.then(|| file.group()).flatten(),
            capabilities: if detailed { file.capabilities().operations().collect() } else { Vec::new() },
        }
    }

    fn line(&self) -> String {
        let kind = if self.directory { 'd' } else if self.symlink { 'l' } else { '-' };
        let size = self.size.map(|s| s.to_string()).unwrap_or_default();
        format!("{kind}{} {size:>12} {}", self.permissions, self.name)
    }
}

fn epoch_seconds(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

fn main() {
    let args = Args::parse();
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mufs: {e:#}");
            std::process::exit(2);
        }
    };
    init_tracing(&config);

    let factory = FileFactory::with_config(config);
    if let Err(e) = run(&factory, &args) {
        eprintln!("mufs: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<VfsConfig> {
    let config = match path {
        Some(path) => VfsConfig::load(path)?,
        None => VfsConfig::load_default()?,
    };
    Ok(config)
}

fn init_tracing(config: &VfsConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Resolve a URL or path; relative paths are taken from the working directory.
fn open(factory: &FileFactory, text: &str) -> Result<FileRef> {
    let resolved = if !text.contains("://") && !text.starts_with('~') && Path::new(text).is_relative() {
        let absolute = std::env::current_dir()?.join(text);
        factory.get_file_at(&absolute)
    } else {
        factory.get_file_for_path(text)
    };
    resolved.with_context(|| format!("cannot resolve {text:?}"))
}

fn run(factory: &FileFactory, args: &Args) -> Result<()> {
    let mut out = io::stdout().lock();
    match &args.command {
        Command::Ls { path, all, pattern } => {
            let dir = open(factory, path)?;
            let children = match pattern {
                Some(pattern) => dir.ls_filtered(Some(&WildcardFilter::new(pattern, !cfg!(windows))?))?,
                None => dir.ls()?,
            };
            let infos: Vec<FileInfo> = children
                .iter()
                .filter(|f| *all || !f.is_hidden())
                .map(|f| FileInfo::of(f.as_ref(), false))
                .collect();
            if args.json {
                serde_json::to_writer_pretty(&mut out, &infos)?;
                writeln!(out)?;
            } else {
                for info in &infos {
                    writeln!(out, "{}", info.line())?;
                }
            }
        }
        Command::Stat { path } => {
            let file = open(factory, path)?;
            if !file.exists() {
                return Err(VfsError::not_found(file.absolute_path()).into());
            }
            print_info(&mut out, &FileInfo::of(file.as_ref(), true), args.json)?;
        }
        Command::Cat { path } => {
            let file = open(factory, path)?;
            let mut input = file.input_stream()?;
            io::copy(&mut input, &mut out)?;
        }
        Command::Cp { src, dst } => {
            let src = open(factory, src)?;
            let dst = target_in(factory, open(factory, dst)?, src.as_ref())?;
            let bytes = copy(src.as_ref(), dst.as_ref())?;
            tracing::info!(from = %src.url(), to = %dst.url(), bytes, "copied");
        }
        Command::Mv { src, dst } => {
            let src = open(factory, src)?;
            let dst = target_in(factory, open(factory, dst)?, src.as_ref())?;
            move_file(src.as_ref(), dst.as_ref())?;
        }
        Command::Mkdir { path, parents } => {
            let dir = open(factory, path)?;
            if *parents {
                mkdirs(&dir)?;
            } else {
                dir.mkdir()?;
            }
        }
        Command::Rm { path } => open(factory, path)?.delete()?,
        Command::Chmod { mode, path } => {
            let file = open(factory, path)?;
            for (class, right) in mode.bits() {
                file.change_permission(class, right, mode.enabled)?;
            }
            if !args.json {
                writeln!(out, "{} {}", file.permissions().bits(), file.absolute_path())?;
            }
        }
        Command::Volumes => {
            let infos: Vec<FileInfo> = factory.volumes().iter().map(|v| volume_info(v.as_ref())).collect();
            if args.json {
                serde_json::to_writer_pretty(&mut out, &infos)?;
                writeln!(out)?;
            } else {
                for info in &infos {
                    writeln!(out, "{}", info.path)?;
                }
            }
        }
        Command::Volume { path } => {
            let volume = open(factory, path)?.volume()?;
            print_info(&mut out, &volume_info(volume.as_ref()), args.json)?;
        }
    }
    Ok(())
}

fn print_info(out: &mut impl Write, info: &FileInfo, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, info)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "{}", info.line())?;
    writeln!(out, "  url:   {}", info.url)?;
    writeln!(out, "  path:  {}", info.path)?;
    if let Some(modified) = info.modified {
        writeln!(out, "  mtime: {modified}")?;
    }
    if let Some(owner) = &info.owner {
        writeln!(out, "  owner: {owner}:{}", info.group.as_deref().unwrap_or("?"))?;
    }
    if !info.capabilities.is_empty() {
        let ops: Vec<String> = info.capabilities.iter().map(ToString::to_string).collect();
        writeln!(out, "  ops:   {}", ops.join(" "))?;
    }
    Ok(())
}

fn volume_info(volume: &dyn FileObject) -> FileInfo {
    let mut info = FileInfo::of(volume, false);
    if volume.is_supported(FileOperation::GetTotalSpace) {
        info.size = volume.total_space().ok();
    }
    info
}

/// `dst` itself, or `dst/<name of src>` when `dst` is an existing directory.
fn target_in(factory: &FileFactory, dst: FileRef, src: &dyn FileObject) -> Result<FileRef> {
    if !dst.is_directory() {
        return Ok(dst);
    }
    Ok(factory.get_file(&dst.url().join(&src.name()))?)
}

fn copy(src: &dyn FileObject, dst: &dyn FileObject) -> Result<u64> {
    if src.is_directory() {
        bail!("{} is a directory", src.absolute_path());
    }
    if src.url() == dst.url() {
        return Err(VfsError::SameFile(src.absolute_path()).into());
    }
    let mut input = src.input_stream()?;
    let mut output = dst.output_stream()?;
    let bytes = io::copy(&mut input, &mut output).map_err(|e| VfsError::from_io(e, src.absolute_path()))?;
    output.flush()?;
    Ok(bytes)
}

/// Rename natively; across volumes or backends, copy then delete.
fn move_file(src: &dyn FileObject, dst: &dyn FileObject) -> Result<()> {
    match src.rename_to(dst) {
        Ok(()) => Ok(()),
        Err(VfsError::CrossVolume(_)) | Err(VfsError::Unsupported(FileOperation::Rename)) => {
            tracing::debug!(from = %src.url(), to = %dst.url(), "falling back to copy and delete");
            copy(src, dst)?;
            src.delete()?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn mkdirs(dir: &FileRef) -> Result<()> {
    if dir.is_directory() {
        return Ok(());
    }
    if let Some(parent) = dir.parent() {
        mkdirs(&parent)?;
    }
    match dir.mkdir() {
        Ok(()) | Err(VfsError::AlreadyExists(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn factory() -> FileFactory {
        FileFactory::with_config(VfsConfig::default())
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["mufs", "--json", "chmod", "u+x", "/tmp/f"]).unwrap();
        assert!(args.json);
        assert!(matches!(args.command, Command::Chmod { .. }));
        assert!(Args::try_parse_from(["mufs", "chmod", "u?x", "/tmp/f"]).is_err());
    }

    #[test]
    fn test_move_across_backends_copies() {
        let factory = factory();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"moved").unwrap();

        let src = factory.get_file_at(&path).unwrap();
        let dst = factory.get_file_for_path("mem://cli/a.txt").unwrap();
        move_file(src.as_ref(), dst.as_ref()).unwrap();
        assert!(!path.exists());

        let mut text = String::new();
        dst.input_stream().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "moved");
    }

    #[test]
    fn test_mkdirs_and_target_in() {
        let factory = factory();
        let dir = TempDir::new().unwrap();
        let deep = factory.get_file_at(&dir.path().join("x/y/z")).unwrap();
        mkdirs(&deep).unwrap();
        assert!(deep.is_directory());

        let src = factory.get_file_at(&dir.path().join("f")).unwrap();
        let target = target_in(&factory, deep.clone(), src.as_ref()).unwrap();
        assert_eq!(target.name(), "f");
        assert!(target.url().path().ends_with("/x/y/z/f"));
    }

    #[test]
    fn test_file_info_line() {
        let factory = factory();
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data"), b"12345").unwrap();
        let file = factory.get_file_at(&dir.path().join("data")).unwrap();
        let info = FileInfo::of(file.as_ref(), true);
        assert_eq!(info.size, Some(5));
        assert!(info.line().ends_with(" data"));
        assert!(info.capabilities.contains(&FileOperation::ReadFile));
    }
}
