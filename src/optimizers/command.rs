//! External-tool plumbing shared by the codec adapters.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use tokio::process::Command;

/// Run an external tool to completion, failing on a non-zero exit status.
///
/// On Windows many CLIs are `.cmd` shims, so the tool is launched through `cmd /c`.
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<Output>
where
  I: IntoIterator<Item = S>,
  S: AsRef<OsStr>,
{
  let mut command = if cfg!(windows) {
    let mut command = Command::new("cmd.exe");
    command.arg("/c").arg(program);
    command
  } else {
    Command::new(program)
  };
  command.args(args).kill_on_drop(true);

  let output = command
    .output()
    .await
    .with_context(|| format!("failed to launch `{program}`"))?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    return Err(anyhow!(
      "`{program}` failed with status {}: {}",
      output.status,
      stderr.trim()
    ));
  }

  Ok(output)
}

/// Temporary directory scoped to one optimizer call.
///
/// Everything inside is removed when the value drops, on success and failure alike;
/// removal errors are ignored.
#[derive(Debug)]
pub struct ScratchDir {
  dir: TempDir,
}

impl ScratchDir {
  /// Create a fresh scratch directory under the system temp location.
  pub fn new(prefix: &str) -> Result<Self> {
    let dir = tempfile::Builder::new()
      .prefix(prefix)
      .tempdir()
      .context("failed to create scratch directory")?;
    Ok(Self { dir })
  }

  /// Create a fresh scratch directory inside `parent`.
  pub fn new_in(parent: &Path, prefix: &str) -> Result<Self> {
    let dir = tempfile::Builder::new()
      .prefix(prefix)
      .tempdir_in(parent)
      .with_context(|| format!("failed to create scratch directory in {}", parent.display()))?;
    Ok(Self { dir })
  }

  /// Path of a file inside the scratch directory.
  pub fn path(&self, name: &str) -> PathBuf {
    self.dir.path().join(name)
  }

  /// Root of the scratch directory.
  pub fn root(&self) -> &Path {
    self.dir.path()
  }

  /// Write `bytes` to a file inside the scratch directory and return its path.
  pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = self.path(name);
    tokio::fs::write(&path, bytes)
      .await
      .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
  }

  /// Read a tool's output file back.
  pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
    let path = self.path(name);
    tokio::fs::read(&path)
      .await
      .with_context(|| format!("tool finished but output {} is missing", path.display()))
  }
}
