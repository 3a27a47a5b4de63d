/// Sentinel-file protocol for module state
///
/// A marker is a zero-content file whose presence encodes a boolean: the
/// framework daemon consults `disable`, `remove` and `update` inside each
/// module directory on the next boot. Every mutation is followed by a
/// privileged preinit refresh so partition-backed early-boot files stay in
/// step with the marker set.
use crate::shell::RootExecutor;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

pub const DISABLE_MARKER: &str = "disable";
pub const REMOVE_MARKER: &str = "remove";
pub const UPDATE_MARKER: &str = "update";
pub const MODULE_PROP: &str = "module.prop";
pub const ACTION_SCRIPT: &str = "action.sh";
pub const ZYGISK_DIR: &str = "zygisk";
pub const ZYGISK_UNLOADED: &str = "unloaded";
pub const RIRU_DIR: &str = "riru";

/// Command understood by the framework daemon that rebuilds the preinit
/// file set from the current marker state.
pub const PREINIT_REFRESH_CMD: &str = "copy_preinit_files";

/// Outcome of a marker mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerChange {
    /// The marker now reflects the requested state.
    Applied,
    /// The request conflicts with current module state and was not applied
    /// (e.g. removal while an update is pending).
    Rejected,
}

/// Create a marker file. Succeeds if the marker already exists.
pub(crate) async fn set(path: &Path) -> Result<()> {
    fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create marker {:?}", path))?;
    Ok(())
}

/// Delete a marker file. Succeeds if the marker is already absent.
pub(crate) async fn clear(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to delete marker {:?}", path)),
    }
}

/// Ask the framework daemon to rebuild its preinit file set.
///
/// Callers await the result: a non-zero exit is an error, not a silent
/// success.
pub(crate) async fn refresh_preinit(exec: &dyn RootExecutor) -> Result<()> {
    let output = exec
        .run(PREINIT_REFRESH_CMD)
        .await
        .context("Preinit refresh command did not run")?;

    if !output.success() {
        anyhow::bail!(
            "Preinit refresh command exited with status {}",
            output.exit_code
        );
    }

    Ok(())
}
