mod command;
pub use command::{CommandBuilder, CommandOptions};

mod release;
pub use release::{ReleaseBuilder, ReleaseOptions, Target};

mod image;
pub use image::{ImageBuilder, ImageOptions, image_fingerprint};

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use shipyard_core::{ExecutionContext, PluginError};
use shipyard_model::PluginOptions;

/// Decode `options` into the typed option set of `plugin`.
pub(crate) fn decode<T: DeserializeOwned>(
    plugin: &str,
    options: &PluginOptions,
) -> Result<T, PluginError> {
    options.decode().map_err(|e| PluginError::config(plugin, e))
}

/// Relative paths are resolved against the context's working directory.
pub(crate) fn resolve(ctx: &ExecutionContext, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        ctx.workdir().join(path)
    }
}
