//! Built-in builders and registries.
//!
//! | kind     | name          | produces / publishes                         |
//! |----------|---------------|----------------------------------------------|
//! | builder  | `command`     | whatever a shell command writes to `output`  |
//! | builder  | `release`     | one cross-compiled binary per `os/arch`      |
//! | builder  | `image`       | an existing image reference                  |
//! | registry | `local`       | files copied into a directory + `SHA256SUMS` |
//! | registry | `release`     | a forge release with uploaded assets         |
//! | registry | `passthrough` | the artifact location as-is                  |

pub mod builder;
pub use builder::{CommandBuilder, ImageBuilder, ReleaseBuilder};

pub mod registry;
pub use registry::{LocalRegistry, PassthroughRegistry, ReleaseRegistry};

pub mod digest;

use shipyard_core::{Builder, PluginError, PluginTable, Registry};

/// Register every built-in plugin into `table`.
pub fn register_builtin(table: &mut PluginTable) -> Result<(), PluginError> {
    table.register_builder(CommandBuilder::NAME, |o| {
        Ok(Box::new(CommandBuilder::from_options(o)?) as Box<dyn Builder>)
    })?;
    table.register_builder(ReleaseBuilder::NAME, |o| {
        Ok(Box::new(ReleaseBuilder::from_options(o)?) as Box<dyn Builder>)
    })?;
    table.register_builder(ImageBuilder::NAME, |o| {
        Ok(Box::new(ImageBuilder::from_options(o)?) as Box<dyn Builder>)
    })?;

    table.register_registry(LocalRegistry::NAME, |o| {
        Ok(Box::new(LocalRegistry::from_options(o)?) as Box<dyn Registry>)
    })?;
    table.register_registry(ReleaseRegistry::NAME, |o| {
        Ok(Box::new(ReleaseRegistry::from_options(o)?) as Box<dyn Registry>)
    })?;
    table.register_registry(PassthroughRegistry::NAME, |o| {
        Ok(Box::new(PassthroughRegistry::from_options(o)?) as Box<dyn Registry>)
    })?;
    Ok(())
}
