mod ids;
pub use ids::{DeploymentId, JobId, OwnerId, ServiceId};

mod task_ids;
pub use task_ids::TaskIds;

mod plugin_spec;
pub use plugin_spec::{PluginOptions, PluginSpec};

