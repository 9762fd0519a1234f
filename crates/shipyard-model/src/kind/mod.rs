mod task;
pub use task::{
    ImageDeploy, JobDestroy, RepositoryDeploy, RepositoryRedeploy, RepositorySource, Task, TaskKind,
};

mod request;
pub use request::{ENV_TASK_PAYLOAD, ENV_TASK_TYPE, TaskRequest};
