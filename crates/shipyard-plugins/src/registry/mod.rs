mod local;
pub use local::{LocalOptions, LocalRegistry, SHA256SUMS};

mod release;
pub use release::{ReleaseRegistry, ReleaseRegistryOptions};

mod passthrough;
pub use passthrough::PassthroughRegistry;
