mod config;
pub use config::{ENV_PLATFORM_TOKEN, ENV_PLATFORM_URL, PlatformConfig};

mod http;
pub use http::HttpPlatform;

mod local;
pub use local::LocalPlatform;
