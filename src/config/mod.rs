// Configuration module
// Public interface for configuration loading

pub mod constants;
mod loader;
mod provider;
mod settings;

pub use loader::{default_config_path, load_config};
pub use provider::ProviderEntry;
pub use settings::{Config, RefinementSettings};
