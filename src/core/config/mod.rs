pub mod paths;
pub mod secrets;
pub mod settings;

pub use paths::AppPaths;
pub use settings::Settings;
