pub mod search;
pub mod settings;
pub mod tagging;

pub use search::SearchService;
pub use settings::SettingsService;
pub use tagging::TaggingService;
