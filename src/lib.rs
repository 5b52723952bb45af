pub mod aggregate;
pub mod app;
pub mod config;
pub mod devices;
pub mod errors;
pub mod fetcher;
pub mod handlers;
pub mod meta;
pub mod models;
pub mod series;
pub mod state;
pub mod stats;
pub mod storage;

pub use app::router;
pub use config::Settings;
pub use fetcher::ConsumptionApi;
pub use state::AppState;
