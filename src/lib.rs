pub mod config;
pub mod error;
pub mod handler;
pub mod http_client;
pub mod logging;
pub mod params;
pub mod periods;
pub mod render;
pub mod schedule;
pub mod scores;
pub mod server;

pub use error::{ScrapeError, ScrapeResult};
pub use http_client::{HttpSource, PageSource};
