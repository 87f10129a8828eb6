pub mod app;
pub mod error;
pub mod extract;
pub mod routes;
pub mod views;

pub use app::{open_store, AppServices, ServerConfig};
pub use error::ServerError;
pub use routes::router;
