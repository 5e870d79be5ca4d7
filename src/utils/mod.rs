pub mod http_helpers;
pub mod logger;

pub use http_helpers::{HTTPError, map_client_error, map_store_error};
pub use logger::init_logging;
