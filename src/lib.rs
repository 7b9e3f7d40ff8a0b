pub mod backend;
pub mod config;
pub mod error;
pub mod fetch;
pub mod mcp;
pub mod memory;
pub mod model;
pub mod query;
pub mod service;
pub mod table;

use url::Url;

use error::StoreError;
use query::FlightSearch;

pub use backend::Backend;
pub use config::{StoreConfig, Table};
pub use fetch::RestBackend;
pub use memory::MemoryBackend;
pub use service::{TourFilter, TourSearch, TripStore};

pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

/// URL of the site's flight search page for `search`, validated first.
pub fn generate_search_url(search: &FlightSearch, site: &str) -> Result<String, StoreError> {
    search.validate()?;
    let site = Url::parse(site)
        .map_err(|e| StoreError::InvalidConfig(format!("site URL \"{site}\": {e}")))?;
    Ok(search.search_page_url(&site)?.to_string())
}
