use url::Url;

use crate::error::StoreError;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const KEY_VAR: &str = "SUPABASE_SERVICE_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Flights,
    Bookings,
    Passengers,
    Payments,
    Tours,
    TourItinerary,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flights => "flights",
            Self::Bookings => "bookings",
            Self::Passengers => "passengers",
            Self::Payments => "payments",
            Self::Tours => "tours",
            Self::TourItinerary => "tour_itinerary",
        }
    }

    /// Tables whose rows carry an `updated_at` column.
    pub fn tracks_updates(self) -> bool {
        !matches!(self, Self::Passengers | Self::TourItinerary)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct StoreConfig {
    pub url: Url,
    pub service_key: String,
    pub proxy: Option<String>,
    pub timeout: u64,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url.as_str())
            .field("service_key", &"<redacted>")
            .field("proxy", &self.proxy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(url: Option<&str>, service_key: Option<&str>) -> Result<Self, StoreError> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(StoreError::MissingConfig(URL_VAR))?;
        let service_key = service_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(StoreError::MissingConfig(KEY_VAR))?;

        let url = Url::parse(url)
            .map_err(|e| StoreError::InvalidConfig(format!("{URL_VAR} \"{url}\": {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StoreError::InvalidConfig(format!(
                "{URL_VAR} must be an http(s) URL, got \"{url}\""
            )));
        }

        Ok(Self {
            url,
            service_key: service_key.to_string(),
            proxy: None,
            timeout: 30,
        })
    }

    pub fn from_env() -> Result<Self, StoreError> {
        let url = std::env::var(URL_VAR).ok();
        let key = std::env::var(KEY_VAR).ok();
        Self::new(url.as_deref(), key.as_deref())
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    /// `{url}/rest/v1/{table}`
    pub fn table_url(&self, table: Table) -> Result<Url, StoreError> {
        let mut base = self.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(&format!("rest/v1/{}", table.as_str()))
            .map_err(|e| StoreError::InvalidConfig(format!("{URL_VAR}: {e}")))
    }
}
