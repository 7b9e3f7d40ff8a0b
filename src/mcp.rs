use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StoreError;
use crate::fetch::RestBackend;
use crate::model::{self, FareClass};
use crate::query::{FlightSearch, TripType};
use crate::service::{TourFilter, TourSearch, TripStore};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SearchFlightsArgs {
    #[schemars(description = "Departure airport IATA code, exactly 3 letters. Example: SGN, HAN, DAD")]
    from: String,
    #[schemars(description = "Arrival airport IATA code, exactly 3 letters. Example: HAN, PQC, CXR")]
    to: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format. Example: 2025-08-15")]
    date: String,
    #[schemars(description = "Adult passengers (12+). Default: 1")]
    adults: Option<u32>,
    #[schemars(description = "Child passengers (2-11). Default: 0")]
    children: Option<u32>,
    #[schemars(description = "Infants on an adult's lap (under 2). Default: 0")]
    infants: Option<u32>,
    #[schemars(description = "One of: economy, business, first. Default: economy")]
    class: Option<String>,
    #[schemars(description = "One of: one-way, round-trip. Default: one-way")]
    trip: Option<String>,
    #[schemars(description = "Return only the N cheapest flights")]
    top: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct IdArgs {
    #[schemars(description = "Record id (UUID)")]
    id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct TransactionArgs {
    #[schemars(description = "Payment gateway transaction id")]
    transaction_id: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ListToursArgs {
    #[schemars(description = "Only tours in this category")]
    category: Option<String>,
    #[schemars(description = "Only tours of this difficulty")]
    difficulty: Option<String>,
    #[schemars(description = "Only featured tours. Default: false")]
    featured: Option<bool>,
    #[schemars(description = "Maximum number of tours")]
    limit: Option<usize>,
    #[schemars(description = "Skip this many tours. Page size defaults to 10")]
    offset: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SearchToursArgs {
    #[schemars(description = "Tours that visit this destination. Example: Ha Long")]
    destination: Option<String>,
    #[schemars(description = "Only tours in this category")]
    category: Option<String>,
    #[schemars(description = "Lowest adult price")]
    min_price: Option<f64>,
    #[schemars(description = "Highest adult price")]
    max_price: Option<f64>,
    #[schemars(description = "Exact tour length in days")]
    duration: Option<u32>,
    #[schemars(description = "Maximum number of tours")]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SearchUrlArgs {
    #[schemars(description = "Departure airport IATA code, exactly 3 letters")]
    from: String,
    #[schemars(description = "Arrival airport IATA code, exactly 3 letters")]
    to: String,
    #[schemars(description = "Departure date in YYYY-MM-DD format")]
    date: String,
    #[schemars(description = "Adult passengers (12+). Default: 1")]
    adults: Option<u32>,
    #[schemars(description = "One of: economy, business, first. Default: economy")]
    class: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct OpenUrlArgs {
    #[schemars(description = "URL to open. Must start with http:// or https://")]
    url: String,
}

fn tool_error(msg: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.into())]))
}

fn tool_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    match serde_json::to_string_pretty(value) {
        Ok(json) => Ok(CallToolResult::success(vec![Content::text(json)])),
        Err(e) => tool_error(format!("failed to encode result: {e}")),
    }
}

fn search_from_args(
    from: &str,
    to: &str,
    date: &str,
    adults: Option<u32>,
    class: Option<&str>,
) -> Result<FlightSearch, StoreError> {
    let mut search = FlightSearch::new(&from.to_uppercase(), &to.to_uppercase(), date);
    search.adults = adults.unwrap_or(1);
    if let Some(class) = class {
        search.fare_class = FareClass::from_str_loose(class)?;
    }
    Ok(search)
}

#[derive(Clone)]
struct TripStoreMcp {
    store: TripStore<RestBackend>,
    site: Url,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TripStoreMcp {
    fn new(store: TripStore<RestBackend>, site: Url) -> Self {
        Self {
            store,
            site,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Search scheduled flights on a route and date. Returns only flights with enough seats left in the requested class for all adults and children, earliest departure first, as JSON with per-class pricing and seat counts."
    )]
    async fn search_flights(
        &self,
        Parameters(args): Parameters<SearchFlightsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let mut search = match search_from_args(
            &args.from,
            &args.to,
            &args.date,
            args.adults,
            args.class.as_deref(),
        ) {
            Ok(s) => s,
            Err(e) => return tool_error(e.to_string()),
        };
        search.children = args.children.unwrap_or(0);
        search.infants = args.infants.unwrap_or(0);
        if let Some(ref trip) = args.trip {
            match TripType::from_str_loose(trip) {
                Ok(t) => search.trip_type = t,
                Err(e) => return tool_error(e.to_string()),
            }
        }

        match self.store.search_flights(&search).await {
            Ok(mut flights) => {
                if let Some(n) = args.top {
                    model::keep_cheapest(&mut flights, search.fare_class, n);
                }
                tool_json(&flights)
            }
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(description = "Get one flight by id, with pricing and seat availability per class.")]
    async fn get_flight(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.store.get_flight_by_id(&args.id).await {
            Ok(flight) => tool_json(&flight),
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(description = "List active tours, newest first. Supports category, difficulty and featured filters and paging.")]
    async fn list_tours(
        &self,
        Parameters(args): Parameters<ListToursArgs>,
    ) -> Result<CallToolResult, McpError> {
        let filter = TourFilter {
            category: args.category,
            difficulty: args.difficulty,
            featured: args.featured.unwrap_or(false),
            limit: args.limit,
            offset: args.offset,
        };
        match self.store.get_tours(&filter).await {
            Ok(tours) => tool_json(&tours),
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(description = "Search active tours by destination, category, adult price range and length in days. Best rated first.")]
    async fn search_tours(
        &self,
        Parameters(args): Parameters<SearchToursArgs>,
    ) -> Result<CallToolResult, McpError> {
        let search = TourSearch {
            destination: args.destination,
            category: args.category,
            min_price: args.min_price,
            max_price: args.max_price,
            duration: args.duration,
            limit: args.limit,
        };
        match self.store.search_tours(&search).await {
            Ok(tours) => tool_json(&tours),
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(description = "Get one active tour by id with its day-by-day itinerary.")]
    async fn get_tour(
        &self,
        Parameters(args): Parameters<IdArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self.store.get_tour_by_id(&args.id).await {
            Ok(detail) => tool_json(&detail),
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(description = "Look up a payment by its gateway transaction id. Includes status, amount and the gateway payment URL if any.")]
    async fn get_payment(
        &self,
        Parameters(args): Parameters<TransactionArgs>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .store
            .get_payment_by_transaction_id(&args.transaction_id)
            .await
        {
            Ok(payment) => tool_json(&payment),
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(
        description = "Build the booking site's flight search page URL for the given criteria. Use open_url to show it in a browser."
    )]
    async fn search_url(
        &self,
        Parameters(args): Parameters<SearchUrlArgs>,
    ) -> Result<CallToolResult, McpError> {
        let search = match search_from_args(
            &args.from,
            &args.to,
            &args.date,
            args.adults,
            args.class.as_deref(),
        ) {
            Ok(s) => s,
            Err(e) => return tool_error(e.to_string()),
        };
        if let Err(e) = search.validate() {
            return tool_error(e.to_string());
        }
        match search.search_page_url(&self.site) {
            Ok(url) => Ok(CallToolResult::success(vec![Content::text(url.to_string())])),
            Err(e) => tool_error(e.to_string()),
        }
    }

    #[tool(description = "Open a URL in the default web browser, such as a search_url result or a payment URL.")]
    async fn open_url(
        &self,
        Parameters(args): Parameters<OpenUrlArgs>,
    ) -> Result<CallToolResult, McpError> {
        if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
            return tool_error("URL must start with http:// or https://");
        }

        match open::that(&args.url) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Opened: {}",
                args.url
            ))])),
            Err(e) => tool_error(format!("failed to open browser: {e}")),
        }
    }
}

#[tool_handler]
impl ServerHandler for TripStoreMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "tripstore".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Read-only access to flights, tours and payments. Workflow: search_flights or search_tours to find options, get_flight or get_tour for details. To show the site's results page: search_url, then open_url with the returned URL.".into(),
            ),
        }
    }
}

pub async fn run(store: TripStore<RestBackend>, site: Url) -> Result<(), StoreError> {
    let service = TripStoreMcp::new(store, site)
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| StoreError::ConnectionFailed(format!("failed to start MCP server: {e}")))?;
    service
        .waiting()
        .await
        .map_err(|e| StoreError::ConnectionFailed(format!("MCP server error: {e}")))?;
    Ok(())
}
