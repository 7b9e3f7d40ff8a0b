use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::{StoreConfig, Table};
use crate::error::StoreError;
use crate::fetch::RestBackend;
use crate::model::{
    Booking, BookingStatus, BookingType, Flight, FlightStatus, Passenger, Payment, PaymentStatus,
    Stored, Tour, TourDetail,
};
use crate::query::{FlightSearch, Order, Request};

/// Page size used when an offset is given without a limit.
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourFilter {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub featured: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourSearch {
    pub destination: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub duration: Option<u32>,
    pub limit: Option<usize>,
}

fn present(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

fn nonzero(n: Option<usize>) -> Option<usize> {
    n.filter(|n| *n > 0)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(value)?)
}

fn encode<T: Serialize>(record: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(record)?)
}

/// Booking and payment data access. Every method makes exactly one call to
/// the backend; failures come back labelled with the operation.
#[derive(Clone)]
pub struct TripStore<B> {
    backend: B,
}

impl TripStore<RestBackend> {
    pub fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        Ok(Self::new(RestBackend::new(config)?))
    }
}

impl<B: Backend> TripStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn run<T: DeserializeOwned>(
        &self,
        op: &'static str,
        request: Request,
    ) -> Result<T, StoreError> {
        let table = request.table;
        let result = match self.backend.execute(request).await {
            Ok(value) => decode(value),
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            warn!(%table, op, "{e}");
            e.during(op)
        })
    }

    pub async fn get_flight_by_id(&self, flight_id: &str) -> Result<Flight, StoreError> {
        let request = Request::select(Table::Flights).eq("id", flight_id).single();
        self.run("getting flight", request).await
    }

    /// Scheduled flights on the route and date with enough seats left in the
    /// requested class for every adult and child.
    pub async fn search_flights(&self, search: &FlightSearch) -> Result<Vec<Flight>, StoreError> {
        let date = search
            .validate()
            .map_err(|e| e.during("searching flights"))?;

        let request = Request::select(Table::Flights)
            .eq("departure_airport", search.from.as_str())
            .eq("arrival_airport", search.to.as_str())
            .eq("departure_date", date.format("%Y-%m-%d").to_string())
            .eq("status", FlightStatus::Scheduled.as_str())
            .order(Order::asc("departure_time"));

        let mut flights: Vec<Flight> = self.run("searching flights", request).await?;
        let seats = search.seats_needed();
        let before = flights.len();
        flights.retain(|f| f.pricing.seats_available(search.fare_class, seats));
        debug!(
            from = %search.from,
            to = %search.to,
            found = before,
            bookable = flights.len(),
            "flight search"
        );
        Ok(flights)
    }

    pub async fn create_booking(&self, booking: &Booking) -> Result<Stored<Booking>, StoreError> {
        let row = encode(booking).map_err(|e| e.during("creating booking"))?;
        let request = Request::insert(Table::Bookings, vec![row]).single();
        let stored: Stored<Booking> = self.run("creating booking", request).await?;
        info!(
            id = %stored.id,
            number = %stored.record.booking_number,
            kind = stored.record.booking_type.as_str(),
            "booking created"
        );
        Ok(stored)
    }

    pub async fn update_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<Stored<Booking>, StoreError> {
        let request = Request::update(Table::Bookings, json!({ "status": status }))
            .eq("id", booking_id)
            .single();
        let stored: Stored<Booking> = self.run("updating booking status", request).await?;
        info!(id = %booking_id, status = status.as_str(), "booking status updated");
        Ok(stored)
    }

    pub async fn get_bookings_by_type(
        &self,
        booking_type: BookingType,
        user_id: Option<&str>,
    ) -> Result<Vec<Stored<Booking>>, StoreError> {
        let mut request = Request::select(Table::Bookings).eq("booking_type", booking_type.as_str());
        if let Some(user) = user_id.filter(|u| !u.is_empty()) {
            request = request.eq("user_id", user);
        }
        self.run("getting bookings", request).await
    }

    /// Inserts one booking's passengers in a single call. All passengers must
    /// reference the same booking.
    pub async fn create_passengers(
        &self,
        passengers: &[Passenger],
    ) -> Result<Vec<Stored<Passenger>>, StoreError> {
        let Some(first) = passengers.first() else {
            return Ok(Vec::new());
        };
        if let Some(stray) = passengers.iter().find(|p| p.booking_id != first.booking_id) {
            return Err(StoreError::Validation(format!(
                "passenger batch mixes bookings {} and {}",
                first.booking_id, stray.booking_id
            ))
            .during("creating passengers"));
        }

        let rows = passengers
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.during("creating passengers"))?;
        let request = Request::insert(Table::Passengers, rows);
        let stored: Vec<Stored<Passenger>> = self.run("creating passengers", request).await?;
        info!(booking = %first.booking_id, count = stored.len(), "passengers created");
        Ok(stored)
    }

    pub async fn create_payment(&self, payment: &Payment) -> Result<Stored<Payment>, StoreError> {
        let row = encode(payment).map_err(|e| e.during("creating payment"))?;
        let request = Request::insert(Table::Payments, vec![row]).single();
        let stored: Stored<Payment> = self.run("creating payment", request).await?;
        info!(
            txn = %stored.record.transaction_id,
            gateway = stored.record.gateway.as_str(),
            amount = stored.record.amount,
            "payment created"
        );
        Ok(stored)
    }

    /// Sets the status and stamps `updated_at`; `paid_at` is written only
    /// when given. The owning booking is left as it is.
    pub async fn update_payment_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<Stored<Payment>, StoreError> {
        let mut patch = json!({
            "status": status,
            "updated_at": Utc::now(),
        });
        if let Some(paid_at) = paid_at {
            patch["paid_at"] = json!(paid_at);
        }

        let request = Request::update(Table::Payments, patch)
            .eq("transaction_id", transaction_id)
            .single();
        let stored: Stored<Payment> = self.run("updating payment status", request).await?;
        info!(txn = %transaction_id, status = status.as_str(), "payment status updated");
        Ok(stored)
    }

    pub async fn get_payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Stored<Payment>, StoreError> {
        let request = Request::select(Table::Payments)
            .eq("transaction_id", transaction_id)
            .single();
        self.run("getting payment", request).await
    }

    /// Active tours, newest first.
    pub async fn get_tours(&self, filter: &TourFilter) -> Result<Vec<Tour>, StoreError> {
        let mut request = Request::select(Table::Tours).eq("is_active", true);
        if let Some(category) = present(&filter.category) {
            request = request.eq("category", category);
        }
        if let Some(difficulty) = present(&filter.difficulty) {
            request = request.eq("difficulty", difficulty);
        }
        if filter.featured {
            request = request.eq("is_featured", true);
        }
        let limit = nonzero(filter.limit);
        if let Some(limit) = limit {
            request = request.limit(limit);
        }
        if let Some(offset) = nonzero(filter.offset) {
            let size = limit.unwrap_or(DEFAULT_PAGE_SIZE);
            request = request.range(offset, offset.saturating_add(size - 1));
        }

        self.run("getting tours", request.order(Order::desc("created_at")))
            .await
    }

    pub async fn get_tour_by_id(&self, tour_id: &str) -> Result<TourDetail, StoreError> {
        let request = Request::select(Table::Tours)
            .embed(Table::TourItinerary, "tour_id", Some(Order::asc("day_number")))
            .eq("id", tour_id)
            .eq("is_active", true)
            .single();
        self.run("getting tour", request).await
    }

    /// Active tours matching every given criterion, best rated first.
    pub async fn search_tours(&self, search: &TourSearch) -> Result<Vec<Tour>, StoreError> {
        let mut request = Request::select(Table::Tours).eq("is_active", true);
        if let Some(destination) = present(&search.destination) {
            request = request.contains("destinations", vec![destination.to_string()]);
        }
        if let Some(category) = present(&search.category) {
            request = request.eq("category", category);
        }
        if let Some(min) = search.min_price.filter(|p| *p > 0.0) {
            request = request.gte("price_adult", min);
        }
        if let Some(max) = search.max_price.filter(|p| *p > 0.0) {
            request = request.lte("price_adult", max);
        }
        if let Some(days) = search.duration.filter(|d| *d > 0) {
            request = request.eq("duration_days", days);
        }
        if let Some(limit) = nonzero(search.limit) {
            request = request.limit(limit);
        }

        self.run("searching tours", request.order(Order::desc("rating")))
            .await
    }

    /// Cheap round trip to confirm the API is reachable and the key works.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let request = Request::select(Table::Flights).columns("id").limit(1);
        self.run::<Vec<Value>>("checking connection", request).await?;
        info!("database connected");
        Ok(())
    }
}
