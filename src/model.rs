use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::query::FlightSearch;

pub const SELECTED_FLIGHT_KEY: &str = "selectedFlight";
pub const FLIGHT_BOOKING_DATA_KEY: &str = "flightBookingData";

/// A row as the database hands it back: the generated id and timestamps
/// around the fields the caller supplied on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    Scheduled,
    Delayed,
    Cancelled,
    Completed,
}

impl FlightStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Delayed => "delayed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FareClass {
    Economy,
    Business,
    First,
}

impl FareClass {
    pub fn from_str_loose(s: &str) -> Result<Self, StoreError> {
        match s {
            "economy" => Ok(Self::Economy),
            "business" => Ok(Self::Business),
            "first" => Ok(Self::First),
            _ => Err(StoreError::Validation(format!("invalid fare class: {s}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Economy => "economy",
            Self::Business => "business",
            Self::First => "first",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fare {
    pub price: f64,
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarePricing {
    pub economy: Fare,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business: Option<Fare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Fare>,
}

impl FarePricing {
    pub fn fare(&self, class: FareClass) -> Option<&Fare> {
        match class {
            FareClass::Economy => Some(&self.economy),
            FareClass::Business => self.business.as_ref(),
            FareClass::First => self.first.as_ref(),
        }
    }

    pub fn seats_available(&self, class: FareClass, seats: u32) -> bool {
        self.fare(class).is_some_and(|f| f.available >= seats)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub flight_number: String,
    pub airline: String,
    pub aircraft_type: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_city: String,
    pub arrival_city: String,
    pub departure_date: NaiveDate,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub pricing: FarePricing,
    pub status: FlightStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sorts by the fare of `class`, cheapest first, and keeps the first `n`.
/// Flights without that class sort last.
pub fn keep_cheapest(flights: &mut Vec<Flight>, class: FareClass, n: usize) {
    let price = |f: &Flight| f.pricing.fare(class).map_or(f64::MAX, |fare| fare.price);
    flights.sort_by(|a, b| price(a).total_cmp(&price(b)));
    flights.truncate(n);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingType {
    Flight,
    Tour,
    Hotel,
    CarRental,
}

impl BookingType {
    pub fn from_str_loose(s: &str) -> Result<Self, StoreError> {
        match s {
            "flight" => Ok(Self::Flight),
            "tour" => Ok(Self::Tour),
            "hotel" => Ok(Self::Hotel),
            "car_rental" | "car-rental" => Ok(Self::CarRental),
            _ => Err(StoreError::Validation(format!("invalid booking type: {s}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flight => "flight",
            Self::Tour => "tour",
            Self::Hotel => "hotel",
            Self::CarRental => "car_rental",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn from_str_loose(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending_payment" | "pending-payment" => Ok(Self::PendingPayment),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            _ => Err(StoreError::Validation(format!("invalid booking status: {s}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub booking_type: BookingType,
    pub service_id: String,
    pub contact_info: ContactInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_class: Option<FareClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_adults: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_children: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_infants: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// `BK` + `YYMMDD` + six random hex digits, e.g. `BK250815A1B2C3`.
pub fn booking_number(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("BK{}{}", now.format("%y%m%d"), suffix[..6].to_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

impl PassengerType {
    pub fn from_str_loose(s: &str) -> Result<Self, StoreError> {
        match s {
            "adult" => Ok(Self::Adult),
            "child" => Ok(Self::Child),
            "infant" => Ok(Self::Infant),
            _ => Err(StoreError::Validation(format!("invalid passenger type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub booking_id: String,
    #[serde(rename = "type")]
    pub passenger_type: PassengerType,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub nationality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_expiry: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    Vnpay,
    Zalopay,
    Momo,
    Onepay,
}

impl PaymentGateway {
    pub fn from_str_loose(s: &str) -> Result<Self, StoreError> {
        match s {
            "vnpay" => Ok(Self::Vnpay),
            "zalopay" => Ok(Self::Zalopay),
            "momo" => Ok(Self::Momo),
            "onepay" => Ok(Self::Onepay),
            _ => Err(StoreError::Validation(format!("invalid payment gateway: {s}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vnpay => "vnpay",
            Self::Zalopay => "zalopay",
            Self::Momo => "momo",
            Self::Onepay => "onepay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Processing,
}

impl PaymentStatus {
    pub fn from_str_loose(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "processing" => Ok(Self::Processing),
            _ => Err(StoreError::Validation(format!("invalid payment status: {s}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Processing => "processing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub booking_id: String,
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub gateway: PaymentGateway,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub duration_days: u32,
    pub duration_nights: u32,
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_location: Option<Value>,
    pub price_adult: f64,
    pub price_child: f64,
    pub price_infant: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_adult: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_child: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_infant: Option<f64>,
    #[serde(default)]
    pub inclusions: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    pub category: String,
    pub difficulty: String,
    pub max_group_size: u32,
    pub rating: f64,
    pub total_reviews: u32,
    pub is_featured: bool,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourItinerary {
    pub id: String,
    pub tour_id: String,
    pub day_number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub meals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourDetail {
    #[serde(flatten)]
    pub tour: Tour,
    #[serde(default)]
    pub tour_itinerary: Vec<TourItinerary>,
}

// Session-storage payloads written by the booking pages (camelCase JSON).

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSummary {
    pub id: String,
    pub flight_number: String,
    pub airline: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub departure_date: DateTime<Utc>,
    pub arrival_date: DateTime<Utc>,
    pub pricing: FarePricing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedFlight {
    pub flight: FlightSummary,
    pub search_criteria: FlightSearch,
    pub selected_class: FareClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPassenger {
    #[serde(rename = "type")]
    pub passenger_type: PassengerType,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub nationality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_expiry: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftContact {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightBookingDraft {
    pub flight: FlightSummary,
    pub passengers: Vec<DraftPassenger>,
    pub contact_info: DraftContact,
    pub selected_class: FareClass,
    pub total_price: f64,
}

impl FlightBookingDraft {
    pub fn to_booking(&self, booking_number: String) -> Booking {
        let count = |t: PassengerType| {
            self.passengers
                .iter()
                .filter(|p| p.passenger_type == t)
                .count() as u32
        };
        let mut details = serde_json::json!({
            "flight_number": self.flight.flight_number,
            "airline": self.flight.airline,
            "route": format!("{}-{}", self.flight.departure_airport, self.flight.arrival_airport),
            "departure": self.flight.departure_date,
            "passengers": {
                "adults": count(PassengerType::Adult),
                "children": count(PassengerType::Child),
                "infants": count(PassengerType::Infant),
            },
        });
        if let Some(ref address) = self.contact_info.address {
            details["address"] = Value::String(address.clone());
        }

        Booking {
            booking_number,
            user_id: None,
            booking_type: BookingType::Flight,
            service_id: self.flight.id.clone(),
            contact_info: ContactInfo {
                name: self.contact_info.name.clone(),
                email: self.contact_info.email.clone(),
                phone: self.contact_info.phone.clone(),
            },
            selected_class: Some(self.selected_class),
            number_of_adults: None,
            number_of_children: None,
            number_of_infants: None,
            start_date: None,
            total_amount: self.total_price,
            special_requests: None,
            status: BookingStatus::PendingPayment,
            details: Some(details),
        }
    }

    pub fn passengers_for(&self, booking_id: &str) -> Vec<Passenger> {
        self.passengers
            .iter()
            .map(|p| Passenger {
                booking_id: booking_id.to_string(),
                passenger_type: p.passenger_type,
                title: p.title.clone(),
                first_name: p.first_name.clone(),
                last_name: p.last_name.clone(),
                date_of_birth: p.date_of_birth,
                nationality: p.nationality.clone(),
                passport_number: p.passport_number.clone(),
                passport_expiry: p.passport_expiry,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn priced_flight(id: &str, economy: f64, business: Option<f64>) -> Flight {
        let mut pricing = json!({"economy": {"price": economy, "available": 9}});
        if let Some(price) = business {
            pricing["business"] = json!({"price": price, "available": 2});
        }
        serde_json::from_value(json!({
            "id": id,
            "flight_number": "VN1",
            "airline": "Vietnam Airlines",
            "aircraft_type": "A321",
            "departure_airport": "SGN",
            "arrival_airport": "HAN",
            "departure_city": "Ho Chi Minh City",
            "arrival_city": "Hanoi",
            "departure_date": "2025-08-15",
            "departure_time": "06:00",
            "arrival_time": "08:10",
            "duration": "2h 10m",
            "pricing": pricing,
            "status": "scheduled"
        }))
        .unwrap()
    }

    #[test]
    fn keep_cheapest_sorts_by_class_fare() {
        let mut flights = vec![
            priced_flight("a", 900.0, None),
            priced_flight("b", 1200.0, Some(3000.0)),
            priced_flight("c", 1000.0, Some(2500.0)),
        ];
        keep_cheapest(&mut flights, FareClass::Business, 2);
        let ids: Vec<&str> = flights.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["c", "b"]);

        keep_cheapest(&mut flights, FareClass::Economy, 1);
        assert_eq!(flights[0].id, "c");
    }

    #[test]
    fn booking_number_shape() {
        let now = DateTime::parse_from_rfc3339("2025-08-15T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let number = booking_number(now);
        assert!(number.starts_with("BK250815"));
        assert_eq!(number.len(), 14);
        assert!(number[8..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn stored_booking_splits_generated_fields() {
        let row = json!({
            "id": "b-1",
            "booking_number": "BK250815000001",
            "booking_type": "flight",
            "service_id": "1",
            "contact_info": {"name": "Nguyen Van A", "email": "a@example.com", "phone": "0901234567"},
            "selected_class": "economy",
            "total_amount": 2500000,
            "status": "pending_payment",
            "details": null,
            "user_id": null,
            "created_at": "2025-08-01T10:00:00.123456+00:00"
        });
        let stored: Stored<Booking> = serde_json::from_value(row).unwrap();
        assert_eq!(stored.id, "b-1");
        assert_eq!(stored.record.total_amount, 2_500_000.0);
        assert_eq!(stored.record.selected_class, Some(FareClass::Economy));
        assert!(stored.record.details.is_none());
        assert!(stored.created_at.is_some());
        assert!(stored.updated_at.is_none());
    }

    #[test]
    fn pricing_optional_classes() {
        let pricing: FarePricing =
            serde_json::from_value(json!({"economy": {"price": 2500000, "available": 50}})).unwrap();
        assert!(pricing.seats_available(FareClass::Economy, 50));
        assert!(!pricing.seats_available(FareClass::Economy, 51));
        assert!(!pricing.seats_available(FareClass::Business, 1));
    }

    #[test]
    fn passenger_type_uses_type_key() {
        let value = serde_json::to_value(Passenger {
            booking_id: "b-1".into(),
            passenger_type: PassengerType::Infant,
            title: "Miss".into(),
            first_name: "Lan".into(),
            last_name: "Tran".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            nationality: "VN".into(),
            passport_number: None,
            passport_expiry: None,
        })
        .unwrap();
        assert_eq!(value["type"], "infant");
        assert!(value.get("passport_number").is_none());
    }

    #[test]
    fn draft_becomes_pending_flight_booking() {
        let draft: FlightBookingDraft = serde_json::from_value(json!({
            "flight": {
                "id": "1",
                "flightNumber": "VN123",
                "airline": "Vietnam Airlines",
                "departureAirport": "SGN",
                "arrivalAirport": "HAN",
                "departureDate": "2025-08-15T06:00:00Z",
                "arrivalDate": "2025-08-15T08:15:00Z",
                "pricing": {"economy": {"price": 2500000, "available": 50}}
            },
            "passengers": [{
                "type": "adult",
                "title": "Mr",
                "firstName": "Nguyen",
                "lastName": "Van A",
                "dateOfBirth": "1990-01-01",
                "nationality": "VN"
            }],
            "contactInfo": {
                "name": "Nguyen Van A",
                "email": "test@example.com",
                "phone": "0901234567",
                "address": "TP HCM"
            },
            "selectedClass": "economy",
            "totalPrice": 2500000
        }))
        .unwrap();

        let booking = draft.to_booking("BK250815ABCDEF".into());
        assert_eq!(booking.booking_type, BookingType::Flight);
        assert_eq!(booking.service_id, "1");
        assert_eq!(booking.status, BookingStatus::PendingPayment);
        assert_eq!(booking.total_amount, 2_500_000.0);
        let details = booking.details.unwrap();
        assert_eq!(details["route"], "SGN-HAN");
        assert_eq!(details["passengers"]["adults"], 1);
        assert_eq!(details["address"], "TP HCM");

        let passengers = draft.passengers_for("b-9");
        assert_eq!(passengers.len(), 1);
        assert_eq!(passengers[0].booking_id, "b-9");
        assert_eq!(passengers[0].last_name, "Van A");
    }
}
