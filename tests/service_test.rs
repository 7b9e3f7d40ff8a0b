use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use tripstore::config::Table;
use tripstore::error::StoreError;
use tripstore::model::{
    Booking, BookingStatus, BookingType, ContactInfo, FareClass, FlightBookingDraft, Passenger,
    PassengerType, Payment, PaymentGateway, PaymentStatus,
};
use tripstore::query::FlightSearch;
use tripstore::{MemoryBackend, TourFilter, TourSearch, TripStore};

fn flight(id: &str, time: &str, economy_seats: u32, status: &str) -> Value {
    json!({
        "id": id,
        "flight_number": format!("VN{id}"),
        "airline": "Vietnam Airlines",
        "aircraft_type": "A321",
        "departure_airport": "SGN",
        "arrival_airport": "HAN",
        "departure_city": "Ho Chi Minh City",
        "arrival_city": "Hanoi",
        "departure_date": "2025-08-15",
        "departure_time": time,
        "arrival_time": "23:59",
        "duration": "2h 10m",
        "pricing": {
            "economy": {"price": 1_500_000.0, "available": economy_seats},
            "business": {"price": 4_000_000.0, "available": 1}
        },
        "status": status
    })
}

fn tour(id: &str, created: &str, rating: f64, price: f64, days: u32, active: bool) -> Value {
    let destinations = if id == "halong" {
        vec!["Hanoi", "Ha Long"]
    } else {
        vec!["Hue"]
    };
    let category = if days > 2 { "adventure" } else { "city" };
    json!({
        "id": id,
        "title": format!("Tour {id}"),
        "slug": format!("tour-{id}"),
        "duration_days": days,
        "duration_nights": days.saturating_sub(1),
        "destinations": destinations,
        "price_adult": price,
        "price_child": price / 2.0,
        "price_infant": 0.0,
        "currency": "VND",
        "category": category,
        "difficulty": "easy",
        "max_group_size": 20,
        "rating": rating,
        "total_reviews": 10,
        "is_featured": id == "halong",
        "is_active": active,
        "created_at": created
    })
}

fn contact() -> ContactInfo {
    ContactInfo {
        name: "Nguyen Van A".into(),
        email: "a@example.com".into(),
        phone: "0901234567".into(),
    }
}

fn booking(booking_type: BookingType, user: Option<&str>) -> Booking {
    Booking {
        booking_number: "BK250815ABC123".into(),
        user_id: user.map(str::to_string),
        booking_type,
        service_id: "f1".into(),
        contact_info: contact(),
        selected_class: Some(FareClass::Economy),
        number_of_adults: None,
        number_of_children: None,
        number_of_infants: None,
        start_date: None,
        total_amount: 3_000_000.0,
        special_requests: None,
        status: BookingStatus::PendingPayment,
        details: None,
    }
}

fn passenger(booking_id: &str, first: &str) -> Passenger {
    Passenger {
        booking_id: booking_id.into(),
        passenger_type: PassengerType::Adult,
        title: "Mr".into(),
        first_name: first.into(),
        last_name: "Nguyen".into(),
        date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        nationality: "VN".into(),
        passport_number: None,
        passport_expiry: None,
    }
}

fn payment(booking_id: &str, txn: &str) -> Payment {
    Payment {
        booking_id: booking_id.into(),
        transaction_id: txn.into(),
        amount: 3_000_000.0,
        currency: "VND".into(),
        gateway: PaymentGateway::Vnpay,
        payment_url: Some("https://sandbox.vnpayment.vn/pay?txn=1".into()),
        status: PaymentStatus::Pending,
        paid_at: None,
    }
}

fn flight_store() -> TripStore<MemoryBackend> {
    let backend = MemoryBackend::new();
    backend
        .seed(
            Table::Flights,
            vec![
                flight("3", "18:00", 9, "scheduled"),
                flight("1", "06:00", 2, "scheduled"),
                flight("2", "09:30", 0, "scheduled"),
                flight("4", "12:00", 9, "cancelled"),
            ],
        )
        .unwrap();
    TripStore::new(backend)
}

fn tour_store() -> TripStore<MemoryBackend> {
    let backend = MemoryBackend::new();
    backend
        .seed(
            Table::Tours,
            vec![
                tour("halong", "2025-01-03T00:00:00Z", 4.8, 3_500_000.0, 3, true),
                tour("hue", "2025-01-02T00:00:00Z", 4.2, 1_200_000.0, 1, true),
                tour("old", "2025-01-04T00:00:00Z", 5.0, 900_000.0, 3, false),
            ],
        )
        .unwrap();
    backend
        .seed(
            Table::TourItinerary,
            vec![
                json!({"tour_id": "halong", "day_number": 3, "title": "Return"}),
                json!({"tour_id": "halong", "day_number": 1, "title": "Hanoi"}),
                json!({"tour_id": "halong", "day_number": 2, "title": "Bay cruise"}),
                json!({"tour_id": "hue", "day_number": 1, "title": "Citadel"}),
            ],
        )
        .unwrap();
    TripStore::new(backend)
}

#[tokio::test]
async fn search_returns_bookable_scheduled_flights_by_departure() {
    let store = flight_store();
    let mut search = FlightSearch::new("SGN", "HAN", "2025-08-15");
    search.adults = 2;
    search.infants = 2;

    let flights = store.search_flights(&search).await.unwrap();
    let ids: Vec<&str> = flights.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["1", "3"]);
}

#[tokio::test]
async fn search_respects_class_availability() {
    let store = flight_store();
    let mut search = FlightSearch::new("SGN", "HAN", "2025-08-15");
    search.fare_class = FareClass::Business;
    search.adults = 2;
    assert!(store.search_flights(&search).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_rejects_invalid_criteria() {
    let store = flight_store();
    let search = FlightSearch::new("SGN", "HAN", "2025-13-01");
    let err = store.search_flights(&search).await.unwrap_err();
    assert!(matches!(err.root(), StoreError::InvalidDate(_)));
    assert!(err.to_string().starts_with("error searching flights"));
}

#[tokio::test]
async fn missing_flight_is_not_found() {
    let store = flight_store();
    assert_eq!(store.get_flight_by_id("1").await.unwrap().departure_time, "06:00");

    let err = store.get_flight_by_id("nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().starts_with("error getting flight"));
}

#[tokio::test]
async fn created_booking_gets_id_and_timestamps() {
    let store = TripStore::new(MemoryBackend::new());
    let stored = store
        .create_booking(&booking(BookingType::Flight, Some("u1")))
        .await
        .unwrap();
    assert!(!stored.id.is_empty());
    assert!(stored.created_at.is_some());
    assert!(stored.updated_at.is_some());
    assert_eq!(stored.record.status, BookingStatus::PendingPayment);
}

#[tokio::test]
async fn bookings_filter_by_type_and_user() {
    let store = TripStore::new(MemoryBackend::new());
    store.create_booking(&booking(BookingType::Flight, Some("u1"))).await.unwrap();
    store.create_booking(&booking(BookingType::Flight, Some("u2"))).await.unwrap();
    store.create_booking(&booking(BookingType::Tour, Some("u1"))).await.unwrap();

    let all = store.get_bookings_by_type(BookingType::Flight, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let mine = store
        .get_bookings_by_type(BookingType::Flight, Some("u1"))
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].record.user_id.as_deref(), Some("u1"));

    let none = store.get_bookings_by_type(BookingType::Hotel, None).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn booking_status_update() {
    let store = TripStore::new(MemoryBackend::new());
    let stored = store.create_booking(&booking(BookingType::Flight, None)).await.unwrap();

    let updated = store
        .update_booking_status(&stored.id, BookingStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(updated.id, stored.id);
    assert_eq!(updated.record.status, BookingStatus::Cancelled);

    let err = store
        .update_booking_status("missing", BookingStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn empty_passenger_batch_is_a_no_op() {
    let backend = MemoryBackend::new();
    let store = TripStore::new(backend.clone());
    assert!(store.create_passengers(&[]).await.unwrap().is_empty());
    assert!(backend.rows(Table::Passengers).unwrap().is_empty());
}

#[tokio::test]
async fn passenger_batch_must_share_one_booking() {
    let backend = MemoryBackend::new();
    let store = TripStore::new(backend.clone());
    let err = store
        .create_passengers(&[passenger("b1", "An"), passenger("b2", "Binh")])
        .await
        .unwrap_err();
    assert!(matches!(err.root(), StoreError::Validation(_)));
    assert!(backend.rows(Table::Passengers).unwrap().is_empty());
}

#[tokio::test]
async fn passengers_are_inserted_together() {
    let store = TripStore::new(MemoryBackend::new());
    let stored = store
        .create_passengers(&[passenger("b1", "An"), passenger("b1", "Binh")])
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_ne!(stored[0].id, stored[1].id);
    assert_eq!(stored[1].record.first_name, "Binh");
    assert!(stored[0].updated_at.is_none());
}

#[tokio::test]
async fn payment_lifecycle() {
    let store = TripStore::new(MemoryBackend::new());
    let created = store.create_payment(&payment("b1", "VNP001")).await.unwrap();
    assert_eq!(created.record.status, PaymentStatus::Pending);
    assert!(created.record.paid_at.is_none());

    let processing = store
        .update_payment_status("VNP001", PaymentStatus::Processing, None)
        .await
        .unwrap();
    assert_eq!(processing.record.status, PaymentStatus::Processing);
    assert!(processing.record.paid_at.is_none());

    let paid_at = Utc.with_ymd_and_hms(2025, 8, 15, 6, 0, 0).unwrap();
    let completed = store
        .update_payment_status("VNP001", PaymentStatus::Completed, Some(paid_at))
        .await
        .unwrap();
    assert_eq!(completed.record.paid_at, Some(paid_at));
    assert!(completed.updated_at >= created.updated_at);

    let fetched = store.get_payment_by_transaction_id("VNP001").await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.record.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let store = TripStore::new(MemoryBackend::new());
    let err = store.get_payment_by_transaction_id("nope").await.unwrap_err();
    assert!(err.is_not_found());

    let err = store
        .update_payment_status("nope", PaymentStatus::Failed, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().starts_with("error updating payment status"));
}

#[tokio::test]
async fn tours_list_active_newest_first() {
    let store = tour_store();
    let tours = store.get_tours(&TourFilter::default()).await.unwrap();
    let ids: Vec<&str> = tours.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["halong", "hue"]);
}

#[tokio::test]
async fn tours_filters_and_paging() {
    let store = tour_store();

    let featured = store
        .get_tours(&TourFilter { featured: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].id, "halong");

    let city = store
        .get_tours(&TourFilter { category: Some("city".into()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(city.len(), 1);
    assert_eq!(city[0].id, "hue");

    let second_page = store
        .get_tours(&TourFilter { offset: Some(1), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, "hue");

    let first = store
        .get_tours(&TourFilter { limit: Some(1), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(first.len(), 1);

    let zero = store
        .get_tours(&TourFilter { limit: Some(0), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(zero.len(), 2);
}

#[tokio::test]
async fn tour_detail_orders_itinerary_by_day() {
    let store = tour_store();
    let detail = store.get_tour_by_id("halong").await.unwrap();
    assert_eq!(detail.tour.title, "Tour halong");
    let days: Vec<u32> = detail.tour_itinerary.iter().map(|d| d.day_number).collect();
    assert_eq!(days, [1, 2, 3]);
    assert!(detail.tour_itinerary.iter().all(|d| d.tour_id == "halong"));
}

#[tokio::test]
async fn inactive_tour_is_not_found() {
    let store = tour_store();
    assert!(store.get_tour_by_id("old").await.unwrap_err().is_not_found());
    assert!(store.get_tour_by_id("nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn tour_search_criteria() {
    let store = tour_store();

    let all = store.search_tours(&TourSearch::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["halong", "hue"]);

    let ha_long = store
        .search_tours(&TourSearch { destination: Some("Ha Long".into()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(ha_long.len(), 1);
    assert_eq!(ha_long[0].id, "halong");

    let cheap = store
        .search_tours(&TourSearch {
            min_price: Some(1_000_000.0),
            max_price: Some(2_000_000.0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(cheap.len(), 1);
    assert_eq!(cheap[0].id, "hue");

    let three_days = store
        .search_tours(&TourSearch { duration: Some(3), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(three_days.len(), 1);
    assert_eq!(three_days[0].id, "halong");

    let zeros_ignored = store
        .search_tours(&TourSearch {
            min_price: Some(0.0),
            max_price: Some(0.0),
            duration: Some(0),
            limit: Some(0),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(zeros_ignored.len(), 2);
}

#[tokio::test]
async fn ping_succeeds_on_empty_store() {
    let store = TripStore::new(MemoryBackend::new());
    store.ping().await.unwrap();
}

#[tokio::test]
async fn booking_draft_to_confirmed_booking() {
    let draft: FlightBookingDraft = serde_json::from_value(json!({
        "flight": {
            "id": "1",
            "flightNumber": "VN1",
            "airline": "Vietnam Airlines",
            "departureAirport": "SGN",
            "arrivalAirport": "HAN",
            "departureDate": "2025-08-15T06:00:00Z",
            "arrivalDate": "2025-08-15T08:10:00Z",
            "pricing": {"economy": {"price": 1500000.0, "available": 2}}
        },
        "passengers": [
            {"type": "adult", "title": "Mr", "firstName": "Van A", "lastName": "Nguyen",
             "dateOfBirth": "1990-01-01", "nationality": "VN"},
            {"type": "infant", "title": "Miss", "firstName": "Thi B", "lastName": "Nguyen",
             "dateOfBirth": "2024-03-02", "nationality": "VN"}
        ],
        "contactInfo": {"name": "Nguyen Van A", "email": "a@example.com", "phone": "0901234567"},
        "selectedClass": "economy",
        "totalPrice": 1650000.0
    }))
    .unwrap();

    let backend = MemoryBackend::new();
    let store = TripStore::new(backend.clone());

    let booking = store
        .create_booking(&draft.to_booking("BK250815000001".into()))
        .await
        .unwrap();
    assert_eq!(booking.record.service_id, "1");
    assert_eq!(booking.record.booking_type, BookingType::Flight);
    assert_eq!(booking.record.total_amount, 1_650_000.0);

    let passengers = store
        .create_passengers(&draft.passengers_for(&booking.id))
        .await
        .unwrap();
    assert_eq!(passengers.len(), 2);
    assert!(passengers.iter().all(|p| p.record.booking_id == booking.id));

    store.create_payment(&payment(&booking.id, "VNP777")).await.unwrap();
    store
        .update_payment_status("VNP777", PaymentStatus::Completed, Some(Utc::now()))
        .await
        .unwrap();

    // Completing the payment leaves the booking for the caller to advance.
    let pending = store
        .get_bookings_by_type(BookingType::Flight, None)
        .await
        .unwrap();
    assert_eq!(pending[0].record.status, BookingStatus::PendingPayment);

    let confirmed = store
        .update_booking_status(&booking.id, BookingStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.record.status, BookingStatus::Confirmed);
    assert_eq!(backend.rows(Table::Passengers).unwrap().len(), 2);
}

#[tokio::test]
async fn created_booking_echoes_input() {
    let store = TripStore::new(MemoryBackend::new());
    let mut input = booking(BookingType::Tour, None);
    input.number_of_adults = Some(2);
    input.start_date = chrono::NaiveDate::from_ymd_opt(2025, 10, 1);
    input.details = Some(json!({"pickup": "hotel"}));

    let stored = store.create_booking(&input).await.unwrap();
    assert_eq!(stored.record, input);
}

#[tokio::test]
async fn repeated_status_update_is_idempotent() {
    let store = TripStore::new(MemoryBackend::new());
    let stored = store.create_booking(&booking(BookingType::Flight, None)).await.unwrap();

    let first = store
        .update_booking_status(&stored.id, BookingStatus::Confirmed)
        .await
        .unwrap();
    let second = store
        .update_booking_status(&stored.id, BookingStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn tour_pages_follow_newest_first_order() {
    let backend = MemoryBackend::new();
    let rows = (1..=5)
        .map(|day| {
            tour(
                &format!("t{day}"),
                &format!("2025-01-0{day}T00:00:00Z"),
                4.0,
                1_000_000.0,
                2,
                true,
            )
        })
        .collect();
    backend.seed(Table::Tours, rows).unwrap();
    let store = TripStore::new(backend);

    let page = store
        .get_tours(&TourFilter { limit: Some(2), offset: Some(1), ..Default::default() })
        .await
        .unwrap();
    let ids: Vec<&str> = page.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["t4", "t3"]);
}

#[tokio::test]
async fn completed_payment_leaves_booking_pending() {
    let store = TripStore::new(MemoryBackend::new());
    let mut input = booking(BookingType::Flight, None);
    input.total_amount = 2_500_000.0;
    let stored = store.create_booking(&input).await.unwrap();

    store
        .create_passengers(&[passenger(&stored.id, "An")])
        .await
        .unwrap();
    let mut pay = payment(&stored.id, "VNP20250815001");
    pay.amount = 2_500_000.0;
    store.create_payment(&pay).await.unwrap();

    let paid_at = Utc.with_ymd_and_hms(2025, 8, 15, 7, 30, 0).unwrap();
    let completed = store
        .update_payment_status("VNP20250815001", PaymentStatus::Completed, Some(paid_at))
        .await
        .unwrap();
    assert_eq!(completed.record.status, PaymentStatus::Completed);
    assert_eq!(completed.record.paid_at, Some(paid_at));

    let bookings = store.get_bookings_by_type(BookingType::Flight, None).await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].record.status, BookingStatus::PendingPayment);
}

#[tokio::test]
async fn tour_price_bounds_are_inclusive() {
    let store = tour_store();
    let tours = store
        .search_tours(&TourSearch {
            min_price: Some(1_200_000.0),
            max_price: Some(3_500_000.0),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<&str> = tours.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["halong", "hue"]);

    let at_max = store
        .search_tours(&TourSearch { max_price: Some(1_200_000.0), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(at_max.len(), 1);
    assert_eq!(at_max[0].id, "hue");
}

#[tokio::test]
async fn far_offset_returns_empty_page() {
    let store = tour_store();
    for limit in [None, Some(5)] {
        let tours = store
            .get_tours(&TourFilter { offset: Some(usize::MAX), limit, ..Default::default() })
            .await
            .unwrap();
        assert!(tours.is_empty());
    }
}
