use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::model::{Booking, FareClass, Flight, Payment, Stored, Tour, TourDetail};

fn group_thousands(n: u64, sep: char) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(c);
    }
    out
}

fn with_cents(amount: f64, sep: char) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    format!("{}.{:02}", group_thousands(cents / 100, sep), cents % 100)
}

pub fn format_price(amount: f64, currency: &str) -> String {
    if !amount.is_finite() {
        return "—".to_string();
    }
    let whole = amount.round().abs() as u64;
    let sign = if amount < 0.0 { "-" } else { "" };
    match currency {
        "VND" => format!("{sign}{}₫", group_thousands(whole, '.')),
        "USD" => format!("{sign}${}", with_cents(amount, ',')),
        "EUR" => format!("{sign}€{}", with_cents(amount, ',')),
        "GBP" => format!("{sign}£{}", with_cents(amount, ',')),
        "JPY" | "CNY" => format!("{sign}¥{}", group_thousands(whole, ',')),
        "KRW" => format!("{sign}₩{}", group_thousands(whole, ',')),
        "THB" => format!("{sign}฿{}", group_thousands(whole, ',')),
        _ => format!("{sign}{} {currency}", group_thousands(whole, ',')),
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn fare_cell(flight: &Flight, class: FareClass, currency: &str) -> String {
    match flight.pricing.fare(class) {
        Some(fare) => format!("{} ({} left)", format_price(fare.price, currency), fare.available),
        None => "—".to_string(),
    }
}

pub fn render_flights(flights: &[Flight], currency: &str) -> String {
    let mut table = new_table(vec![
        "Flight", "Airline", "Route", "Date", "Depart", "Arrive", "Duration", "Economy",
        "Business", "First", "Status",
    ]);

    for f in flights {
        table.add_row(vec![
            f.flight_number.clone(),
            f.airline.clone(),
            format!(
                "{} ({}) → {} ({})",
                f.departure_airport, f.departure_city, f.arrival_airport, f.arrival_city
            ),
            f.departure_date.to_string(),
            f.departure_time.clone(),
            f.arrival_time.clone(),
            f.duration.clone(),
            fare_cell(f, FareClass::Economy, currency),
            fare_cell(f, FareClass::Business, currency),
            fare_cell(f, FareClass::First, currency),
            f.status.as_str().to_string(),
        ]);
    }

    table.to_string()
}

pub fn compact_flight(f: &Flight, class: FareClass, currency: &str) -> String {
    let price = f
        .pricing
        .fare(class)
        .map(|fare| format_price(fare.price, currency))
        .unwrap_or_else(|| "—".to_string());
    format!(
        "{price} | {} | {}>{} | {} {}>{} | {} | {}",
        f.flight_number,
        f.departure_airport,
        f.arrival_airport,
        f.departure_date,
        f.departure_time,
        f.arrival_time,
        f.airline,
        f.id
    )
}

pub fn render_tours(tours: &[Tour]) -> String {
    let mut table = new_table(vec![
        "Tour", "Category", "Difficulty", "Duration", "Destinations", "Adult", "Rating", "Id",
    ]);

    for t in tours {
        let title = if t.is_featured {
            format!("★ {}", t.title)
        } else {
            t.title.clone()
        };
        table.add_row(vec![
            title,
            t.category.clone(),
            t.difficulty.clone(),
            format!("{}D{}N", t.duration_days, t.duration_nights),
            t.destinations.join(", "),
            format_price(t.price_adult, &t.currency),
            format!("{:.1} ({})", t.rating, t.total_reviews),
            t.id.clone(),
        ]);
    }

    table.to_string()
}

pub fn compact_tour(t: &Tour) -> String {
    format!(
        "{} | {} | {}D{}N | {} | {:.1} | {}",
        format_price(t.price_adult, &t.currency),
        t.title,
        t.duration_days,
        t.duration_nights,
        t.destinations.join(","),
        t.rating,
        t.id
    )
}

pub fn render_tour_detail(detail: &TourDetail) -> String {
    let t = &detail.tour;
    let mut out = format!(
        "{}\n{}\n\n{} · {} · {}D{}N · max {} people\nAdult {} · Child {} · Infant {}\n",
        t.title,
        t.short_description,
        t.category,
        t.difficulty,
        t.duration_days,
        t.duration_nights,
        t.max_group_size,
        format_price(t.price_adult, &t.currency),
        format_price(t.price_child, &t.currency),
        format_price(t.price_infant, &t.currency),
    );
    if !t.inclusions.is_empty() {
        out.push_str(&format!("Includes: {}\n", t.inclusions.join(", ")));
    }
    if !t.exclusions.is_empty() {
        out.push_str(&format!("Excludes: {}\n", t.exclusions.join(", ")));
    }

    if detail.tour_itinerary.is_empty() {
        return out;
    }

    let mut table = new_table(vec!["Day", "Title", "Activities", "Meals", "Stay"]);
    for day in &detail.tour_itinerary {
        table.add_row(vec![
            day.day_number.to_string(),
            day.title.clone(),
            day.activities.join("\n"),
            day.meals.join(", "),
            day.accommodation.clone().unwrap_or_else(|| "—".to_string()),
        ]);
    }
    out.push('\n');
    out.push_str(&table.to_string());
    out
}

pub fn render_bookings(bookings: &[Stored<Booking>], currency: &str) -> String {
    let mut table = new_table(vec![
        "Number", "Type", "Service", "Contact", "Class", "Total", "Status", "Id",
    ]);

    for b in bookings {
        let r = &b.record;
        table.add_row(vec![
            r.booking_number.clone(),
            r.booking_type.as_str().to_string(),
            r.service_id.clone(),
            format!("{}\n{}", r.contact_info.name, r.contact_info.email),
            r.selected_class
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "—".to_string()),
            format_price(r.total_amount, currency),
            r.status.as_str().to_string(),
            b.id.clone(),
        ]);
    }

    table.to_string()
}

pub fn render_payment(payment: &Stored<Payment>) -> String {
    let p = &payment.record;
    let mut table = new_table(vec!["Field", "Value"]);
    let paid_at = p
        .paid_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "—".to_string());
    let rows = [
        ("Transaction", p.transaction_id.clone()),
        ("Booking", p.booking_id.clone()),
        ("Amount", format_price(p.amount, &p.currency)),
        ("Gateway", p.gateway.as_str().to_string()),
        ("Status", p.status.as_str().to_string()),
        ("Paid at", paid_at),
        ("Payment URL", p.payment_url.clone().unwrap_or_else(|| "—".to_string())),
    ];
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value]);
    }
    table.to_string()
}
