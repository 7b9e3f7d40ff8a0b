use std::process;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tripstore::config::StoreConfig;
use tripstore::error::StoreError;
use tripstore::model::{
    self, Booking, BookingStatus, BookingType, ContactInfo, FareClass,
    FlightBookingDraft, Passenger, PassengerType, Payment, PaymentGateway, PaymentStatus,
};
use tripstore::query::{FlightSearch, TripType};
use tripstore::{table, RestBackend, TourFilter, TourSearch, TripStore};

#[derive(Parser)]
#[command(
    name = "tripstore",
    about = "Flight, tour, booking and payment records from the terminal",
    version,
    after_help = "\
Examples:
  tripstore ping
  tripstore flights search -f SGN -t HAN -d 2025-08-15 --adults 2
  tripstore flights search -f SGN -t HAN -d 2025-08-15 --url
  tripstore tours search --destination \"Ha Long\" --min-price 1000000 --max-price 5000000
  tripstore bookings create --from-draft flightBookingData.json --json
  tripstore payments status VNP20250815001 completed --paid-now

Configuration:
  SUPABASE_URL and SUPABASE_SERVICE_KEY must be set (or passed with --db-url / --service-key)."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GlobalArgs {
    #[arg(long, global = true, help = "Output as JSON")]
    json: bool,

    #[arg(long, global = true, help = "Output as pretty-printed JSON")]
    pretty: bool,

    #[arg(long, global = true, help = "One line per record (recommended for scripts and AI agents)")]
    compact: bool,

    #[arg(short, long, global = true, help = "Log requests to stderr")]
    verbose: bool,

    #[arg(
        long,
        global = true,
        default_value = "VND",
        value_name = "CODE",
        help = "Currency used to display prices without their own currency"
    )]
    currency: String,

    #[arg(
        long = "db-url",
        global = true,
        env = "SUPABASE_URL",
        value_name = "URL",
        help = "Database API base URL"
    )]
    db_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "SUPABASE_SERVICE_KEY",
        hide_env_values = true,
        value_name = "KEY",
        help = "Database service key"
    )]
    service_key: Option<String>,

    #[arg(
        long,
        global = true,
        env = "TRIPSTORE_PROXY",
        value_name = "URL",
        help = "HTTP or SOCKS5 proxy"
    )]
    proxy: Option<String>,

    #[arg(
        long,
        global = true,
        env = "TRIPSTORE_TIMEOUT",
        default_value = "30",
        value_name = "SECS",
        help = "Request timeout"
    )]
    timeout: u64,
}

#[derive(clap::Subcommand)]
enum Commands {
    #[command(about = "Check that the database API is reachable")]
    Ping,
    #[command(subcommand, about = "Look up and search flights")]
    Flights(FlightCommands),
    #[command(subcommand, about = "Create, update and list bookings")]
    Bookings(BookingCommands),
    #[command(subcommand, about = "Record a booking's passengers")]
    Passengers(PassengerCommands),
    #[command(subcommand, about = "Create, update and look up payments")]
    Payments(PaymentCommands),
    #[command(subcommand, about = "Browse the tour catalog")]
    Tours(TourCommands),
    #[command(about = "Start MCP server for AI agents (stdio transport)")]
    Mcp(McpArgs),
}

#[derive(clap::Subcommand)]
enum FlightCommands {
    #[command(about = "Show one flight by id")]
    Get {
        #[arg(value_name = "ID")]
        id: String,
    },
    #[command(
        about = "Search scheduled flights",
        long_about = "Search scheduled flights on a route and date with enough seats left \
            in the requested class for all adults and children.\n\
            For AI agents: use --compact --top N for minimal output.",
        after_help = "\
Examples:
  One adult:    tripstore flights search -f SGN -t HAN -d 2025-08-15
  Family:       tripstore flights search -f SGN -t DAD -d 2025-08-15 --adults 2 --children 1 --infants 1
  Business:     tripstore flights search -f HAN -t PQC -d 2025-09-01 --class business
  Site link:    tripstore flights search -f SGN -t HAN -d 2025-08-15 --url"
    )]
    Search(SearchArgs),
}

#[derive(clap::Args)]
struct SearchArgs {
    #[arg(
        short, long,
        value_name = "IATA",
        help = "Departure airport code",
        long_help = "Departure airport IATA code (3 uppercase letters, e.g. SGN, HAN, DAD)."
    )]
    from: Option<String>,

    #[arg(
        short, long,
        value_name = "IATA",
        help = "Arrival airport code",
        long_help = "Arrival airport IATA code (3 uppercase letters, e.g. HAN, PQC, CXR)."
    )]
    to: Option<String>,

    #[arg(
        short, long,
        value_name = "YYYY-MM-DD",
        help = "Departure date",
        long_help = "Departure date in YYYY-MM-DD format."
    )]
    date: Option<String>,

    #[arg(long, default_value = "1", value_name = "N", help = "Number of adult passengers")]
    adults: u32,

    #[arg(long, default_value = "0", value_name = "N", help = "Number of child passengers (2-11)")]
    children: u32,

    #[arg(long, default_value = "0", value_name = "N", help = "Infants on an adult's lap (under 2)")]
    infants: u32,

    #[arg(
        long,
        default_value = "economy",
        value_name = "CLASS",
        help = "Fare class [economy, business, first]"
    )]
    class: String,

    #[arg(
        long,
        default_value = "one-way",
        value_name = "TYPE",
        help = "Trip type [one-way, round-trip]"
    )]
    trip: String,

    #[arg(long, value_name = "N", help = "Show only the N cheapest results")]
    top: Option<usize>,

    #[arg(long, help = "Print the site's search page URL only")]
    url: bool,

    #[arg(long, help = "Open the site's search page in a browser")]
    open: bool,

    #[arg(
        long,
        env = "TRIPSTORE_SITE_URL",
        default_value = tripstore::DEFAULT_SITE_URL,
        value_name = "URL",
        help = "Base URL of the booking site"
    )]
    site: String,
}

#[derive(clap::Subcommand)]
enum BookingCommands {
    #[command(
        about = "Create a booking",
        after_help = "\
Examples:
  From a booking draft:  tripstore bookings create --from-draft flightBookingData.json
  Tour booking:          tripstore bookings create --type tour --service-id T1 --name \"Nguyen Van A\" \\
                           --email a@example.com --phone 0901234567 --adults 2 --start-date 2025-10-01 --total 7000000"
    )]
    Create(CreateBookingArgs),
    #[command(about = "Set a booking's status")]
    Status {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(
            value_name = "STATUS",
            help = "New status [pending_payment, confirmed, cancelled, completed]"
        )]
        status: String,
    },
    #[command(about = "List bookings of one type")]
    List {
        #[arg(
            long = "type",
            default_value = "flight",
            value_name = "TYPE",
            help = "Booking type [flight, tour, hotel, car_rental]"
        )]
        booking_type: String,
        #[arg(long, value_name = "ID", help = "Only bookings of this user")]
        user_id: Option<String>,
    },
}

#[derive(clap::Args)]
struct CreateBookingArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Create booking and passengers from a flightBookingData JSON file",
        conflicts_with_all = ["service_id", "booking_type", "total"]
    )]
    from_draft: Option<String>,

    #[arg(
        long = "type",
        value_name = "TYPE",
        help = "Booking type [flight, tour, hotel, car_rental]"
    )]
    booking_type: Option<String>,

    #[arg(long, value_name = "ID", help = "Id of the booked flight, tour, hotel or car")]
    service_id: Option<String>,

    #[arg(long, value_name = "NAME", help = "Contact name")]
    name: Option<String>,

    #[arg(long, value_name = "EMAIL", help = "Contact email")]
    email: Option<String>,

    #[arg(long, value_name = "PHONE", help = "Contact phone")]
    phone: Option<String>,

    #[arg(long, value_name = "ID", help = "Owning user")]
    user_id: Option<String>,

    #[arg(long, value_name = "CLASS", help = "Fare class for flight bookings")]
    class: Option<String>,

    #[arg(long, value_name = "N", help = "Adults (tour bookings)")]
    adults: Option<u32>,

    #[arg(long, value_name = "N", help = "Children (tour bookings)")]
    children: Option<u32>,

    #[arg(long, value_name = "N", help = "Infants (tour bookings)")]
    infants: Option<u32>,

    #[arg(long, value_name = "YYYY-MM-DD", help = "Start date (tour bookings)")]
    start_date: Option<String>,

    #[arg(long, value_name = "AMOUNT", help = "Total amount")]
    total: Option<f64>,

    #[arg(long, value_name = "TEXT", help = "Special requests")]
    special_requests: Option<String>,

    #[arg(long, value_name = "JSON", help = "Free-form details object")]
    details: Option<String>,

    #[arg(long, value_name = "NUMBER", help = "Booking number (generated when omitted)")]
    number: Option<String>,
}

#[derive(clap::Subcommand)]
enum PassengerCommands {
    #[command(
        about = "Add passengers to a booking",
        after_help = "\
Example:
  tripstore passengers add --booking-id B1 \\
    --passenger \"adult,Mr,Nguyen,Van A,1990-01-01,VN\" \\
    --passenger \"infant,Miss,Nguyen,Thi B,2024-03-02,VN\""
    )]
    Add {
        #[arg(long, value_name = "ID", help = "Booking the passengers belong to")]
        booking_id: String,
        #[arg(
            long,
            value_name = "\"TYPE,TITLE,FIRST,LAST,DOB,NATIONALITY[,PASSPORT,EXPIRY]\"",
            help = "Passenger (repeatable)",
            required = true,
            num_args = 1
        )]
        passenger: Vec<String>,
    },
}

#[derive(clap::Subcommand)]
enum PaymentCommands {
    #[command(about = "Record a payment for a booking")]
    Create {
        #[arg(long, value_name = "ID", help = "Booking being paid")]
        booking_id: String,
        #[arg(long, value_name = "ID", help = "Gateway transaction id")]
        transaction_id: String,
        #[arg(long, value_name = "AMOUNT", help = "Amount charged")]
        amount: f64,
        #[arg(long = "in", default_value = "VND", value_name = "CODE", help = "Payment currency")]
        payment_currency: String,
        #[arg(
            long,
            value_name = "GATEWAY",
            help = "Payment gateway [vnpay, zalopay, momo, onepay]"
        )]
        gateway: String,
        #[arg(long, value_name = "URL", help = "Gateway redirect URL")]
        payment_url: Option<String>,
    },
    #[command(about = "Set a payment's status")]
    Status {
        #[arg(value_name = "TRANSACTION_ID")]
        transaction_id: String,
        #[arg(
            value_name = "STATUS",
            help = "New status [pending, completed, failed, cancelled, processing]"
        )]
        status: String,
        #[arg(long, value_name = "RFC3339", help = "Time the payment was made")]
        paid_at: Option<String>,
        #[arg(long, conflicts_with = "paid_at", help = "Stamp paid_at with the current time")]
        paid_now: bool,
    },
    #[command(about = "Show a payment by transaction id")]
    Get {
        #[arg(value_name = "TRANSACTION_ID")]
        transaction_id: String,
    },
    #[command(about = "Open a payment's gateway page in a browser")]
    Open {
        #[arg(value_name = "TRANSACTION_ID")]
        transaction_id: String,
        #[arg(long, help = "Print the URL only")]
        url: bool,
    },
}

#[derive(clap::Subcommand)]
enum TourCommands {
    #[command(about = "List active tours, newest first")]
    List {
        #[arg(long, value_name = "NAME", help = "Only this category")]
        category: Option<String>,
        #[arg(long, value_name = "LEVEL", help = "Only this difficulty")]
        difficulty: Option<String>,
        #[arg(long, help = "Only featured tours")]
        featured: bool,
        #[arg(long, value_name = "N", help = "Maximum number of tours")]
        limit: Option<usize>,
        #[arg(long, value_name = "N", help = "Skip the first N tours (page size defaults to 10)")]
        offset: Option<usize>,
    },
    #[command(about = "Show a tour with its day-by-day itinerary")]
    Get {
        #[arg(value_name = "ID")]
        id: String,
    },
    #[command(about = "Search active tours, best rated first")]
    Search {
        #[arg(long, value_name = "PLACE", help = "Tours visiting this destination")]
        destination: Option<String>,
        #[arg(long, value_name = "NAME", help = "Only this category")]
        category: Option<String>,
        #[arg(long, value_name = "AMOUNT", help = "Lowest adult price")]
        min_price: Option<f64>,
        #[arg(long, value_name = "AMOUNT", help = "Highest adult price")]
        max_price: Option<f64>,
        #[arg(long, value_name = "DAYS", help = "Exact duration in days")]
        duration: Option<u32>,
        #[arg(long, value_name = "N", help = "Maximum number of tours")]
        limit: Option<usize>,
    },
}

#[derive(clap::Args)]
struct McpArgs {
    #[arg(
        long,
        env = "TRIPSTORE_SITE_URL",
        default_value = tripstore::DEFAULT_SITE_URL,
        value_name = "URL",
        help = "Base URL of the booking site"
    )]
    site: String,
}

struct Output {
    json: bool,
    pretty: bool,
    compact: bool,
    currency: String,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "tripstore=debug" } else { "tripstore=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn error_code(err: &StoreError) -> i32 {
    match err.root() {
        StoreError::InvalidAirport(_)
        | StoreError::InvalidDate(_)
        | StoreError::Validation(_) => 2,
        StoreError::Timeout
        | StoreError::ConnectionFailed(_)
        | StoreError::DnsResolution(_)
        | StoreError::TlsError(_)
        | StoreError::ProxyError(_) => 3,
        StoreError::Database { .. } => 4,
        StoreError::Decode(_) => 5,
        StoreError::MissingConfig(_) | StoreError::InvalidConfig(_) => 6,
        StoreError::Operation { .. } => 1,
    }
}

fn error_kind(err: &StoreError) -> &'static str {
    if err.is_not_found() {
        return "not_found";
    }
    match err.root() {
        StoreError::MissingConfig(_) => "missing_config",
        StoreError::InvalidConfig(_) => "invalid_config",
        StoreError::InvalidAirport(_) => "invalid_airport",
        StoreError::InvalidDate(_) => "invalid_date",
        StoreError::Validation(_) => "validation_error",
        StoreError::Timeout => "timeout",
        StoreError::ConnectionFailed(_) => "connection_failed",
        StoreError::DnsResolution(_) => "dns_error",
        StoreError::TlsError(_) => "tls_error",
        StoreError::ProxyError(_) => "proxy_error",
        StoreError::Database { .. } => "database_error",
        StoreError::Decode(_) => "decode_error",
        StoreError::Operation { .. } => "error",
    }
}

fn die(err: &StoreError, json_mode: bool) -> ! {
    if json_mode {
        let json = serde_json::json!({
            "error": {
                "kind": error_kind(err),
                "message": err.to_string(),
            }
        });
        println!("{json}");
    } else {
        eprintln!("error: {err}");
    }
    process::exit(error_code(err));
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<(), StoreError> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}

fn connect(global: &GlobalArgs) -> Result<TripStore<RestBackend>, StoreError> {
    let config = StoreConfig::new(global.db_url.as_deref(), global.service_key.as_deref())?
        .with_proxy(global.proxy.clone())
        .with_timeout(global.timeout);
    TripStore::connect(config)
}

fn parse_day(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StoreError::InvalidDate(s.to_string()))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            StoreError::Validation(format!(
                "invalid timestamp \"{s}\" — must be RFC 3339 (e.g. 2025-08-15T06:00:00Z)"
            ))
        })
}

fn required<'a>(value: &'a Option<String>, flag: &str) -> Result<&'a str, StoreError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| StoreError::Validation(format!("{flag} is required (or use --from-draft)")))
}

fn build_search(args: &SearchArgs) -> Result<FlightSearch, StoreError> {
    let from = args
        .from
        .as_ref()
        .ok_or_else(|| StoreError::Validation("--from is required".into()))?;
    let to = args
        .to
        .as_ref()
        .ok_or_else(|| StoreError::Validation("--to is required".into()))?;
    let date = args
        .date
        .as_ref()
        .ok_or_else(|| StoreError::Validation("--date is required".into()))?;

    let search = FlightSearch {
        from: from.to_uppercase(),
        to: to.to_uppercase(),
        departure_date: date.clone(),
        adults: args.adults,
        children: args.children,
        infants: args.infants,
        fare_class: FareClass::from_str_loose(&args.class)?,
        trip_type: TripType::from_str_loose(&args.trip)?,
    };
    search.validate()?;
    Ok(search)
}

fn parse_passenger(booking_id: &str, entry: &str) -> Result<Passenger, StoreError> {
    let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
    if parts.len() != 6 && parts.len() != 8 {
        return Err(StoreError::Validation(format!(
            "--passenger must be \"TYPE,TITLE,FIRST,LAST,DOB,NATIONALITY[,PASSPORT,EXPIRY]\", got: \"{entry}\""
        )));
    }
    let (passport_number, passport_expiry) = if parts.len() == 8 {
        (Some(parts[6].to_string()), Some(parse_day(parts[7])?))
    } else {
        (None, None)
    };
    Ok(Passenger {
        booking_id: booking_id.to_string(),
        passenger_type: PassengerType::from_str_loose(parts[0])?,
        title: parts[1].to_string(),
        first_name: parts[2].to_string(),
        last_name: parts[3].to_string(),
        date_of_birth: parse_day(parts[4])?,
        nationality: parts[5].to_uppercase(),
        passport_number,
        passport_expiry,
    })
}

fn read_draft(path: &str) -> Result<FlightBookingDraft, StoreError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Validation(format!("cannot read {path}: {e}")))?;
    serde_json::from_str(&text).map_err(|e| {
        StoreError::Validation(format!(
            "{path} is not a {} payload: {e}",
            model::FLIGHT_BOOKING_DATA_KEY
        ))
    })
}

fn build_booking(args: &CreateBookingArgs) -> Result<Booking, StoreError> {
    let booking_type = BookingType::from_str_loose(required(&args.booking_type, "--type")?)?;
    let service_id = required(&args.service_id, "--service-id")?;
    let contact_info = ContactInfo {
        name: required(&args.name, "--name")?.to_string(),
        email: required(&args.email, "--email")?.to_string(),
        phone: required(&args.phone, "--phone")?.to_string(),
    };
    let total_amount = args
        .total
        .ok_or_else(|| StoreError::Validation("--total is required (or use --from-draft)".into()))?;
    if !total_amount.is_finite() || total_amount < 0.0 {
        return Err(StoreError::Validation(format!(
            "--total must be a non-negative amount, got {total_amount}"
        )));
    }
    let details = args
        .details
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| StoreError::Validation(format!("--details is not valid JSON: {e}")))?;

    Ok(Booking {
        booking_number: args
            .number
            .clone()
            .unwrap_or_else(|| model::booking_number(Utc::now())),
        user_id: args.user_id.clone(),
        booking_type,
        service_id: service_id.to_string(),
        contact_info,
        selected_class: args
            .class
            .as_deref()
            .map(FareClass::from_str_loose)
            .transpose()?,
        number_of_adults: args.adults,
        number_of_children: args.children,
        number_of_infants: args.infants,
        start_date: args.start_date.as_deref().map(parse_day).transpose()?,
        total_amount,
        special_requests: args.special_requests.clone(),
        status: BookingStatus::PendingPayment,
        details,
    })
}

async fn run_flights(cmd: FlightCommands, global: &GlobalArgs, out: &Output) -> Result<(), StoreError> {
    match cmd {
        FlightCommands::Get { id } => {
            let store = connect(global)?;
            let flight = store.get_flight_by_id(&id).await?;
            if out.json {
                print_json(&flight, out.pretty)
            } else if out.compact {
                println!("{}", table::compact_flight(&flight, FareClass::Economy, &out.currency));
                Ok(())
            } else {
                println!("{}", table::render_flights(&[flight], &out.currency));
                Ok(())
            }
        }
        FlightCommands::Search(args) => {
            let search = build_search(&args)?;

            if args.url || args.open {
                let url = tripstore::generate_search_url(&search, &args.site)?;
                if args.url {
                    println!("{url}");
                } else {
                    println!("Opening: {url}");
                    open::that(&url).map_err(|e| {
                        StoreError::Validation(format!("failed to open browser: {e}"))
                    })?;
                }
                return Ok(());
            }

            let store = connect(global)?;
            let mut flights = store.search_flights(&search).await?;
            if let Some(n) = args.top {
                model::keep_cheapest(&mut flights, search.fare_class, n);
            }

            if out.json {
                print_json(&flights, out.pretty)
            } else if flights.is_empty() {
                println!("No flights found.");
                Ok(())
            } else if out.compact {
                for f in &flights {
                    println!("{}", table::compact_flight(f, search.fare_class, &out.currency));
                }
                Ok(())
            } else {
                println!("{}", table::render_flights(&flights, &out.currency));
                Ok(())
            }
        }
    }
}

async fn run_bookings(cmd: BookingCommands, global: &GlobalArgs, out: &Output) -> Result<(), StoreError> {
    match cmd {
        BookingCommands::Create(args) => {
            if let Some(ref path) = args.from_draft {
                let draft = read_draft(path)?;
                let booking = draft.to_booking(
                    args.number
                        .clone()
                        .unwrap_or_else(|| model::booking_number(Utc::now())),
                );
                let store = connect(global)?;
                let stored = store.create_booking(&booking).await?;
                let passengers = store
                    .create_passengers(&draft.passengers_for(&stored.id))
                    .await?;

                if out.json {
                    return print_json(
                        &serde_json::json!({ "booking": stored, "passengers": passengers }),
                        out.pretty,
                    );
                }
                println!("{}", table::render_bookings(&[stored], &out.currency));
                println!("{} passenger(s) recorded.", passengers.len());
                return Ok(());
            }

            let booking = build_booking(&args)?;
            let store = connect(global)?;
            let stored = store.create_booking(&booking).await?;
            if out.json {
                print_json(&stored, out.pretty)
            } else {
                println!("{}", table::render_bookings(&[stored], &out.currency));
                Ok(())
            }
        }
        BookingCommands::Status { id, status } => {
            let status = BookingStatus::from_str_loose(&status)?;
            let store = connect(global)?;
            let stored = store.update_booking_status(&id, status).await?;
            if out.json {
                print_json(&stored, out.pretty)
            } else {
                println!("{}", table::render_bookings(&[stored], &out.currency));
                Ok(())
            }
        }
        BookingCommands::List { booking_type, user_id } => {
            let booking_type = BookingType::from_str_loose(&booking_type)?;
            let store = connect(global)?;
            let bookings = store
                .get_bookings_by_type(booking_type, user_id.as_deref())
                .await?;
            if out.json {
                print_json(&bookings, out.pretty)
            } else if bookings.is_empty() {
                println!("No bookings found.");
                Ok(())
            } else {
                println!("{}", table::render_bookings(&bookings, &out.currency));
                Ok(())
            }
        }
    }
}

async fn run_passengers(cmd: PassengerCommands, global: &GlobalArgs, out: &Output) -> Result<(), StoreError> {
    match cmd {
        PassengerCommands::Add { booking_id, passenger } => {
            let passengers = passenger
                .iter()
                .map(|entry| parse_passenger(&booking_id, entry))
                .collect::<Result<Vec<_>, _>>()?;
            let store = connect(global)?;
            let stored = store.create_passengers(&passengers).await?;
            if out.json {
                print_json(&stored, out.pretty)
            } else {
                for p in &stored {
                    println!(
                        "{} | {} {} {} | {:?} | {}",
                        p.id,
                        p.record.title,
                        p.record.first_name,
                        p.record.last_name,
                        p.record.passenger_type,
                        p.record.date_of_birth
                    );
                }
                Ok(())
            }
        }
    }
}

async fn run_payments(cmd: PaymentCommands, global: &GlobalArgs, out: &Output) -> Result<(), StoreError> {
    let stored = match cmd {
        PaymentCommands::Create {
            booking_id,
            transaction_id,
            amount,
            payment_currency,
            gateway,
            payment_url,
        } => {
            let payment = Payment {
                booking_id,
                transaction_id,
                amount,
                currency: payment_currency.to_uppercase(),
                gateway: PaymentGateway::from_str_loose(&gateway)?,
                payment_url,
                status: PaymentStatus::Pending,
                paid_at: None,
            };
            connect(global)?.create_payment(&payment).await?
        }
        PaymentCommands::Status {
            transaction_id,
            status,
            paid_at,
            paid_now,
        } => {
            let status = PaymentStatus::from_str_loose(&status)?;
            let paid_at = match (paid_at, paid_now) {
                (Some(ts), _) => Some(parse_timestamp(&ts)?),
                (None, true) => Some(Utc::now()),
                (None, false) => None,
            };
            connect(global)?
                .update_payment_status(&transaction_id, status, paid_at)
                .await?
        }
        PaymentCommands::Get { transaction_id } => {
            connect(global)?
                .get_payment_by_transaction_id(&transaction_id)
                .await?
        }
        PaymentCommands::Open { transaction_id, url } => {
            let payment = connect(global)?
                .get_payment_by_transaction_id(&transaction_id)
                .await?;
            let link = payment.record.payment_url.ok_or_else(|| {
                StoreError::Validation(format!("payment {transaction_id} has no payment URL"))
            })?;
            if url {
                println!("{link}");
            } else {
                println!("Opening: {link}");
                open::that(&link)
                    .map_err(|e| StoreError::Validation(format!("failed to open browser: {e}")))?;
            }
            return Ok(());
        }
    };

    if out.json {
        print_json(&stored, out.pretty)
    } else {
        println!("{}", table::render_payment(&stored));
        Ok(())
    }
}

async fn run_tours(cmd: TourCommands, global: &GlobalArgs, out: &Output) -> Result<(), StoreError> {
    let tours = match cmd {
        TourCommands::Get { id } => {
            let detail = connect(global)?.get_tour_by_id(&id).await?;
            if out.json {
                return print_json(&detail, out.pretty);
            }
            println!("{}", table::render_tour_detail(&detail));
            return Ok(());
        }
        TourCommands::List {
            category,
            difficulty,
            featured,
            limit,
            offset,
        } => {
            let filter = TourFilter {
                category,
                difficulty,
                featured,
                limit,
                offset,
            };
            connect(global)?.get_tours(&filter).await?
        }
        TourCommands::Search {
            destination,
            category,
            min_price,
            max_price,
            duration,
            limit,
        } => {
            if let (Some(min), Some(max)) = (min_price, max_price) {
                if min > max {
                    return Err(StoreError::Validation(format!(
                        "--min-price ({min}) is above --max-price ({max})"
                    )));
                }
            }
            let search = TourSearch {
                destination,
                category,
                min_price,
                max_price,
                duration,
                limit,
            };
            connect(global)?.search_tours(&search).await?
        }
    };

    if out.json {
        print_json(&tours, out.pretty)
    } else if tours.is_empty() {
        println!("No tours found.");
        Ok(())
    } else if out.compact {
        for t in &tours {
            println!("{}", table::compact_tour(t));
        }
        Ok(())
    } else {
        println!("{}", table::render_tours(&tours));
        Ok(())
    }
}

async fn run(cli: Cli, out: &Output) -> Result<(), StoreError> {
    let global = &cli.global;
    match cli.command {
        Commands::Ping => {
            connect(global)?.ping().await?;
            if out.json {
                print_json(&serde_json::json!({ "ok": true }), false)
            } else {
                println!("Database reachable.");
                Ok(())
            }
        }
        Commands::Flights(cmd) => run_flights(cmd, global, out).await,
        Commands::Bookings(cmd) => run_bookings(cmd, global, out).await,
        Commands::Passengers(cmd) => run_passengers(cmd, global, out).await,
        Commands::Payments(cmd) => run_payments(cmd, global, out).await,
        Commands::Tours(cmd) => run_tours(cmd, global, out).await,
        Commands::Mcp(args) => {
            let site = url::Url::parse(&args.site)
                .map_err(|e| StoreError::InvalidConfig(format!("site URL \"{}\": {e}", args.site)))?;
            tripstore::mcp::run(connect(global)?, site).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let out = Output {
        json: cli.global.json || cli.global.pretty,
        pretty: cli.global.pretty,
        compact: cli.global.compact,
        currency: cli.global.currency.to_uppercase(),
    };

    if let Err(e) = run(cli, &out).await {
        die(&e, out.json);
    }
}
