use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::Table;
use crate::error::StoreError;
use crate::model::FareClass;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Gte(Value),
    Lte(Value),
    /// Array column contains every listed element.
    Contains(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

impl Filter {
    fn to_param(&self) -> (String, String) {
        let value = match &self.op {
            FilterOp::Eq(Value::Null) => "is.null".to_string(),
            FilterOp::Eq(v) => format!("eq.{}", render_value(v)),
            FilterOp::Gte(v) => format!("gte.{}", render_value(v)),
            FilterOp::Lte(v) => format!("lte.{}", render_value(v)),
            FilterOp::Contains(items) => {
                let quoted: Vec<String> = items.iter().map(|s| quote_element(s)).collect();
                format!("cs.{{{}}}", quoted.join(","))
            }
        };
        (self.column.clone(), value)
    }
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quote_element(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }

    fn render(&self) -> String {
        let dir = if self.ascending { "asc" } else { "desc" };
        format!("{}.{dir}", self.column)
    }
}

/// A child table fetched alongside each parent row, joined on
/// `child.foreign_key = parent.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub table: Table,
    pub foreign_key: &'static str,
    pub order: Option<Order>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Select,
    Insert(Vec<Value>),
    Update(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub table: Table,
    pub action: Action,
    pub columns: String,
    pub embed: Option<Embed>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub single: bool,
}

impl Request {
    fn new(table: Table, action: Action) -> Self {
        Self {
            table,
            action,
            columns: "*".to_string(),
            embed: None,
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
            single: false,
        }
    }

    pub fn select(table: Table) -> Self {
        Self::new(table, Action::Select)
    }

    pub fn insert(table: Table, rows: Vec<Value>) -> Self {
        Self::new(table, Action::Insert(rows))
    }

    pub fn update(table: Table, patch: Value) -> Self {
        Self::new(table, Action::Update(patch))
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn embed(mut self, table: Table, foreign_key: &'static str, order: Option<Order>) -> Self {
        self.embed = Some(Embed {
            table,
            foreign_key,
            order,
        });
        self
    }

    fn filter(mut self, column: &str, op: FilterOp) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Eq(value.into()))
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Gte(value.into()))
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Lte(value.into()))
    }

    pub fn contains(self, column: &str, items: Vec<String>) -> Self {
        self.filter(column, FilterOp::Contains(items))
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Inclusive row range, zero-based.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn is_write(&self) -> bool {
        !matches!(self.action, Action::Select)
    }

    pub fn to_url_params(&self) -> Vec<(String, String)> {
        let select = match &self.embed {
            Some(embed) => format!("{},{}(*)", self.columns, embed.table),
            None => self.columns.clone(),
        };
        let mut params = vec![("select".to_string(), select)];

        params.extend(self.filters.iter().map(Filter::to_param));

        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.render()));
        }
        if let Some(Embed {
            table,
            order: Some(order),
            ..
        }) = &self.embed
        {
            params.push((format!("{table}.order"), order.render()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }

        params
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
}

impl TripType {
    pub fn from_str_loose(s: &str) -> Result<Self, StoreError> {
        match s {
            "one-way" => Ok(Self::OneWay),
            "round-trip" => Ok(Self::RoundTrip),
            _ => Err(StoreError::Validation(format!("invalid trip type: {s}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneWay => "one-way",
            Self::RoundTrip => "round-trip",
        }
    }
}

fn default_adults() -> u32 {
    1
}

/// Search criteria of the site's flight search endpoint
/// (`/api/flights/search` and the `/flights/search` page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearch {
    pub from: String,
    pub to: String,
    pub departure_date: String,
    #[serde(default = "default_adults")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(rename = "class")]
    pub fare_class: FareClass,
    #[serde(default)]
    pub trip_type: TripType,
}

fn validate_airport(code: &str) -> Result<(), StoreError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(StoreError::InvalidAirport(code.to_string()));
    }
    Ok(())
}

pub fn parse_date(date: &str) -> Result<NaiveDate, StoreError> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| StoreError::InvalidDate(date.to_string()))?;
    // chrono accepts unpadded fields; the site sends them padded.
    if date.len() != 10 || parsed.year() < 2000 {
        return Err(StoreError::InvalidDate(date.to_string()));
    }
    Ok(parsed)
}

impl FlightSearch {
    pub fn new(from: &str, to: &str, departure_date: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            departure_date: departure_date.to_string(),
            adults: 1,
            children: 0,
            infants: 0,
            fare_class: FareClass::Economy,
            trip_type: TripType::OneWay,
        }
    }

    pub fn validate(&self) -> Result<NaiveDate, StoreError> {
        validate_airport(&self.from)?;
        validate_airport(&self.to)?;
        if self.from == self.to {
            return Err(StoreError::Validation(format!(
                "departure and arrival airport are both {}",
                self.from
            )));
        }
        let date = parse_date(&self.departure_date)?;

        let total = u64::from(self.adults) + u64::from(self.children) + u64::from(self.infants);
        if total > 9 {
            return Err(StoreError::Validation(format!(
                "total passengers ({total}) exceeds maximum of 9"
            )));
        }
        if self.adults == 0 {
            return Err(StoreError::Validation(
                "at least one adult passenger required".into(),
            ));
        }
        if self.infants > self.adults {
            return Err(StoreError::Validation(
                "infants cannot exceed number of adults".into(),
            ));
        }

        Ok(date)
    }

    /// Infants travel on an adult's lap and take no seat.
    pub fn seats_needed(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }

    pub fn to_url_params(&self) -> Vec<(String, String)> {
        vec![
            ("from".to_string(), self.from.clone()),
            ("to".to_string(), self.to.clone()),
            ("departureDate".to_string(), self.departure_date.clone()),
            ("adults".to_string(), self.adults.to_string()),
            ("children".to_string(), self.children.to_string()),
            ("infants".to_string(), self.infants.to_string()),
            ("class".to_string(), self.fare_class.as_str().to_string()),
            ("tripType".to_string(), self.trip_type.as_str().to_string()),
        ]
    }

    /// Link to the site's search results page for these criteria.
    pub fn search_page_url(&self, site: &Url) -> Result<Url, StoreError> {
        let mut base = site.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut url = base
            .join("flights/search")
            .map_err(|e| StoreError::InvalidConfig(format!("site URL \"{site}\": {e}")))?;
        url.query_pairs_mut().extend_pairs(self.to_url_params());
        Ok(url)
    }
}
