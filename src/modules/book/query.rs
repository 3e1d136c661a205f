//! Book listing filters.
//!
//! [`BookQuery`] is the flat set of optional request parameters. [`apply_query`]
//! folds it into a [`BookFilter`], a store-agnostic description of the
//! listing: predicates, one order clause and pagination. Stores either render
//! the filter to SQL or evaluate it directly.
//!
//! The filter keeps query-builder accumulation semantics on purpose:
//! [`BookFilter::replace_where`] discards every predicate accumulated so far,
//! [`BookFilter::and_where`] appends. Because search and `order=new` both use
//! `replace_where`, `order=new` drops a search (and a category restriction).

use std::{convert::Infallible, fmt::Display, str::FromStr};

use serde::{de, Deserialize, Deserializer};

use crate::utils::parse_int_prefix;

/// Page size used when the caller does not supply a usable `limit`.
pub const DEFAULT_LIMIT: u64 = 50;

/// Requested ordering, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    PriceAsc,
    PriceDesc,
    Stock,
    New,
    /// Any other value: the listing gets no order clause at all.
    Unrecognized,
}

impl FromStr for Order {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw {
            "price%ASC" | "priceASC" => Order::PriceAsc,
            "price%DESC" | "priceDESC" => Order::PriceDesc,
            "stock" => Order::Stock,
            "new" => Order::New,
            _ => Order::Unrecognized,
        })
    }
}

/// Query-string parameters of the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    pub search: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub cat: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub order: Option<Order>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub limit: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub skip: Option<u64>,
}

/// Deserialize an optional query value, treating `key=` like an absent key.
pub fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(de::Error::custom),
    }
}

impl BookQuery {
    /// Drop the price bounds when both are `"0"`, the UI's "any price".
    ///
    /// Callers assembling a query apply this; [`apply_query`] never does.
    pub fn clear_zero_price_range(&mut self) {
        if self.min_price.as_deref() == Some("0") && self.max_price.as_deref() == Some("0") {
            self.min_price = None;
            self.max_price = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `LOWER(name) LIKE %needle% OR LOWER(author) LIKE %needle%`; the needle
    /// is already lower-cased.
    NameOrAuthorContains(String),
    IsNew(bool),
    /// Closed range on price.
    PriceBetween { min: i64, max: i64 },
    /// Joined category id; only meaningful on a filter joined with categories.
    CategoryIs(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Price,
    Stock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderClause {
    pub key: SortKey,
    pub direction: Direction,
}

/// Structured book listing: predicates ANDed together, an optional order and
/// pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFilter {
    join_categories: bool,
    predicates: Vec<Predicate>,
    pub order: Option<OrderClause>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl BookFilter {
    /// Filter over the books table alone.
    pub fn new() -> Self {
        Self {
            join_categories: false,
            predicates: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    /// Filter over books inner-joined with their categories: books without a
    /// category drop out, and each book carries the categories that matched.
    pub fn joined_with_categories() -> Self {
        Self {
            join_categories: true,
            ..Self::new()
        }
    }

    pub fn joins_categories(&self) -> bool {
        self.join_categories
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Start the WHERE clause over, keeping only `predicate`.
    pub fn replace_where(&mut self, predicate: Predicate) -> &mut Self {
        self.predicates.clear();
        self.predicates.push(predicate);
        self
    }

    pub fn and_where(&mut self, predicate: Predicate) -> &mut Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(&mut self, key: SortKey, direction: Direction) -> &mut Self {
        self.order = Some(OrderClause { key, direction });
        self
    }
}

impl Default for BookFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply search, price, pagination and ordering parameters to `filter`.
pub fn apply_query(filter: &mut BookFilter, query: &BookQuery) {
    if let Some(search) = non_empty(&query.search) {
        filter.replace_where(Predicate::NameOrAuthorContains(search.to_lowercase()));
    }

    if query.order == Some(Order::New) {
        filter.replace_where(Predicate::IsNew(true));
    }

    if let (Some(min), Some(max)) = (non_empty(&query.min_price), non_empty(&query.max_price)) {
        match (parse_int_prefix(min), parse_int_prefix(max)) {
            (Some(min), Some(max)) => {
                filter.and_where(Predicate::PriceBetween { min, max });
            }
            _ => tracing::debug!(min, max, "ignoring non-numeric price bounds"),
        }
    }

    filter.limit = Some(DEFAULT_LIMIT);
    if let Some(limit) = query.limit.filter(|limit| *limit > 0) {
        filter.limit = Some(limit);
    }

    if let Some(skip) = query.skip {
        filter.offset = Some(skip);
    }

    match query.order {
        None | Some(Order::New) => {
            filter.order_by(SortKey::CreatedAt, Direction::Desc);
        }
        Some(Order::PriceAsc) => {
            filter.order_by(SortKey::Price, Direction::Asc);
        }
        Some(Order::PriceDesc) => {
            filter.order_by(SortKey::Price, Direction::Desc);
        }
        Some(Order::Stock) => {
            filter.order_by(SortKey::Stock, Direction::Desc);
        }
        Some(Order::Unrecognized) => {}
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
