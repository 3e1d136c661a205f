//! SQL rendering of [`BookFilter`]s for PostgreSQL.
//!
//! Listing runs in two steps: [`book_ids`] selects the ids of the requested
//! page in order, then the rows (and, for joined filters, the categories that
//! matched, see [`matched_categories`]) are fetched by id. Grouping on the book
//! id keeps pagination counting books rather than book/category pairs.

use sea_query::{
    Alias, Cond, Condition, Expr, Func, JoinType, Order, PostgresQueryBuilder, Query,
    SelectStatement,
};

use crate::modules::book::query::{BookFilter, Direction, Predicate, SortKey};

const BOOK: &str = "book";
const LINK: &str = "book_category";
const CATEGORY: &str = "category";

/// `SELECT book.id ...` for one page of `filter`.
pub fn book_ids(filter: &BookFilter) -> String {
    let mut query = base_select(filter);
    query.column((Alias::new(BOOK), Alias::new("id")));

    if filter.joins_categories() {
        query.group_by_col((Alias::new(BOOK), Alias::new("id")));
    }

    if let Some(order) = filter.order {
        let column = match order.key {
            SortKey::CreatedAt => "created_at",
            SortKey::Price => "price",
            SortKey::Stock => "stock",
        };
        let direction = match order.direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        };
        query.order_by((Alias::new(BOOK), Alias::new(column)), direction);
    }
    // Ties break on insertion order.
    query.order_by((Alias::new(BOOK), Alias::new("id")), Order::Asc);

    // PostgreSQL takes LIMIT/OFFSET as BIGINT.
    if let Some(limit) = filter.limit {
        query.limit(limit.min(i64::MAX as u64));
    }
    if let Some(offset) = filter.offset {
        query.offset(offset.min(i64::MAX as u64));
    }

    query.to_string(PostgresQueryBuilder)
}

/// `(book_id, id, name)` rows of the categories through which each of
/// `book_ids` matched a joined `filter`.
pub fn matched_categories(filter: &BookFilter, book_ids: &[i64]) -> String {
    let mut query = base_select(filter);
    query
        .expr_as(
            Expr::col((Alias::new(BOOK), Alias::new("id"))),
            Alias::new("book_id"),
        )
        .column((Alias::new(CATEGORY), Alias::new("id")))
        .column((Alias::new(CATEGORY), Alias::new("name")))
        .and_where(Expr::col((Alias::new(BOOK), Alias::new("id"))).is_in(book_ids.iter().copied()))
        .order_by((Alias::new(CATEGORY), Alias::new("id")), Order::Asc);

    query.to_string(PostgresQueryBuilder)
}

fn base_select(filter: &BookFilter) -> SelectStatement {
    let mut query = Query::select();
    query.from_as(Alias::new("books"), Alias::new(BOOK));

    if filter.joins_categories() {
        query
            .join_as(
                JoinType::InnerJoin,
                Alias::new("book_categories"),
                Alias::new(LINK),
                Expr::col((Alias::new(LINK), Alias::new("book_id")))
                    .equals((Alias::new(BOOK), Alias::new("id"))),
            )
            .join_as(
                JoinType::InnerJoin,
                Alias::new("categories"),
                Alias::new(CATEGORY),
                Expr::col((Alias::new(CATEGORY), Alias::new("id")))
                    .equals((Alias::new(LINK), Alias::new("category_id"))),
            );
    }

    if !filter.predicates().is_empty() {
        let cond = filter
            .predicates()
            .iter()
            .fold(Cond::all(), |cond, predicate| cond.add(condition(predicate)));
        query.cond_where(cond);
    }

    query
}

fn condition(predicate: &Predicate) -> Condition {
    let book = |column: &str| Expr::col((Alias::new(BOOK), Alias::new(column)));

    match predicate {
        Predicate::NameOrAuthorContains(needle) => {
            let pattern = format!("%{}%", escape_like_wildcards(needle));
            Cond::any()
                .add(Expr::expr(Func::lower(book("name"))).like(pattern.clone()))
                .add(Expr::expr(Func::lower(book("author"))).like(pattern))
        }
        Predicate::IsNew(flag) => Cond::all().add(book("is_new").eq(*flag)),
        Predicate::PriceBetween { min, max } => {
            Cond::all().add(book("price").between(*min, *max))
        }
        Predicate::CategoryIs(id) => {
            Cond::all().add(Expr::col((Alias::new(CATEGORY), Alias::new("id"))).eq(*id))
        }
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
