//! Payload validation for book writes.
//!
//! Payloads deserialize with every field optional so that a missing or
//! out-of-range field is reported field by field instead of failing the
//! whole body.

use serde::Deserialize;

use crate::error::FieldError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookPayload {
    pub name: Option<String>,
    pub review: Option<String>,
    pub author: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<f64>,
    pub categories: Option<Vec<i64>>,
    pub user: Option<i64>,
    pub is_new: Option<bool>,
}

/// Every field optional; present fields obey the create rules.
pub type UpdateBookPayload = CreateBookPayload;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateBook {
    pub name: String,
    pub review: Option<String>,
    pub author: String,
    pub price: f64,
    pub stock: i32,
    pub categories: Vec<i64>,
    /// Declared owner. The requester's identity is authoritative.
    pub user: i64,
    pub is_new: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBook {
    pub name: Option<String>,
    pub review: Option<String>,
    pub author: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub categories: Option<Vec<i64>>,
    pub is_new: Option<bool>,
}

pub fn validate_create(payload: CreateBookPayload) -> Result<CreateBook, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = required(&mut errors, "name", payload.name).and_then(|name| {
        check(&mut errors, !name.is_empty(), "name", "should not be empty").then_some(name)
    });
    let author = required(&mut errors, "author", payload.author);
    let price = required(&mut errors, "price", payload.price)
        .and_then(|price| positive_price(&mut errors, price));
    let stock = required(&mut errors, "stock", payload.stock)
        .and_then(|stock| positive_stock(&mut errors, stock));
    let categories = required(&mut errors, "categories", payload.categories)
        .and_then(|ids| non_empty_ids(&mut errors, ids));
    let user = required(&mut errors, "user", payload.user);

    match (name, author, price, stock, categories, user) {
        (Some(name), Some(author), Some(price), Some(stock), Some(categories), Some(user))
            if errors.is_empty() =>
        {
            Ok(CreateBook {
                name,
                review: payload.review,
                author,
                price,
                stock,
                categories,
                user,
                is_new: payload.is_new.unwrap_or(false),
            })
        }
        _ => Err(errors),
    }
}

pub fn validate_update(payload: UpdateBookPayload) -> Result<UpdateBook, Vec<FieldError>> {
    let mut errors = Vec::new();

    if let Some(name) = &payload.name {
        check(&mut errors, !name.is_empty(), "name", "should not be empty");
    }
    let price = payload
        .price
        .and_then(|price| positive_price(&mut errors, price));
    let stock = payload
        .stock
        .and_then(|stock| positive_stock(&mut errors, stock));
    let categories = payload
        .categories
        .and_then(|ids| non_empty_ids(&mut errors, ids));

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(UpdateBook {
        name: payload.name,
        review: payload.review,
        author: payload.author,
        price,
        stock,
        categories,
        is_new: payload.is_new,
    })
}

fn required<T>(errors: &mut Vec<FieldError>, field: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.push(FieldError::new(field, "is required"));
    }
    value
}

fn check(errors: &mut Vec<FieldError>, ok: bool, field: &'static str, error: &'static str) -> bool {
    if !ok {
        errors.push(FieldError::new(field, error));
    }
    ok
}

fn positive_price(errors: &mut Vec<FieldError>, price: f64) -> Option<f64> {
    check(
        errors,
        price.is_finite() && price > 0.0,
        "price",
        "must be a positive number",
    )
    .then_some(price)
}

fn positive_stock(errors: &mut Vec<FieldError>, stock: f64) -> Option<i32> {
    let ok = stock.fract() == 0.0 && stock > 0.0 && stock <= f64::from(i32::MAX);
    // Range checked above, the cast cannot truncate.
    check(errors, ok, "stock", "must be a positive integer").then_some(stock as i32)
}

fn non_empty_ids(errors: &mut Vec<FieldError>, ids: Vec<i64>) -> Option<Vec<i64>> {
    let ok = !ids.is_empty();
    check(errors, ok, "categories", "should not be empty").then_some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> CreateBookPayload {
        CreateBookPayload {
            name: Some("Dune".to_string()),
            review: None,
            author: Some("Frank Herbert".to_string()),
            price: Some(12.5),
            stock: Some(3.0),
            categories: Some(vec![1, 2]),
            user: Some(1),
            is_new: None,
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn valid_create_payload_passes() {
        let book = validate_create(valid_payload()).unwrap();
        assert_eq!(book.name, "Dune");
        assert_eq!(book.stock, 3);
        assert_eq!(book.categories, vec![1, 2]);
        assert!(!book.is_new);
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let errors = validate_create(CreateBookPayload::default()).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["name", "author", "price", "stock", "categories", "user"]
        );
    }

    #[test]
    fn non_positive_numbers_are_rejected() {
        let errors = validate_create(CreateBookPayload {
            price: Some(0.0),
            stock: Some(-1.0),
            ..valid_payload()
        })
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["price", "stock"]);
    }

    #[test]
    fn fractional_stock_is_rejected() {
        let errors = validate_create(CreateBookPayload {
            stock: Some(1.5),
            ..valid_payload()
        })
        .unwrap_err();
        assert_eq!(errors, vec![FieldError::new("stock", "must be a positive integer")]);
    }

    #[test]
    fn empty_name_and_categories_are_rejected() {
        let errors = validate_create(CreateBookPayload {
            name: Some(String::new()),
            categories: Some(vec![]),
            ..valid_payload()
        })
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["name", "categories"]);
    }

    #[test]
    fn update_accepts_partial_payload() {
        let update = validate_update(UpdateBookPayload {
            price: Some(20.0),
            ..UpdateBookPayload::default()
        })
        .unwrap();
        assert_eq!(
            update,
            UpdateBook {
                price: Some(20.0),
                ..UpdateBook::default()
            }
        );
    }

    #[test]
    fn update_checks_present_fields() {
        let errors = validate_update(UpdateBookPayload {
            stock: Some(0.0),
            categories: Some(vec![]),
            ..UpdateBookPayload::default()
        })
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["stock", "categories"]);
    }

    #[test]
    fn payload_uses_camel_case() {
        let payload: CreateBookPayload =
            serde_json::from_str(r#"{"name":"Dune","isNew":true,"categories":[4]}"#).unwrap();
        assert_eq!(payload.is_new, Some(true));
        assert_eq!(payload.categories, Some(vec![4]));
    }
}
