//! Pagination engine: page windows, counts, and page-count rounding.

use serde::Serialize;

use opsdesk_core::Record;

use crate::errors::{ApiError, ErrorDetail};

/// The `pagination` object of a paginated list envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub count: u64,
    pub page: u64,
    pub pages: u64,
    pub size: u64,
}

/// Exact ceiling division. `size == 0` is rejected when the ViewSet is
/// built, so callers always pass a positive size.
pub fn page_count(count: u64, size: u64) -> u64 {
    count.div_ceil(size)
}

/// Slice one page out of the full row set.
///
/// Pages are 1-indexed. A page past the end yields an empty result, not an
/// error.
pub fn paginate(rows: Vec<Record>, size: u64, page: u64) -> (Vec<Record>, Pagination) {
    let count = rows.len() as u64;
    let start = (page - 1).saturating_mul(size);
    let slice: Vec<Record> = rows
        .into_iter()
        .skip(start as usize)
        .take(size as usize)
        .collect();
    (
        slice,
        Pagination {
            count,
            page,
            pages: page_count(count, size),
            size,
        },
    )
}

/// Read the 1-indexed `page` query parameter, defaulting to 1.
pub fn page_param(query: &std::collections::HashMap<String, String>) -> Result<u64, ApiError> {
    let Some(raw) = query.get("page") else {
        return Ok(1);
    };
    match raw.parse::<u64>() {
        Ok(page) if page >= 1 => Ok(page),
        Ok(_) => Err(ApiError::Validation(vec![
            ErrorDetail::new("value_error.number.not_ge")
                .msg("page must be greater than or equal to 1")
                .loc(vec!["query", "page"]),
        ])),
        Err(_) => Err(ApiError::Validation(vec![
            ErrorDetail::new("type_error.integer")
                .msg("page must be an integer")
                .loc(vec!["query", "page"]),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| json!({"id": i}).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn empty_collection_has_zero_pages() {
        let (slice, pagination) = paginate(rows(0), 20, 1);
        assert!(slice.is_empty());
        assert_eq!(
            pagination,
            Pagination {
                count: 0,
                page: 1,
                pages: 0,
                size: 20
            }
        );
    }

    #[test]
    fn second_page_of_twenty_five_rows_has_five() {
        let (slice, pagination) = paginate(rows(25), 20, 2);
        assert_eq!(slice.len(), 5);
        assert_eq!(
            pagination,
            Pagination {
                count: 25,
                page: 2,
                pages: 2,
                size: 20
            }
        );
    }

    #[test]
    fn page_past_the_end_is_empty_not_an_error() {
        let (slice, pagination) = paginate(rows(3), 20, 9);
        assert!(slice.is_empty());
        assert_eq!(pagination.pages, 1);
        assert_eq!(pagination.page, 9);
    }

    #[test]
    fn page_param_defaults_and_validates() {
        let mut query = HashMap::new();
        assert_eq!(page_param(&query).unwrap(), 1);

        query.insert("page".to_string(), "3".to_string());
        assert_eq!(page_param(&query).unwrap(), 3);

        query.insert("page".to_string(), "0".to_string());
        assert!(page_param(&query).is_err());

        query.insert("page".to_string(), "two".to_string());
        let err = page_param(&query).unwrap_err();
        assert_eq!(
            err.details()[0].loc,
            Some(vec!["query".to_string(), "page".to_string()])
        );
    }

    proptest! {
        #[test]
        fn page_count_is_exact_ceiling(count in 0u64..100_000, size in 1u64..1_000) {
            let expected = (count + ((size - count % size) % size)) / size;
            prop_assert_eq!(page_count(count, size), expected);
            // And matches the arithmetic definition.
            prop_assert_eq!(page_count(count, size), (count as f64 / size as f64).ceil() as u64);
        }

        #[test]
        fn every_row_lands_on_exactly_one_page(count in 0usize..200, size in 1u64..20) {
            let total: usize = (1..=page_count(count as u64, size).max(1))
                .map(|page| paginate(rows(count), size, page).0.len())
                .sum();
            prop_assert_eq!(total, count);
        }
    }
}
