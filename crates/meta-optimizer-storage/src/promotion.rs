//! Type promotion lattice for existing columns.

use crate::column_type::{ColumnType, TypeFamily};

/// Decide the type a column must have to hold both its existing data (declared
/// as `current`) and a value classified as `incoming`.
///
/// The result is never narrower than `current`. Pairs the lattice does not
/// cover keep `current`.
pub fn resolve(current: &ColumnType, incoming: &ColumnType) -> ColumnType {
    if current.same_category(incoming) {
        return current.clone();
    }

    let widened = match (current.family(), incoming.family()) {
        (TypeFamily::Integer, TypeFamily::Float | TypeFamily::Text) => true,
        (TypeFamily::Temporal, TypeFamily::Text) => true,
        (TypeFamily::Integer, TypeFamily::Integer)
        | (TypeFamily::Float, TypeFamily::Float)
        | (TypeFamily::Text, TypeFamily::Text) => current.tier() < incoming.tier(),
        _ => false,
    };

    if widened {
        incoming.clone()
    } else {
        current.clone()
    }
}

/// Final size of a wide-string column.
///
/// `required` is the larger of the incoming value's length and the longest
/// value already stored. Lengths past the `VARCHAR` limit become `TEXT`.
pub fn size_wide_string(incoming_len: usize, stored_max_len: usize) -> ColumnType {
    ColumnType::for_text_length(incoming_len.max(stored_max_len))
}

/// Whether `current` already holds a string of `len` characters without change.
pub fn fits_declared_size(current: &ColumnType, len: usize) -> bool {
    match current {
        ColumnType::Varchar(n) => len <= *n as usize,
        _ => false,
    }
}
