//! Text folding shared by rule matching, town lookups and header resolution.
//!
//! Every comparison in the crate goes through [`normalize`], so an address,
//! a rule pattern and a coordinate-table town fold the same way.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Uppercases, folds accents to their base letter (`á` -> `A`, `ñ` -> `N`,
/// `ç` -> `C`), turns every non-alphanumeric character into a space and
/// collapses whitespace runs. Total over all input.
///
/// ```
/// use reparto::core::normalize::normalize;
///
/// assert_eq!(normalize("  Vila-real,  Plaça Major "), "VILA REAL PLACA MAJOR");
/// assert_eq!(normalize("Dir. entrega"), "DIR ENTREGA");
/// ```
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        for upper in c.to_uppercase() {
            if upper.is_alphanumeric() && !is_combining_mark(upper) {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(upper);
            } else {
                pending_space = true;
            }
        }
    }

    out
}

/// Missing input folds to the empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}
