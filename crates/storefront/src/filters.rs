//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Grid subtitle for a colour count: `1 Color`, `3 Colors`.
///
/// Usage in templates: `{{ product.color_count()|colors }}`
#[askama::filter_fn]
pub fn colors(count: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(colors_label(&count.to_string()))
}

fn colors_label(count: &str) -> String {
    if count == "1" {
        "1 Color".to_string()
    } else {
        format!("{count} Colors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_label() {
        assert_eq!(colors_label("1"), "1 Color");
        assert_eq!(colors_label("4"), "4 Colors");
        assert_eq!(colors_label("0"), "0 Colors");
    }
}
