//! Page layout tables for both portals
//!
//! Every structural assumption about the served HTML lives here.

use crate::scrape::{Field, Locator};

const fn value_of(name: &'static str, selector: &'static str) -> Field {
    Field {
        name,
        locator: Locator::Attribute {
            selector,
            attribute: "value",
        },
    }
}

const fn text_of(name: &'static str, selector: &'static str) -> Field {
    Field {
        name,
        locator: Locator::Text { selector },
    }
}

// Captive portal (secure.etecsa.net)

/// Client IP marker and anti-forgery token on the landing page
pub(crate) const CAPTIVE_TOKENS: [Field; 2] = [
    value_of("wlanuserip", "#wlanuserip"),
    value_of("CSRFHW", r#"[name="CSRFHW"]"#),
];

/// Account state, credit, expiration date and access areas
pub(crate) const ACCOUNT_SNAPSHOT: [Field; 4] = [
    text_of("account_state", "#sessioninfo > tbody > tr:nth-of-type(1) > td:nth-of-type(2)"),
    text_of("credit", "#sessioninfo > tbody > tr:nth-of-type(2) > td:nth-of-type(2)"),
    text_of("expiration_date", "#sessioninfo > tbody > tr:nth-of-type(3) > td:nth-of-type(2)"),
    text_of("access_areas", "#sessioninfo > tbody > tr:nth-of-type(4) > td:nth-of-type(2)"),
];

/// Cells of the previous-sessions table
pub(crate) const SESSION_HISTORY_CELLS: &str = "#sesiontraza > tbody > tr > td";
pub(crate) const SESSION_ROW_STRIDE: usize = 3;

// User portal (www.portal.nauta.cu)

pub(crate) const PORTAL_TOKENS: [Field; 1] = [value_of("csrf", r#"[name="csrf"]"#)];

/// The eight fields of the user info page, in display order
pub(crate) const ACCOUNT_DATA: [Field; 8] = [
    text_of(
        "username",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(2) > div > p",
    ),
    text_of(
        "blocking_date",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(3) > div:nth-of-type(1) > p",
    ),
    text_of(
        "elimination_date",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(3) > div:nth-of-type(2) > p",
    ),
    text_of(
        "account_type",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(4) > div:nth-of-type(1) > p",
    ),
    text_of(
        "service_type",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(4) > div:nth-of-type(2) > p",
    ),
    text_of(
        "available_balance",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(5) > div:nth-of-type(1) > p",
    ),
    text_of(
        "remaining_time",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(5) > div:nth-of-type(2) > p",
    ),
    text_of(
        "email_account",
        "#content > div:nth-of-type(2) > div > div > div > div:nth-of-type(6) > div > p",
    ),
];

/// Year-month choices offered on each details landing page
pub(crate) const PERIOD_OPTIONS: &str = r#"[name="year_month"] > option"#;

/// Summary counters of one period
pub(crate) const SUMMARY_CELLS: &str = ".card-stats-number";

/// Cells of one page of a details listing
pub(crate) const LIST_CELLS: &str = "body > div:nth-of-type(1) > div > table tr > td";

/// Rows the server puts on each listing page
pub(crate) const ROWS_PER_PAGE: u32 = 15;

pub(crate) const CONNECTION_ROW_STRIDE: usize = 6;
pub(crate) const RECHARGE_ROW_STRIDE: usize = 4;
pub(crate) const TRANSFER_ROW_STRIDE: usize = 3;

/// Number of listing pages the client requests for `items` rows
///
/// Always one more than the number of full pages, so an exact multiple of
/// [`ROWS_PER_PAGE`] yields a trailing (empty) page.
pub(crate) fn page_count(items: u32) -> u32 {
    items / ROWS_PER_PAGE + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape;
    use proptest::prelude::*;

    #[test]
    fn test_page_count_boundaries() {
        assert_eq!(page_count(0), 1);
        assert_eq!(page_count(14), 1);
        assert_eq!(page_count(15), 2);
        assert_eq!(page_count(16), 2);
        assert_eq!(page_count(30), 3);
    }

    #[test]
    fn test_every_selector_parses() {
        let fields = CAPTIVE_TOKENS
            .iter()
            .chain(&ACCOUNT_SNAPSHOT)
            .chain(&PORTAL_TOKENS)
            .chain(&ACCOUNT_DATA);
        for field in fields {
            let css = match field.locator {
                Locator::Attribute { selector, .. } | Locator::Text { selector } => selector,
            };
            assert!(scrape::selector(css).is_ok(), "{} selector failed", field.name);
        }
        for css in [SESSION_HISTORY_CELLS, PERIOD_OPTIONS, SUMMARY_CELLS, LIST_CELLS] {
            assert!(scrape::selector(css).is_ok(), "{} failed", css);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(10))]

        #[test]
        fn prop_pages_cover_all_rows(items in 0u32..10_000) {
            let pages = page_count(items);
            prop_assert!(pages * ROWS_PER_PAGE > items);
            prop_assert!((pages - 1) * ROWS_PER_PAGE <= items);
        }
    }
}
