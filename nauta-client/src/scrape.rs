//! Locator-driven HTML extraction
//!
//! Pages are read through small declarative tables (see [`crate::layout`]):
//! each [`Field`] names a value and where it lives in the document. A missing
//! node or attribute always surfaces as `NautaError::Parse` so a layout change
//! on the server side is distinguishable from a failed request.

use crate::error::NautaError;
use scraper::{ElementRef, Html, Selector};

/// Where a value lives in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Locator {
    /// Attribute of the first element matching the selector
    Attribute {
        selector: &'static str,
        attribute: &'static str,
    },
    /// Trimmed text of the first element matching the selector
    Text { selector: &'static str },
}

/// A named value and its locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Field {
    pub name: &'static str,
    pub locator: Locator,
}

pub(crate) fn selector(css: &str) -> Result<Selector, NautaError> {
    Selector::parse(css).map_err(|e| NautaError::Parse(format!("invalid selector `{}`: {:?}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn locate(document: &Html, field: &Field) -> Result<String, NautaError> {
    let (css, attribute) = match field.locator {
        Locator::Attribute { selector, attribute } => (selector, Some(attribute)),
        Locator::Text { selector } => (selector, None),
    };

    let element = document
        .select(&selector(css)?)
        .next()
        .ok_or_else(|| NautaError::Parse(format!("element for `{}` not found ({})", field.name, css)))?;

    match attribute {
        Some(attribute) => element.value().attr(attribute).map(str::to_string).ok_or_else(|| {
            NautaError::Parse(format!(
                "attribute `{}` for `{}` not found ({})",
                attribute, field.name, css
            ))
        }),
        None => Ok(element_text(element)),
    }
}

/// Extract every field of a locator table, in table order
pub(crate) fn extract<const N: usize>(document: &Html, fields: &[Field; N]) -> Result<[String; N], NautaError> {
    let mut values: [String; N] = std::array::from_fn(|_| String::new());
    for (value, field) in values.iter_mut().zip(fields) {
        *value = locate(document, field)?;
    }
    Ok(values)
}

/// Trimmed text of every element matching `css`, in document order
pub(crate) fn texts(document: &Html, css: &str) -> Result<Vec<String>, NautaError> {
    Ok(document.select(&selector(css)?).map(element_text).collect())
}

/// `attribute` of every element matching `css`; each match must carry it
pub(crate) fn attributes(document: &Html, css: &str, attribute: &str) -> Result<Vec<String>, NautaError> {
    document
        .select(&selector(css)?)
        .map(|element| {
            element
                .value()
                .attr(attribute)
                .map(str::to_string)
                .ok_or_else(|| NautaError::Parse(format!("attribute `{}` missing on `{}`", attribute, css)))
        })
        .collect()
}

/// Split a flat cell sequence into rows of `stride` cells
pub(crate) fn rows<'a>(cells: &'a [String], stride: usize, what: &str) -> Result<Vec<&'a [String]>, NautaError> {
    if stride == 0 || cells.len() % stride != 0 {
        return Err(NautaError::Parse(format!(
            "{} table has {} cells, not a multiple of {} columns",
            what,
            cells.len(),
            stride
        )));
    }
    Ok(cells.chunks_exact(stride).collect())
}
