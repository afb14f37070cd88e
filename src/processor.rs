//! Tag value normalization for group-key construction.
//!
//! Raw tag values are free-form text. Before a value participates in a
//! grouping key it can be normalized by a [`ValueProcessor`], so that
//! near-equal encodings (e.g. `"0.300000"` vs `"0.3000001"`) collapse to
//! the same key instead of splitting a series into spurious groups.

/// Normalizes a raw tag value before it participates in grouping.
///
/// Implementations must be pure: the same input always yields the same
/// output within one sort call.
pub trait ValueProcessor {
    /// Returns the normalized form of `raw`.
    fn process(&self, raw: &str) -> String;

    /// Clones this processor into a new boxed instance.
    fn clone_boxed(&self) -> Box<dyn ValueProcessor>;
}

/// Truncates numeric values after a fixed number of decimal places.
///
/// Multi-valued strings (components separated by `\`, the convention for
/// position and orientation tags) are truncated component-wise. Components
/// that do not parse as numbers pass through unchanged, as do values with
/// fewer decimal places than the limit.
///
/// # Examples
///
/// ```
/// use stacksort::{CutDecimalPlaces, ValueProcessor};
///
/// let cut = CutDecimalPlaces::new(2);
/// assert_eq!(cut.process("0.300000"), "0.30");
/// assert_eq!(cut.process("1.5\\-12.993841\\0"), "1.50\\-12.99\\0.00");
/// assert_eq!(cut.process("not a number"), "not a number");
/// ```
#[derive(Debug, Clone)]
pub struct CutDecimalPlaces {
    decimal_places: usize,
}

impl CutDecimalPlaces {
    /// Creates a processor that keeps `decimal_places` digits after the
    /// decimal point.
    #[must_use]
    pub fn new(decimal_places: usize) -> Self {
        Self { decimal_places }
    }

    /// The configured number of decimal places.
    #[must_use]
    pub fn decimal_places(&self) -> usize {
        self.decimal_places
    }

    fn cut_component(&self, component: &str) -> String {
        let trimmed = component.trim();
        match trimmed.parse::<f64>() {
            Ok(value) => format!("{value:.places$}", places = self.decimal_places),
            Err(_) => component.to_string(),
        }
    }
}

impl ValueProcessor for CutDecimalPlaces {
    fn process(&self, raw: &str) -> String {
        raw.split('\\').map(|c| self.cut_component(c)).collect::<Vec<_>>().join("\\")
    }

    fn clone_boxed(&self) -> Box<dyn ValueProcessor> {
        Box::new(self.clone())
    }
}
