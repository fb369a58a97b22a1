use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement<T> {
    pub value: T,
    pub unit: String,
}

/// A human-authored amount, as it appears in event logs and protocol templates.
///
/// Authors write either `{ value: 10, unit: "uL" }` or a single string such as
/// `"10 uL"`. A bare number is accepted on input but carries no unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Measured(Measurement<f64>),
    Text(String),
    Number(f64),
}

impl Quantity {
    pub fn new(value: f64, unit: &str) -> Self {
        Quantity::Measured(Measurement {
            value,
            unit: unit.to_string(),
        })
    }

    /// Splits the quantity into its numeric part and unit text.
    ///
    /// Returns `None` when no number can be read. The unit is returned as written;
    /// callers are responsible for case folding.
    pub fn components(&self) -> Option<(f64, String)> {
        match self {
            Quantity::Measured(m) => Some((m.value, m.unit.trim().to_string())),
            Quantity::Number(n) => Some((*n, String::new())),
            Quantity::Text(text) => split_number_and_unit(text),
        }
    }
}

impl From<&str> for Quantity {
    fn from(text: &str) -> Self {
        Quantity::Text(text.to_string())
    }
}

fn split_number_and_unit(text: &str) -> Option<(f64, String)> {
    let text = text.trim();
    let numeric_len = text
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;

    // Shrink until the prefix parses; "1e" in "1em" style input is not an exponent.
    let mut end = numeric_len;
    while end > 0 {
        if let Ok(value) = text[..end].parse::<f64>() {
            return Some((value, text[end..].trim().to_string()));
        }
        end -= 1;
    }
    None
}
