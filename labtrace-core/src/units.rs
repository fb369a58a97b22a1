//! Conversion of authored quantities into SI values: liters for volumes, molar for
//! concentrations.

use labtrace_schemas::quantity::Quantity;

fn volume_factor(unit: &str) -> Option<f64> {
    match unit {
        "l" | "liter" | "liters" | "litre" | "litres" => Some(1.0),
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => Some(1e-3),
        "ul" | "µl" | "μl" | "microliter" | "microliters" | "microlitre" | "microlitres" => {
            Some(1e-6)
        }
        _ => None,
    }
}

fn molar_factor(unit: &str) -> Option<f64> {
    match unit {
        "m" | "molar" => Some(1.0),
        "mm" | "millimolar" => Some(1e-3),
        "um" | "µm" | "μm" | "micromolar" => Some(1e-6),
        "nm" | "nanomolar" => Some(1e-9),
        _ => None,
    }
}

fn is_mg_per_ml(unit: &str) -> bool {
    matches!(unit.replace(' ', "").as_str(), "mg/ml" | "mg/milliliter")
}

fn finite_components(quantity: &Quantity) -> Option<(f64, String)> {
    let (value, unit) = quantity.components()?;
    if !value.is_finite() {
        return None;
    }
    Some((value, unit.to_lowercase()))
}

pub fn parse_volume_to_liters(quantity: &Quantity) -> Option<f64> {
    let (value, unit) = finite_components(quantity)?;
    volume_factor(&unit).map(|factor| value * factor)
}

/// Mass concentrations (`mg/mL`) need the molar mass in g/mol to convert.
pub fn parse_concentration_to_molar(quantity: &Quantity, molar_mass: Option<f64>) -> Option<f64> {
    let (value, unit) = finite_components(quantity)?;
    if let Some(factor) = molar_factor(&unit) {
        return Some(value * factor);
    }
    if is_mg_per_ml(&unit) {
        let molar_mass = molar_mass.filter(|m| m.is_finite() && *m > 0.0)?;
        return Some((value / 1000.0) / molar_mass);
    }
    None
}

pub fn normalize_volume(quantity: Option<&Quantity>, fallback: f64) -> f64 {
    quantity
        .and_then(parse_volume_to_liters)
        .unwrap_or(fallback)
}

pub fn normalize_concentration(
    quantity: Option<&Quantity>,
    molar_mass: Option<f64>,
    fallback: f64,
) -> f64 {
    quantity
        .and_then(|q| parse_concentration_to_molar(q, molar_mass))
        .unwrap_or(fallback)
}

/// Renders a volume in liters with the largest unit that keeps it above one.
pub fn format_volume(liters: f64) -> String {
    let (value, unit) = if liters.abs() >= 1.0 {
        (liters, "L")
    } else if liters.abs() >= 1e-3 {
        (liters * 1e3, "mL")
    } else {
        (liters * 1e6, "µL")
    };
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, unit)
}
