//! Operational limit extraction (maximum quantity, average stay,
//! points).

use regex::Regex;
use rust_decimal::Decimal;

use crate::models::OperationalLimits;

use super::money::parse_brazilian_amount;
use super::patterns::{
    window_after_label, AVERAGE_STAY_PATTERNS, DECIMAL_NEARBY, INTEGER_NEARBY,
    MAX_QUANTITY_PATTERNS, POINTS_PATTERNS,
};
use super::CategoryExtraction;

/// Extract the operational limits from a block.
///
/// Confidence is the share of the three fields found, scaled to 0-100,
/// minus 10 for each implausible value (quantity over 999, stay over
/// 365 days).
pub fn extract(block: &str) -> CategoryExtraction<OperationalLimits> {
    let limits = OperationalLimits {
        max_quantity: extract_integer(block, &MAX_QUANTITY_PATTERNS, "Quantidade Máxima"),
        average_stay: extract_decimal(block, &AVERAGE_STAY_PATTERNS, "Média Permanência"),
        points: extract_integer(block, &POINTS_PATTERNS, "Pontos"),
    };

    let found = [
        limits.max_quantity > 0,
        limits.average_stay > Decimal::ZERO,
        limits.points > 0,
    ]
    .iter()
    .filter(|found| **found)
    .count();

    let mut confidence = ((found as f32 / 3.0) * 100.0).round();
    if limits.max_quantity > 999 {
        confidence = (confidence - 10.0).max(0.0);
    }
    if limits.average_stay > Decimal::from(365) {
        confidence = (confidence - 10.0).max(0.0);
    }

    CategoryExtraction::new(limits, confidence)
}

fn extract_integer(block: &str, patterns: &[Regex], label: &str) -> u32 {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(block) {
            if let Ok(value) = caps[1].parse::<u32>() {
                if value > 0 {
                    return value;
                }
            }
        }
    }

    window_after_label(block, label, 100)
        .and_then(|window| INTEGER_NEARBY.captures(window))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

fn extract_decimal(block: &str, patterns: &[Regex], label: &str) -> Decimal {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(block) {
            let value = parse_brazilian_amount(&caps[1]);
            if value > Decimal::ZERO {
                return value;
            }
        }
    }

    window_after_label(block, label, 100)
        .and_then(|window| DECIMAL_NEARBY.captures(window))
        .map(|caps| parse_brazilian_amount(&caps[1]))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_all_three_fields() {
        let block = "Quantidade Máxima: 2\nMédia Permanência: 4,5\nPontos: 180";
        let result = extract(block);
        assert_eq!(result.value.max_quantity, 2);
        assert_eq!(result.value.average_stay, Decimal::from_str("4.5").unwrap());
        assert_eq!(result.value.points, 180);
        assert_eq!(result.confidence, 100.0);
    }

    #[test]
    fn test_implausible_quantity_is_penalized() {
        let block = "Quantidade Máxima: 5000\nMédia Permanência: 3\nPontos: 50";
        let result = extract(block);
        assert_eq!(result.value.max_quantity, 5000);
        assert_eq!(result.confidence, 90.0);
    }

    #[test]
    fn test_implausible_stay_is_penalized() {
        let block = "Média Permanência: 400";
        let result = extract(block);
        // 1/3 fields found, minus the stay penalty.
        assert_eq!(result.confidence, 23.0);
    }

    #[test]
    fn test_empty_block() {
        let result = extract("sem limites operacionais");
        assert_eq!(result.value, OperationalLimits::default());
        assert_eq!(result.confidence, 0.0);
    }
}
