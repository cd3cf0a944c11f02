//! Monetary value parsing for Brazilian-formatted amounts.

use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{window_after_label, DECIMAL_NEARBY};

/// Parse a Brazilian-formatted amount (e.g., "1.234,56" or "184,10").
///
/// Both separators present means dots are thousands and the comma is
/// the decimal mark. A lone comma is decimal when at most two digits
/// follow it, otherwise a thousands separator. Values round to two
/// decimal places; text that yields no number parses as zero, so a
/// missing cell never aborts a record.
pub fn parse_brazilian_amount(s: &str) -> Decimal {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = if cleaned.contains(',') && cleaned.contains('.') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.contains(',') {
        match cleaned.rsplit_once(',') {
            Some((_, decimals)) if decimals.len() <= 2 => cleaned.replace(',', "."),
            _ => cleaned.replace(',', ""),
        }
    } else {
        cleaned
    };

    Decimal::from_str(&normalized)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

/// Extract one labeled amount from a block.
///
/// Runs the priority patterns first; when none yields a positive
/// amount, falls back to the first bare decimal within 100 characters
/// of the label.
pub fn extract_labeled_amount(block: &str, patterns: &[Regex], label: &str) -> Decimal {
    for pattern in patterns {
        if let Some(caps) = pattern.captures(block) {
            let amount = parse_brazilian_amount(&caps[1]);
            if amount > Decimal::ZERO {
                return amount;
            }
        }
    }

    window_after_label(block, label, 100)
        .and_then(|window| DECIMAL_NEARBY.captures(window))
        .map(|caps| parse_brazilian_amount(&caps[1]))
        .unwrap_or(Decimal::ZERO)
}

/// Format an amount in Brazilian style (1.234,56).
pub fn format_brazilian_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount);
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && *c != '-' && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    format!("{},{}", formatted, decimal_part)
}
