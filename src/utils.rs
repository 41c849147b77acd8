// ============================================================================
// Module : utils
// ============================================================================
// Helpers d'affichage et de conversion d'unités
//
// Les balances on-chain sont toujours des entiers en "base units" (wei pour
// un token à 18 décimales). La conversion vers un décimal lisible ne se fait
// qu'au moment de l'affichage, avec le diviseur 10^decimals.
//
// CONCEPTS RUST :
// 1. U256 (alloy-primitives) : entier non signé 256 bits, pas de perte de précision
// 2. Manipulation de &str : slicing, trim_end_matches, chars()
// ============================================================================

use anyhow::{bail, Context, Result};
use alloy_primitives::U256;
use chrono::Utc;

use crate::models::Currency;

/// Formatte une balance en base units vers une chaîne décimale
///
/// Les zéros de fin de la partie fractionnaire sont supprimés :
/// - 1_500_000_000_000_000_000 (18 décimales) -> "1.5"
/// - 0 -> "0"
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let digits = value.to_string();
    let decimals = decimals as usize;

    if digits.len() <= decimals {
        // Que des décimales : on complète avec des zéros à gauche
        let padded = format!("{:0>width$}", digits, width = decimals);
        return format!("0.{}", padded.trim_end_matches('0'));
    }

    let (whole, fraction) = digits.split_at(digits.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Convertit un montant décimal saisi par l'utilisateur en base units
///
/// CONCEPT RUST : Result et bail!
/// - Retourne une erreur explicite plutôt que de tronquer silencieusement
/// - "1.5" avec 18 décimales -> 1_500_000_000_000_000_000
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        bail!("Montant vide");
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        bail!("Montant invalide : {}", amount);
    }
    if fraction.len() > decimals as usize {
        bail!(
            "Trop de décimales dans {} (maximum {})",
            amount,
            decimals
        );
    }

    let combined = format!(
        "{}{:0<width$}",
        whole,
        fraction,
        width = decimals as usize
    );
    let combined = combined.trim_start_matches('0');
    if combined.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(combined, 10)
        .with_context(|| format!("Montant hors limites : {}", amount))
}

/// Balance en base units -> nombre décimal pour l'affichage et les conversions
pub fn to_display(value: U256, decimals: u8) -> f64 {
    // format_units produit toujours un décimal valide
    format_units(value, decimals).parse().unwrap_or(0.0)
}

/// Raccourcit une adresse : "0x1234...abcd"
pub fn format_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Raccourcit un hash de transaction en gardant `chars` caractères de chaque côté
pub fn shorten_hash(hash: &str, chars: usize) -> String {
    if hash.len() <= chars * 2 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..chars], &hash[hash.len() - chars..])
}

/// Vérifie le format d'une adresse : "0x" suivi de 40 caractères hexadécimaux
///
/// C'est à l'appelant (formulaire d'envoi, CLI) de valider avant d'appeler
/// `WalletStore::send_token`, le store ne revalide pas.
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// "3 minutes ago", "1 day ago", "just now"...
///
/// `now_ms` est passé en paramètre pour pouvoir tester sans horloge réelle.
pub fn time_ago_from(timestamp_ms: i64, now_ms: i64) -> String {
    let seconds = (now_ms - timestamp_ms) / 1000;

    const UNITS: [(&str, i64); 6] = [
        ("year", 31_536_000),
        ("month", 2_592_000),
        ("week", 604_800),
        ("day", 86_400),
        ("hour", 3_600),
        ("minute", 60),
    ];

    for (unit, seconds_in_unit) in UNITS {
        let count = seconds / seconds_in_unit;
        if count >= 1 {
            let plural = if count > 1 { "s" } else { "" };
            return format!("{} {}{} ago", count, unit, plural);
        }
    }

    "just now".to_string()
}

pub fn time_ago(timestamp_ms: i64) -> String {
    time_ago_from(timestamp_ms, Utc::now().timestamp_millis())
}

/// Formatte un montant dans une devise
///
/// Les devises crypto (BBC, ETH, BTC) sont affichées avec le symbole "$",
/// entre 2 et 6 décimales, séparateur de milliers ",".
pub fn format_currency(amount: f64, currency: Currency) -> String {
    let symbol = match currency {
        Currency::Eur => "€",
        Currency::Gbp => "£",
        Currency::Usd | Currency::Bbc | Currency::Eth | Currency::Btc => "$",
    };

    let sign = if amount < 0.0 { "-" } else { "" };
    let fixed = format!("{:.6}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    // Garde au moins 2 décimales
    let mut fraction = fraction.trim_end_matches('0').to_string();
    while fraction.len() < 2 {
        fraction.push('0');
    }

    format!("{}{}{}.{}", sign, symbol, group_thousands(whole), fraction)
}

/// "1234567" -> "1,234,567"
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(eth(3), 18), "3");
        assert_eq!(format_units(U256::from(1_500_000_000_000_000_000u128), 18), "1.5");
        assert_eq!(format_units(U256::from(1u64), 18), "0.000000000000000001");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("10", 18).unwrap(), eth(10));
        assert_eq!(
            parse_units("1.5", 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(parse_units("0.0", 18).unwrap(), U256::ZERO);
        assert_eq!(parse_units(".25", 2).unwrap(), U256::from(25u64));
    }

    #[test]
    fn test_parse_units_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units("-1", 18).is_err());
        assert!(parse_units("1.123", 2).is_err());
    }

    #[test]
    fn test_to_display() {
        assert_eq!(to_display(eth(2), 18), 2.0);
        assert_eq!(to_display(U256::from(250u64), 2), 2.5);
    }

    #[test]
    fn test_address_helpers() {
        let addr = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
        assert!(is_valid_address(addr));
        assert!(!is_valid_address("0xRecipient"));
        assert!(!is_valid_address("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert_eq!(format_address(addr), "0xf39F...2266");
        assert_eq!(shorten_hash("0x0123456789abcdef", 4), "0x01...cdef");
    }

    #[test]
    fn test_time_ago() {
        let now = 10_000_000_000;
        assert_eq!(time_ago_from(now - 5_000, now), "just now");
        assert_eq!(time_ago_from(now - 60_000, now), "1 minute ago");
        assert_eq!(time_ago_from(now - 3 * 86_400_000, now), "3 days ago");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234.5, Currency::Usd), "$1,234.50");
        assert_eq!(format_currency(0.123456, Currency::Eur), "€0.123456");
        assert_eq!(format_currency(1_000_000.0, Currency::Btc), "$1,000,000.00");
    }
}
