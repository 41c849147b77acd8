// ============================================================================
// Enum : Currency et table de taux de change
// ============================================================================
// Les six devises d'affichage supportées par le wallet, et la table des taux
// (base USD) alimentée par l'oracle.
//
// CONCEPTS RUST :
// 1. Enum "C-like" : pas de données associées, Copy + Ord (clé de BTreeMap)
// 2. FromStr : parsing depuis une chaîne ("EUR" -> Currency::Eur)
// 3. Display : affichage avec {} (Currency::Eur -> "EUR")
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Devise d'affichage
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    /// BigBlackCoin, le token ERC-20 du wallet
    Bbc,
    Eth,
    Btc,
}

impl Currency {
    /// Toutes les devises, dans l'ordre d'interrogation de l'oracle
    pub const ALL: [Currency; 6] = [
        Currency::Bbc,
        Currency::Eth,
        Currency::Btc,
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
    ];

    /// Symbole tel qu'attendu par l'oracle et le stockage persistant
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Bbc => "BBC",
            Currency::Eth => "ETH",
            Currency::Btc => "BTC",
        }
    }

    /// Taux par défaut (en USD) avant le premier rafraîchissement depuis l'oracle
    pub fn default_rate(&self) -> f64 {
        match self {
            Currency::Bbc => 1.0,
            Currency::Eth => 3000.0,
            Currency::Btc => 50000.0,
            Currency::Usd => 1.0,
            Currency::Eur => 0.92,
            Currency::Gbp => 0.79,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "BBC" => Ok(Currency::Bbc),
            "ETH" => Ok(Currency::Eth),
            "BTC" => Ok(Currency::Btc),
            other => bail!("Devise non supportée : {}", other),
        }
    }
}

// ============================================================================
// ExchangeRates
// ============================================================================

/// Table des taux de change : devise -> valeur d'une unité en USD
///
/// CONCEPT RUST : Newtype pattern
/// - Encapsule une BTreeMap pour n'exposer que les opérations utiles
/// - BTreeMap plutôt que HashMap : itération dans un ordre stable (logs, tests)
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRates {
    rates: BTreeMap<Currency, f64>,
}

impl ExchangeRates {
    /// Taux courant, 1.0 si la devise n'a jamais été renseignée
    pub fn get(&self, currency: Currency) -> f64 {
        self.rates.get(&currency).copied().unwrap_or(1.0)
    }

    pub fn set(&mut self, currency: Currency, rate: f64) {
        self.rates.insert(currency, rate);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Currency, f64)> + '_ {
        self.rates.iter().map(|(c, r)| (*c, *r))
    }

    /// Convertit `amount` (exprimé dans `from`) vers `to`, en passant par l'USD
    ///
    /// Si `from == to`, le montant est retourné tel quel quel que soit le
    /// contenu de la table.
    ///
    /// Un taux cible nul (ou NaN) est remplacé par 1.0 : le montant est alors
    /// affiché en USD plutôt que de retourner 0 ou l'infini.
    pub fn convert(&self, amount: f64, from: Currency, to: Currency) -> f64 {
        if from == to {
            return amount;
        }

        let in_usd = amount * self.get(from);
        let target_rate = self.get(to);
        if target_rate == 0.0 || target_rate.is_nan() {
            return in_usd;
        }
        in_usd / target_rate
    }
}

impl Default for ExchangeRates {
    fn default() -> Self {
        let rates = Currency::ALL
            .iter()
            .map(|c| (*c, c.default_rate()))
            .collect();
        Self { rates }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_roundtrip_str() {
        for currency in Currency::ALL {
            assert_eq!(currency.as_str().parse::<Currency>().unwrap(), currency);
        }
        assert!("JPY".parse::<Currency>().is_err());
        assert!("usd".parse::<Currency>().is_err());
    }

    #[test]
    fn test_default_rates() {
        let rates = ExchangeRates::default();
        assert_eq!(rates.get(Currency::Eth), 3000.0);
        assert_eq!(rates.get(Currency::Eur), 0.92);
        assert_eq!(rates.iter().count(), 6);
    }

    #[test]
    fn test_convert_same_currency_is_identity() {
        let mut rates = ExchangeRates::default();
        rates.set(Currency::Bbc, 123.0);
        rates.set(Currency::Usd, 0.0);

        assert_eq!(rates.convert(42.5, Currency::Bbc, Currency::Bbc), 42.5);
        assert_eq!(rates.convert(42.5, Currency::Usd, Currency::Usd), 42.5);
    }

    #[test]
    fn test_convert_through_usd() {
        let rates = ExchangeRates::default();
        // 2 ETH = 6000 USD = 6000 / 0.92 EUR
        let eur = rates.convert(2.0, Currency::Eth, Currency::Eur);
        assert!((eur - 6000.0 / 0.92).abs() < 1e-9);
    }

    #[test]
    fn test_convert_with_zero_target_rate_falls_back_to_usd() {
        let mut rates = ExchangeRates::default();
        rates.set(Currency::Gbp, 0.0);

        // 2 ETH = 6000 USD, affiché tel quel
        assert_eq!(rates.convert(2.0, Currency::Eth, Currency::Gbp), 6000.0);
    }

    #[test]
    fn test_default_currency_is_usd() {
        assert_eq!(Currency::default(), Currency::Usd);
    }
}
