use serde::{Deserialize, Serialize};
use std::fmt;

/// Currencies accepted by the payments API, amounts always in minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Indonesian Rupiah (no decimal places)
    IDR,
    /// Malaysian Ringgit (2 decimal places)
    MYR,
    /// US Dollar (2 decimal places)
    USD,
}

impl Currency {
    /// Returns the number of minor-unit digits for this currency
    /// - IDR: 0 (no decimals)
    /// - MYR/USD: 2 (cents)
    pub fn scale(&self) -> u32 {
        match self {
            Currency::IDR => 0,
            Currency::MYR | Currency::USD => 2,
        }
    }

    /// Validates a charge amount expressed in minor units
    pub fn validate_minor_amount(&self, amount: i64) -> Result<(), String> {
        if amount <= 0 {
            return Err(format!("{} amount must be positive, got {}", self, amount));
        }
        Ok(())
    }

    /// Formats a minor-unit amount for display with the correct decimal places
    pub fn format_minor(&self, amount: i64) -> String {
        let scale = self.scale();
        if scale == 0 {
            return format!("{} {}", self, amount);
        }
        let divisor = 10_i64.pow(scale);
        format!(
            "{} {}.{:0width$}",
            self,
            amount / divisor,
            (amount % divisor).abs(),
            width = scale as usize
        )
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::IDR => write!(f, "IDR"),
            Currency::MYR => write!(f, "MYR"),
            Currency::USD => write!(f, "USD"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IDR" => Ok(Currency::IDR),
            "MYR" => Ok(Currency::MYR),
            "USD" => Ok(Currency::USD),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}
