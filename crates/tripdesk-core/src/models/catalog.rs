//! Catalog records: packages and partner hotels.

use serde::{Deserialize, Serialize};

/// A sellable travel package from `/packages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelPackage {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub nights: Option<u32>,
    /// Price per person in minor currency units.
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl TravelPackage {
    /// "5N Bali" style short label.
    pub fn short_label(&self) -> String {
        match (self.nights, &self.destination) {
            (Some(n), Some(dest)) => format!("{}N {}", n, dest),
            _ => self.title.clone(),
        }
    }

    pub fn price_display(&self) -> Option<String> {
        let price = self.price?;
        let currency = self.currency.as_deref().unwrap_or("INR");
        let sign = if price < 0 { "-" } else { "" };
        let minor = price.unsigned_abs();
        Some(format!("{} {}{}.{:02}", currency, sign, minor / 100, minor % 100))
    }
}

/// A partner hotel from `/hotels`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub star_rating: Option<u8>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl Hotel {
    pub fn stars(&self) -> String {
        "★".repeat(self.star_rating.unwrap_or(0).min(5) as usize)
    }
}
