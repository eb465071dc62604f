use jiff::civil::Date;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ureq::Agent;

use crate::error::FetchError;

pub const PRIVATBANK_BASE_URL: &str = "https://api.privatbank.ua/p24api";

/// Exchange list selector understood by the `pubinfo` endpoint
const COURSE_ID: u8 = 5;

/// Sale and purchase price of one currency against UAH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateQuote {
    /// Price at which the bank sells the currency
    pub sale: Decimal,
    /// Price at which the bank buys the currency
    pub purchase: Decimal,
}

/// Anything that can look up the rate of one currency on one date.
///
/// Implementations are shared between the per-date workers, hence `Sync`.
pub trait RateSource: Sync {
    fn fetch_rate(&self, currency: &str, date: Date) -> Result<RateQuote, FetchError>;
}

/// Render a date the way the provider expects it, and the way results are labelled.
pub fn provider_date(date: Date) -> String {
    date.strftime("%d.%m.%Y").to_string()
}

/// Blocking client for the PrivatBank public exchange API.
pub struct PrivatBank {
    agent: Agent,
    base_url: String,
}

impl PrivatBank {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            agent: Agent::new_with_defaults(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_agent(self, agent: Agent) -> Self {
        Self { agent, ..self }
    }

    pub fn request_url(&self, date: Date) -> String {
        format!(
            "{}/pubinfo?json&exchange&coursid={COURSE_ID}&date={}",
            self.base_url,
            provider_date(date)
        )
    }
}

impl Default for PrivatBank {
    fn default() -> Self {
        Self::new(PRIVATBANK_BASE_URL)
    }
}

impl RateSource for PrivatBank {
    fn fetch_rate(&self, currency: &str, date: Date) -> Result<RateQuote, FetchError> {
        let url = self.request_url(date);
        debug!(currency, %url, "requesting exchange list");

        let body = self.agent.get(url.as_str()).call()?.body_mut().read_to_string()?;
        find_quote(&body, currency, date)
    }
}

#[derive(Deserialize)]
struct ExchangeEntry {
    ccy: String,
    sale: Decimal,
    buy: Decimal,
}

/// Pick the first entry for `currency` out of a raw `pubinfo` response.
pub fn find_quote(body: &str, currency: &str, date: Date) -> Result<RateQuote, FetchError> {
    serde_json::from_str::<Vec<ExchangeEntry>>(body)?
        .into_iter()
        .find(|entry| entry.ccy == currency)
        .map(|entry| RateQuote {
            sale: entry.sale,
            purchase: entry.buy,
        })
        .ok_or_else(|| FetchError::NotFound {
            currency: currency.to_string(),
            date: provider_date(date),
        })
}
