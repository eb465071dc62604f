use clap::Parser;
use jiff::ToSpan;
use jiff::civil::Date;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::io::Write;
use std::num::IntErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, info, warn};

pub mod error;
pub mod provider;

pub use error::{FetchError, RunError, ValidationError};
pub use provider::{PRIVATBANK_BASE_URL, PrivatBank, RateQuote, RateSource, provider_date};

/// Most days that may be requested in one run
pub const MAX_DAYS: i64 = 10;

/// Get USD and EUR exchange rates from PrivatBank for each of the past few days.
///
/// Rates are looked up for yesterday and the days before it, newest first.
#[derive(Parser)]
pub struct Cli {
    /// Number of past days to retrieve (1 to 10)
    #[arg(value_name = "DAYS", allow_negative_numbers = true, value_parser = parse_days)]
    pub days: i64,

    /// Currency to look up; may be repeated
    #[arg(short, long = "currency", value_name = "CODE", value_parser = parse_currency, default_values = ["USD", "EUR"])]
    pub currencies: Vec<String>,

    /// Print results as JSON
    #[clap(long)]
    pub json: bool,

    /// Base URL of the PrivatBank public API
    #[arg(long, value_name = "URL", default_value = PRIVATBANK_BASE_URL)]
    pub base_url: String,
}

/// Accept any integer. Values beyond `i64` saturate so they are reported as out of range
/// rather than rejected by the parser.
fn parse_days(days: &str) -> Result<i64, String> {
    match days.parse::<i64>() {
        Ok(days) => Ok(days),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(format!("{days:?} is not an integer")),
        },
    }
}

/// Accept a three letter currency code in any case.
fn parse_currency(code: &str) -> Result<String, String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(format!("{code:?} is not a three letter currency code"))
    }
}

pub fn validate_days(days: i64) -> Result<u8, ValidationError> {
    if (1..=MAX_DAYS).contains(&days) {
        Ok(days as u8)
    } else {
        Err(ValidationError::DaysOutOfRange(days))
    }
}

/// Dates to look up: the `days` days before `today`, newest first.
pub fn target_dates(today: Date, days: u8) -> Vec<Date> {
    (1..=i64::from(days)).map(|day| today - day.days()).collect()
}

/// Rates of every requested currency on one date, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRates {
    pub date: Date,
    pub rates: Vec<(String, RateQuote)>,
}

impl DailyRates {
    /// The date as the provider was queried with it
    pub fn label(&self) -> String {
        provider_date(self.date)
    }
}

/// Serialized as `{"DD.MM.YYYY": {"USD": {...}, "EUR": {...}}}`
impl Serialize for DailyRates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Rates<'a>(&'a [(String, RateQuote)]);

        impl Serialize for Rates<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (currency, quote) in self.0 {
                    map.serialize_entry(currency, quote)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.label(), &Rates(&self.rates))?;
        map.end()
    }
}

/// Fetch `currencies` for each of the `days` days before `today`.
///
/// Each date gets its own worker thread, which looks the currencies up one after another.
/// Results come back newest date first regardless of which worker finishes first. The
/// first failure stops the other workers from sending further requests and is returned;
/// no partial results are kept.
pub fn fetch_rates<S>(
    source: &S,
    today: Date,
    days: u8,
    currencies: &[String],
) -> Result<Vec<DailyRates>, FetchError>
where
    S: RateSource + ?Sized,
{
    fetch_rates_with_cancel(source, today, days, currencies, &AtomicBool::new(false))
}

/// Same as [`fetch_rates`], sharing `cancelled` with the workers.
///
/// Workers check the flag before every request and stop once it is set. A failing worker
/// sets it itself.
pub fn fetch_rates_with_cancel<S>(
    source: &S,
    today: Date,
    days: u8,
    currencies: &[String],
    cancelled: &AtomicBool,
) -> Result<Vec<DailyRates>, FetchError>
where
    S: RateSource + ?Sized,
{
    let dates = target_dates(today, days);
    info!(days, ?currencies, "fetching exchange rates");

    let results: Vec<Result<Option<DailyRates>, FetchError>> = thread::scope(|scope| {
        let workers: Vec<_> = dates
            .into_iter()
            .map(|date| {
                scope.spawn(move || {
                    let result = fetch_day(source, date, currencies, cancelled);
                    if let Err(e) = &result {
                        warn!(date = %provider_date(date), error = %e, "lookup failed, cancelling");
                        cancelled.store(true, Ordering::Relaxed);
                    }
                    result
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    // A worker that saw the flag yields `None`; a real failure takes precedence
    let expected = results.len();
    let mut rates = Vec::with_capacity(expected);
    for result in results {
        if let Some(day) = result? {
            rates.push(day);
        }
    }
    if rates.len() < expected {
        return Err(FetchError::Cancelled);
    }

    info!(days = rates.len(), "exchange rates fetched");
    Ok(rates)
}

/// Look up every currency for one date, stopping early once another worker has failed.
fn fetch_day<S>(
    source: &S,
    date: Date,
    currencies: &[String],
    cancelled: &AtomicBool,
) -> Result<Option<DailyRates>, FetchError>
where
    S: RateSource + ?Sized,
{
    let mut rates = Vec::with_capacity(currencies.len());
    for currency in currencies {
        if cancelled.load(Ordering::Relaxed) {
            debug!(date = %provider_date(date), "cancelled before fetching {currency}");
            return Ok(None);
        }
        let quote = source.fetch_rate(currency, date)?;
        rates.push((currency.clone(), quote));
    }

    info!(date = %provider_date(date), "rates retrieved");
    Ok(Some(DailyRates { date, rates }))
}

/// Plain text rendering, one block per date.
pub fn format_rates(rates: &[DailyRates]) -> String {
    let mut out = String::new();
    for day in rates {
        out.push_str(&format!("{}:\n", day.label()));
        for (currency, quote) in &day.rates {
            out.push_str(&format!(
                "  {currency}: sale {}, purchase {}\n",
                quote.sale, quote.purchase
            ));
        }
    }
    out
}

/// Validate the arguments, fetch and print to `out`.
///
/// An out of range day count is reported on `out` without touching `source`.
pub fn run<S, W>(args: &Cli, source: &S, today: Date, out: &mut W) -> Result<(), RunError>
where
    S: RateSource + ?Sized,
    W: Write,
{
    let days = match validate_days(args.days) {
        Ok(days) => days,
        Err(e) => {
            writeln!(out, "{e}")?;
            return Ok(());
        }
    };

    let rates = fetch_rates(source, today, days, &args.currencies)?;
    if args.json {
        serde_json::to_writer_pretty(&mut *out, &rates)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", format_rates(&rates))?;
    }
    Ok(())
}
