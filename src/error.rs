use thiserror::Error;

/// Failure of a single rate lookup. Any of these aborts the whole batch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider answered, but its list has no entry for the currency.
    #[error("exchange rate for {currency} on {date} not found")]
    NotFound { currency: String, date: String },

    /// Connection failure or non-success status.
    #[error("failure while accessing PrivatBank: {0}")]
    Transport(#[from] ureq::Error),

    #[error("failed to parse exchange data: {0}")]
    Decode(#[from] serde_json::Error),

    /// The batch was stopped from outside before every date was fetched.
    #[error("exchange rate lookup cancelled")]
    Cancelled,
}

/// Rejected command-line input, reported to the user without fetching anything.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Error: Number of days should be between 1 and 10.")]
    DaysOutOfRange(i64),
}

/// Anything that stops a run after the arguments were accepted.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to serialize exchange rates: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
