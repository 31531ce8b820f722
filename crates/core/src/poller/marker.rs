use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::job::JdeTimestamp;

/// Lower bound of a poll query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub at: DateTime<Utc>,
    pub jde: JdeTimestamp,
}

impl Marker {
    /// Derive the marker from the newest ledger entry of the pipeline.
    ///
    /// The feed's clock may run behind ours, so the bound is pulled back by
    /// `clock_skew`. Without any ledger entry the bound is `now - initial_lookback`.
    pub fn from_latest(
        latest: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        clock_skew: Duration,
        initial_lookback: Duration,
    ) -> Self {
        let at = match latest {
            Some(written_at) => written_at - clock_skew,
            None => now - initial_lookback,
        };
        Self::at(at)
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            at,
            jde: JdeTimestamp::from_datetime(&at),
        }
    }
}
