use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tracing::debug;

use super::Marker;
use crate::feed::{FeedError, FeedQuery, JobFeed};
use crate::job::{AllowList, ArrivalKey, JobCandidate, ProcessKind};
use crate::ledger::{Ledger, LedgerError};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Scans the feed for one pipeline kind.
pub struct Poller {
    feed: Arc<dyn JobFeed>,
    ledger: Arc<dyn Ledger>,
    kind: ProcessKind,
    allow_list: AllowList,
    clock_skew: Duration,
    initial_lookback: Duration,
    batch_size: usize,
}

/// Pagination state carried between pulls of the candidate stream.
struct PageState {
    buffer: VecDeque<JobCandidate>,
    after: Option<ArrivalKey>,
    exhausted: bool,
}

impl Poller {
    pub fn new(
        feed: Arc<dyn JobFeed>,
        ledger: Arc<dyn Ledger>,
        kind: ProcessKind,
        allow_list: AllowList,
    ) -> Self {
        Self {
            feed,
            ledger,
            kind,
            allow_list,
            clock_skew: Duration::minutes(5),
            initial_lookback: Duration::days(1),
            batch_size: 100,
        }
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    pub fn with_initial_lookback(mut self, initial_lookback: Duration) -> Self {
        self.initial_lookback = initial_lookback;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Current marker, derived from the newest ledger entry for this kind.
    pub async fn marker(&self) -> Result<Marker, PollError> {
        let latest = self.ledger.latest_written_at(self.kind).await?;
        Ok(Marker::from_latest(
            latest,
            Utc::now(),
            self.clock_skew,
            self.initial_lookback,
        ))
    }

    /// Lazily yield candidates created at or after `since`, in arrival order.
    ///
    /// Pages are fetched from the feed only as the stream is pulled. Files
    /// already in the ledger are skipped here as an optimization; the
    /// coordinator repeats that check after claiming. Each call starts over
    /// from the marker. An error ends the stream after it is yielded.
    pub fn next_batch(&self, since: Marker) -> BoxStream<'_, Result<JobCandidate, PollError>> {
        let initial = PageState {
            buffer: VecDeque::new(),
            after: None,
            exhausted: false,
        };

        stream::unfold(initial, move |mut state| async move {
            loop {
                if let Some(candidate) = state.buffer.pop_front() {
                    if !self.allow_list.permits(candidate.report_name()) {
                        debug!(
                            "Skipping {} for {}: report not allow-listed",
                            candidate.file_id, self.kind
                        );
                        continue;
                    }

                    match self.ledger.has_processed(&candidate.file_id, self.kind).await {
                        Ok(true) => {
                            debug!("Skipping {} for {}: already in ledger", candidate.file_id, self.kind);
                            continue;
                        }
                        Ok(false) => return Some((Ok(candidate), state)),
                        Err(e) => {
                            state.exhausted = true;
                            state.buffer.clear();
                            return Some((Err(PollError::from(e)), state));
                        }
                    }
                }

                if state.exhausted {
                    return None;
                }

                let mut query = FeedQuery::new(since.jde, self.allow_list.clone(), self.batch_size);
                query.after = state.after;

                match self.feed.candidates_since(&query).await {
                    Ok(page) => {
                        if page.len() < self.batch_size {
                            state.exhausted = true;
                        }
                        if let Some(last) = page.last() {
                            state.after = Some(last.arrival);
                        }
                        state.buffer.extend(page);
                    }
                    Err(e) => {
                        state.exhausted = true;
                        return Some((Err(PollError::from(e)), state));
                    }
                }
            }
        })
        .boxed()
    }
}
