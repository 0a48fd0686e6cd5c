//! Retrieval engine
//!
//! Drives the range splitter once per calendar day, projects every accepted page into
//! [`Record`]s and deduplicates them by document id.
//!
//! A day is all-or-nothing: records from its accepted windows are staged and only
//! merged into the engine's [`RecordSet`] once the whole day has been covered. If a
//! probe fails, the error comes back as [`Error::DayFailed`] and every earlier day is
//! left in place, so the caller can resume from the failing day.

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::filters::QueryFilter;
use crate::parser::{ParsedPage, parse_results};
use crate::retry::with_retry;
use crate::session::PortalSearch;
use crate::splitter::split_day;
use crate::types::{
    DownloadType, OverflowEvent, Record, RecordSet, RetrievalSummary, VoucherState, WindowReport,
};
use crate::window::QueryWindow;

/// Receives progress notifications from a retrieval run.
///
/// Any `Fn(&OverflowEvent)` closure is an observer.
pub trait RetrievalObserver {
    /// A single-second window reported at least the cap and was accepted anyway
    fn on_overflow(&self, event: &OverflowEvent);

    /// Any window was accepted
    fn on_window(&self, _report: &WindowReport) {}
}

impl<F> RetrievalObserver for F
where
    F: Fn(&OverflowEvent),
{
    fn on_overflow(&self, event: &OverflowEvent) {
        self(event)
    }
}

/// Retrieves invoice records through a [`PortalSearch`]
pub struct RetrievalEngine<S> {
    search: S,
    download_type: DownloadType,
    voucher_state: VoucherState,
    cap: usize,
    portal_url: String,
    retry: Option<RetryConfig>,
    records: RecordSet,
}

impl<S: PortalSearch> RetrievalEngine<S> {
    /// Create an engine using the search settings in `config`
    pub fn new(search: S, config: &Config) -> Self {
        Self {
            search,
            download_type: config.search.download_type,
            voucher_state: config.search.voucher_state(),
            cap: config.search.cap,
            portal_url: config.portal.portal_url.clone(),
            retry: config.retry.clone(),
            records: RecordSet::new(),
        }
    }

    /// The search backend, e.g. to reuse its HTTP client for fetching documents
    pub fn search_client(&self) -> &S {
        &self.search
    }

    /// Records retrieved by the last run
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Document URLs of the retrieved records, one per record, in record order
    pub fn urls(&self) -> Vec<String> {
        self.records.urls().map(str::to_string).collect()
    }

    /// Consume the engine into its records
    pub fn into_records(self) -> Vec<Record> {
        self.records.into_records()
    }

    /// Retrieve specific documents by fiscal folio.
    ///
    /// Clears the record set, then issues one search per id. Returns the number of
    /// records held afterwards.
    ///
    /// # Errors
    /// The first failing search aborts the run; records found before it are kept.
    pub async fn download_list_uuid<I, T>(&mut self, document_ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.records.clear();

        for id in document_ids {
            let id = id.as_ref();
            let filter = QueryFilter::for_document(self.download_type, id, self.voucher_state);
            let page = self.query(&filter).await?;
            if page.records.is_empty() {
                debug!(document_id = id, "no record found for document id");
            }
            self.records.extend(page.records);
        }

        info!(records = self.records.len(), "document id retrieval complete");
        Ok(self.records.len())
    }

    /// Retrieve every record issued or received between `start` and `end`, inclusive.
    ///
    /// Clears the record set, then covers each day with windows below the cap.
    ///
    /// # Errors
    /// - [`Error::InvalidDateRange`] if `end` is before `start`, before any request
    /// - [`Error::DayFailed`] if a probe fails; earlier days stay in the record set and
    ///   the failing day contributes nothing
    pub async fn download_period(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        observer: Option<&dyn RetrievalObserver>,
    ) -> Result<RetrievalSummary> {
        if end < start {
            return Err(Error::InvalidDateRange { start, end });
        }

        self.records.clear();
        let mut summary = RetrievalSummary::default();
        let mut day = start;

        loop {
            self.download_day(day, observer, &mut summary).await?;
            if day >= end {
                break;
            }
            day = day
                .checked_add_days(Days::new(1))
                .ok_or_else(|| Error::Other(format!("date overflow after {day}")))?;
        }

        summary.records = self.records.len();
        info!(
            %start,
            %end,
            days = summary.days,
            queries = summary.queries,
            overflows = summary.overflows,
            records = summary.records,
            "period retrieval complete"
        );
        Ok(summary)
    }

    async fn download_day(
        &mut self,
        day: NaiveDate,
        observer: Option<&dyn RetrievalObserver>,
        summary: &mut RetrievalSummary,
    ) -> Result<()> {
        let download_type = self.download_type;
        let voucher_state = self.voucher_state;
        let this = &*self;

        let split = split_day(
            day,
            self.cap,
            |window: QueryWindow| async move {
                let filter = QueryFilter::for_window(download_type, window, voucher_state);
                let page = this.query(&filter).await?;
                Ok((page.count, page.records))
            },
            |report: &WindowReport| {
                if let Some(observer) = observer {
                    observer.on_window(report);
                    if report.overflow {
                        observer.on_overflow(&OverflowEvent {
                            count: report.count,
                            window: report.window,
                        });
                    }
                }
            },
        )
        .await;

        let split = match split {
            Ok(split) => split,
            Err(e) => {
                warn!(%day, error = %e, "day retrieval failed, discarding its records");
                return Err(e);
            }
        };

        let windows = split.windows.len();
        let mut overflows = 0;
        let mut staged = RecordSet::new();
        for accepted in split.windows {
            overflows += usize::from(accepted.report.overflow);
            staged.extend(accepted.payload);
        }

        let day_records = staged.len();
        self.records.extend(staged.into_records());

        summary.days += 1;
        summary.queries += split.probes;
        summary.windows += windows;
        summary.overflows += overflows;

        info!(
            %day,
            windows,
            queries = split.probes,
            day_records,
            total_records = self.records.len(),
            "day retrieved"
        );
        Ok(())
    }

    async fn query(&self, filter: &QueryFilter) -> Result<ParsedPage> {
        let body = match &self.retry {
            Some(retry) => with_retry(retry, || self.search.search(filter)).await?,
            None => self.search.search(filter).await?,
        };
        parse_results(&body, filter.download_type, &self.portal_url)
    }
}
