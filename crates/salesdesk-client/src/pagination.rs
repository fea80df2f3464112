//! Client-side aggregation over the paginated lead list
//!
//! Pages are fetched strictly in sequence from page 1 until the backend stops
//! returning a `next` link. A walk that fails, hits the page bound or is
//! cancelled yields nothing: callers never see a tally built from a prefix of
//! the list.

use crate::api::Backend;
use crate::error::ApiError;
use salesdesk_core::{LeadRecord, StatusTally};
use std::collections::HashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a walk produced no result
#[derive(Error, Debug)]
pub enum WalkError {
    /// A page request failed
    #[error("Failed to fetch lead page {page}: {source}")]
    Fetch {
        /// Page that failed
        page: u32,
        /// Underlying error
        #[source]
        source: ApiError,
    },

    /// The list did not end within the page bound
    #[error("Lead list still had more pages after {max_pages} pages")]
    PageLimit {
        /// Configured bound
        max_pages: u32,
    },

    /// Cancelled by the caller
    #[error("Lead list walk cancelled")]
    Cancelled,
}

/// Bounds applied to a single walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Upper bound on pages fetched
    pub max_pages: u32,
    /// Cancels the walk between or during page fetches
    pub cancel: CancellationToken,
}

impl WalkOptions {
    /// Options with a page bound and a fresh cancellation token
    pub fn new(max_pages: u32) -> Self {
        Self {
            max_pages,
            cancel: CancellationToken::new(),
        }
    }

    /// Share an existing cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::new(salesdesk_core::config::PaginationConfig::default().max_pages)
    }
}

/// Fold every lead across all pages into an accumulator
///
/// # Errors
///
/// Returns an error if any page fails, the page bound is reached while the
/// backend still reports more pages, or the walk is cancelled. The partial
/// accumulator is dropped in every case.
pub async fn fold_leads<B, A, F>(
    backend: &B,
    options: &WalkOptions,
    init: A,
    mut fold: F,
) -> Result<A, WalkError>
where
    B: Backend + ?Sized,
    F: FnMut(&mut A, &LeadRecord),
{
    let mut acc = init;
    let mut page = 1;

    loop {
        if page > options.max_pages {
            return Err(WalkError::PageLimit {
                max_pages: options.max_pages,
            });
        }

        let result = tokio::select! {
            biased;
            () = options.cancel.cancelled() => return Err(WalkError::Cancelled),
            result = backend.sales_leads(page) => result,
        };
        let records = result.map_err(|source| WalkError::Fetch { page, source })?;

        debug!(page, records = records.results.len(), "Fetched lead page");
        for record in &records.results {
            fold(&mut acc, record);
        }

        if !records.has_next() {
            return Ok(acc);
        }
        page += 1;
    }
}

/// Count leads per Hot/Warm/Cold status across the full list
///
/// # Errors
///
/// Propagates [`fold_leads`] failures.
pub async fn try_tally_lead_status<B: Backend + ?Sized>(
    backend: &B,
    options: &WalkOptions,
) -> Result<StatusTally, WalkError> {
    fold_leads(backend, options, StatusTally::default(), |tally, lead| {
        if let Some(status) = lead.status() {
            tally.increment(status);
        }
    })
    .await
}

/// Count distinct channel partners behind channel-partner leads
///
/// # Errors
///
/// Propagates [`fold_leads`] failures.
pub async fn try_count_channel_partners<B: Backend + ?Sized>(
    backend: &B,
    options: &WalkOptions,
) -> Result<u64, WalkError> {
    let partners = fold_leads(backend, options, HashSet::new(), |seen, lead| {
        if let Some(key) = lead.partner_key() {
            seen.insert(key);
        }
    })
    .await?;
    Ok(partners.len() as u64)
}

/// Status tally, or all zeros when the walk fails
pub async fn tally_lead_status<B: Backend + ?Sized>(backend: &B, options: &WalkOptions) -> StatusTally {
    match try_tally_lead_status(backend, options).await {
        Ok(tally) => {
            info!(hot = tally.hot, warm = tally.warm, cold = tally.cold, "Lead status counts loaded");
            tally
        }
        Err(e) => {
            warn!(error = %e, "Failed to load lead status counts");
            StatusTally::default()
        }
    }
}

/// Distinct partner count, or zero when the walk fails
pub async fn count_channel_partners<B: Backend + ?Sized>(backend: &B, options: &WalkOptions) -> u64 {
    match try_count_channel_partners(backend, options).await {
        Ok(count) => {
            info!(count, "Channel partner count loaded");
            count
        }
        Err(e) => {
            warn!(error = %e, "Failed to count channel partners");
            0
        }
    }
}
