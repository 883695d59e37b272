//! Prometheus counters for the renewal pipeline.
//!
//! | Metric | Labels | Recorded by |
//! |--------|--------|-------------|
//! | `renewal_requests_total` | `result` = `ok_success`, `err_backend` | [`RenewalServer`](super::RenewalServer) |
//! | `renewal_cms_requests_total` | `result` = `ok_success`, `err_parse`, `err_verify`, `err_notfound`, `err_internal`, `err_database` | [`Cms`](super::Cms) |
//!
//! Components receive per-result counter handles at construction; they never
//! look up a registry themselves.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use super::Category;

const RESULT_LABEL: &str = "result";

/// Counters of the RPC-facing dispatcher.
#[derive(Clone, Debug)]
pub struct RenewalServerMetrics {
    pub success: IntCounter,
    pub backend_errors: IntCounter,
}

impl RenewalServerMetrics {
    /// Binds the dispatcher results to `counters`, labelled by result.
    pub fn from_vec(counters: &IntCounterVec) -> Self {
        Self {
            success: counters.with_label_values(&[Category::Success.label()]),
            backend_errors: counters.with_label_values(&[Category::BackendError.label()]),
        }
    }

    pub(crate) fn record(&self, category: Category) {
        match category {
            Category::Success => self.success.inc(),
            _ => self.backend_errors.inc(),
        }
    }
}

/// Counters of the CMS request handler.
#[derive(Clone, Debug)]
pub struct CmsHandlerMetrics {
    pub success: IntCounter,
    pub parse_error: IntCounter,
    pub verify_error: IntCounter,
    pub not_found_error: IntCounter,
    pub internal_error: IntCounter,
    pub database_error: IntCounter,
}

impl CmsHandlerMetrics {
    /// Binds the handler results to `counters`, labelled by result.
    pub fn from_vec(counters: &IntCounterVec) -> Self {
        let counter = |category: Category| counters.with_label_values(&[category.label()]);
        Self {
            success: counter(Category::Success),
            parse_error: counter(Category::ParseError),
            verify_error: counter(Category::VerifyError),
            not_found_error: counter(Category::NotFound),
            internal_error: counter(Category::InternalError),
            database_error: counter(Category::DatabaseError),
        }
    }

    /// Increments the counter for `category`. Backend failures do not occur
    /// at this stage and count as internal errors.
    pub(crate) fn record(&self, category: Category) {
        let counter = match category {
            Category::Success => &self.success,
            Category::ParseError => &self.parse_error,
            Category::VerifyError => &self.verify_error,
            Category::NotFound => &self.not_found_error,
            Category::DatabaseError => &self.database_error,
            Category::InternalError | Category::BackendError => &self.internal_error,
        };
        counter.inc();
    }
}

/// Both counter families, registered on one registry.
#[derive(Clone, Debug)]
pub struct RenewalMetrics {
    pub requests: IntCounterVec,
    pub cms_requests: IntCounterVec,
}

impl RenewalMetrics {
    /// Creates the counter families and registers them with `registry`.
    ///
    /// # Errors
    ///
    /// Fails if a family with the same name is already registered.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let requests = IntCounterVec::new(
            Opts::new("renewal_requests_total", "Chain renewal requests by result"),
            &[RESULT_LABEL],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let cms_requests = IntCounterVec::new(
            Opts::new(
                "renewal_cms_requests_total",
                "CMS signed chain renewal requests by result",
            ),
            &[RESULT_LABEL],
        )?;
        registry.register(Box::new(cms_requests.clone()))?;

        Ok(Self {
            requests,
            cms_requests,
        })
    }

    pub fn server(&self) -> RenewalServerMetrics {
        RenewalServerMetrics::from_vec(&self.requests)
    }

    pub fn cms_handler(&self) -> CmsHandlerMetrics {
        CmsHandlerMetrics::from_vec(&self.cms_requests)
    }
}
