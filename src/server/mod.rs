//! Server side of chain renewal: the RPC-facing dispatcher, the CMS request
//! handler, the response signer and the capabilities they are built from.

pub mod cms;
pub mod metrics;
pub mod renewal;
pub mod signer;

use async_trait::async_trait;
use thiserror::Error;
use tonic::{Code, Status};

#[cfg(test)]
use mockall::automock;

pub use self::cms::Cms;
pub use self::metrics::{CmsHandlerMetrics, RenewalMetrics, RenewalServerMetrics};
pub use self::renewal::RenewalServer;
pub use self::signer::CaResponseSigner;

use crate::addr::{IA, Isd};
use crate::cert::CertificateChain;
use crate::context::{Interrupted, RequestContext};
use crate::csr::CertificateRequest;
use crate::error::PkiError;
use crate::policy::IssuanceError;

/// Verifies a CMS signed renewal request and extracts the certificate
/// request it carries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RequestVerifier: Send + Sync {
    async fn verify_renewal_request(
        &self,
        ctx: &RequestContext,
        request: &[u8],
    ) -> Result<CertificateRequest, PkiError>;
}

/// Issues a certificate chain for a verified certificate request.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainBuilder: Send + Sync {
    async fn create_chain(
        &self,
        ctx: &RequestContext,
        csr: &CertificateRequest,
    ) -> Result<CertificateChain, IssuanceError>;
}

/// Wraps an issued chain into a signed CMS response.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CmsSigner: Send + Sync {
    async fn sign_cms(
        &self,
        ctx: &RequestContext,
        chain: &CertificateChain,
    ) -> Result<Vec<u8>, PkiError>;
}

/// Handles a CMS signed renewal request end to end, up to chain issuance.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CmsRequestHandler: Send + Sync {
    async fn handle_cms_request(
        &self,
        ctx: &RequestContext,
        request: &[u8],
    ) -> Result<CertificateChain, RenewalError>;
}

/// Result category of one renewal attempt, recorded as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Success,
    ParseError,
    VerifyError,
    NotFound,
    InternalError,
    DatabaseError,
    BackendError,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Success => "ok_success",
            Category::ParseError => "err_parse",
            Category::VerifyError => "err_verify",
            Category::NotFound => "err_notfound",
            Category::InternalError => "err_internal",
            Category::DatabaseError => "err_database",
            Category::BackendError => "err_backend",
        }
    }
}

/// Failures of the renewal pipeline.
///
/// Each variant maps to exactly one wire status code and one result
/// category. Client faults are the parse, verify and jurisdiction variants;
/// everything else is on the server side.
#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("parsing CMS signed request: {0}")]
    Parse(#[source] PkiError),

    #[error("verifying renewal request: {0}")]
    Verify(#[source] PkiError),

    #[error("{ia} is not a client of this CA (serving ISD {isd})")]
    NotClient { ia: IA, isd: Isd },

    #[error("creating certificate chain: {0}")]
    Internal(#[source] IssuanceError),

    #[error("storing certificate chain: {0}")]
    Database(String),

    #[error("CMS signed request missing")]
    MissingCms,

    #[error("request carries both a legacy and a CMS signed payload")]
    AmbiguousEnvelope,

    #[error("signing CMS response: {0}")]
    ResponseSigning(#[source] PkiError),

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

impl RenewalError {
    /// The wire status code for this failure.
    pub fn code(&self) -> Code {
        match self {
            RenewalError::Parse(_) | RenewalError::Verify(_) => Code::InvalidArgument,
            RenewalError::AmbiguousEnvelope => Code::InvalidArgument,
            RenewalError::NotClient { .. } => Code::PermissionDenied,
            RenewalError::Internal(_) | RenewalError::Database(_) => Code::Unavailable,
            RenewalError::MissingCms | RenewalError::ResponseSigning(_) => Code::Unknown,
            RenewalError::Cancelled => Code::Cancelled,
            RenewalError::DeadlineExceeded => Code::DeadlineExceeded,
        }
    }

    /// The result category recorded for this failure.
    pub fn category(&self) -> Category {
        match self {
            RenewalError::Parse(_) => Category::ParseError,
            RenewalError::Verify(_) => Category::VerifyError,
            RenewalError::NotClient { .. } => Category::NotFound,
            RenewalError::Internal(_)
            | RenewalError::Cancelled
            | RenewalError::DeadlineExceeded => Category::InternalError,
            RenewalError::Database(_) => Category::DatabaseError,
            RenewalError::MissingCms
            | RenewalError::AmbiguousEnvelope
            | RenewalError::ResponseSigning(_) => Category::BackendError,
        }
    }

    /// Reports whether the failure is caused by the requester.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self.category(),
            Category::ParseError | Category::VerifyError | Category::NotFound
        ) || matches!(self, RenewalError::AmbiguousEnvelope)
    }
}

impl From<Interrupted> for RenewalError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => RenewalError::Cancelled,
            Interrupted::DeadlineExceeded => RenewalError::DeadlineExceeded,
        }
    }
}

impl From<RenewalError> for Status {
    fn from(err: RenewalError) -> Self {
        Status::new(err.code(), err.to_string())
    }
}
