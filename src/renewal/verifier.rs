//! CA side verification of CMS signed renewal requests.

use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use time::OffsetDateTime;
use tracing::debug;

use crate::cert::Certificate;
use crate::cert::extensions::KeyUsages;
use crate::cert::params::{Validity, checked_add, checked_sub};
use crate::cms::SignedEnvelope;
use crate::context::RequestContext;
use crate::csr::CertificateRequest;
use crate::error::{PkiError, Result};
use crate::server::RequestVerifier;

/// Verifies renewal requests against the CA certificates a requester's
/// current chain may be issued by.
#[derive(Debug, Clone, Builder)]
pub struct RenewalRequestVerifier {
    /// Accepted issuers of requester chains.
    trust_anchors: Vec<Certificate>,
    /// Tolerated clock difference between requester and CA.
    #[builder(default)]
    max_clock_skew: Duration,
}

impl RenewalRequestVerifier {
    /// Verifies `request` as of now and returns the certificate request it
    /// carries.
    pub fn verify(&self, request: &[u8]) -> Result<CertificateRequest> {
        self.verify_at(request, OffsetDateTime::now_utc())
    }

    /// Verifies `request` as of `now`.
    ///
    /// The signer chain must be issued by a trust anchor and valid at `now`,
    /// the signing time must fall inside the AS certificate's validity, the
    /// signature must not have expired, and the declared ISD-AS, the AS
    /// certificate and the embedded certificate request must all name the
    /// same ISD-AS.
    pub fn verify_at(&self, request: &[u8], now: OffsetDateTime) -> Result<CertificateRequest> {
        let skew_error = || {
            PkiError::Validity(format!(
                "clock skew {:?} out of range at {now}",
                self.max_clock_skew
            ))
        };
        let earliest = checked_sub(now, self.max_clock_skew).ok_or_else(skew_error)?;
        let latest = checked_add(now, self.max_clock_skew).ok_or_else(skew_error)?;

        let envelope = SignedEnvelope::decode(request)?;
        let chain = envelope.signer_chain()?;
        chain.validate()?;

        if !self.trust_anchors.iter().any(|anchor| anchor == chain.issuer()) {
            return Err(PkiError::Verification(
                "signer chain not issued by a trusted CA".to_string(),
            ));
        }
        for cert in [chain.leaf(), chain.issuer()] {
            check_valid_between(&cert.validity(), earliest, latest)?;
        }
        if let Some(usage) = chain.leaf().key_usage()? {
            if !usage.contains(KeyUsages::DigitalSignature) {
                return Err(PkiError::Verification(
                    "signer certificate not allowed to sign".to_string(),
                ));
            }
        }

        let attrs = envelope.signed_attributes()?;
        let leaf_validity = chain.leaf().validity();
        if !leaf_validity.contains(attrs.signing_time) {
            return Err(PkiError::Validity(format!(
                "signing time {} outside signer validity",
                attrs.signing_time
            )));
        }
        if attrs.signing_time > latest {
            return Err(PkiError::Validity(format!(
                "signing time {} in the future",
                attrs.signing_time
            )));
        }
        if attrs.expiration < earliest {
            return Err(PkiError::Validity(format!(
                "signature expired at {}",
                attrs.expiration
            )));
        }
        if attrs.expiration > leaf_validity.not_after {
            return Err(PkiError::Validity(
                "signature expiration after signer certificate expiration".to_string(),
            ));
        }

        let chain_ia = chain.ia()?;
        if attrs.ia != chain_ia {
            return Err(PkiError::Verification(format!(
                "declared signer {} does not match certificate subject {chain_ia}",
                attrs.ia
            )));
        }

        envelope.verify_signature(&chain.leaf().public_key()?)?;

        let csr = CertificateRequest::from_der(envelope.payload())?;
        csr.verify_self_signature()?;
        let csr_ia = csr.subject_ia()?;
        if csr_ia != chain_ia {
            return Err(PkiError::Verification(format!(
                "certificate request for {csr_ia} signed by {chain_ia}"
            )));
        }
        debug!(ia = %chain_ia, "renewal request verified");
        Ok(csr)
    }
}

/// Accepts `validity` if it overlaps `[earliest, latest]`, the current time
/// widened by the tolerated clock skew.
fn check_valid_between(
    validity: &Validity,
    earliest: OffsetDateTime,
    latest: OffsetDateTime,
) -> Result<()> {
    if latest < validity.not_before || earliest > validity.not_after {
        return Err(PkiError::Validity(format!(
            "signer chain not valid between {earliest} and {latest}: [{}, {}]",
            validity.not_before, validity.not_after
        )));
    }
    Ok(())
}

#[async_trait]
impl RequestVerifier for RenewalRequestVerifier {
    async fn verify_renewal_request(
        &self,
        _ctx: &RequestContext,
        request: &[u8],
    ) -> Result<CertificateRequest> {
        self.verify(request)
    }
}
