//! Requester side: signing a certificate request with the current chain.

use std::sync::Arc;

use bon::Builder;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use super::ChainRenewalRequest;
use crate::addr::IA;
use crate::cert::CertificateChain;
use crate::cert::params::Validity;
use crate::cms::{EnvelopeSigner, SignedEnvelope};
use crate::context::{Interrupted, RequestContext};
use crate::error::PkiError;
use crate::key::{KeyPair, SignatureAlgorithm};

/// Errors building a renewal request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Pki(#[from] PkiError),
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Signing material of the requester's current identity.
#[derive(Debug, Clone, Builder)]
pub struct Signer {
    pub private_key: Arc<KeyPair>,
    pub algorithm: SignatureAlgorithm,
    /// The requester's current chain, `[AS certificate, CA certificate]`.
    pub chain: CertificateChain,
    pub chain_validity: Validity,
    /// Time after which the signature must no longer be accepted.
    pub expiration: OffsetDateTime,
    pub ia: IA,
    /// Subject key identifier of the current AS certificate.
    pub subject_key_id: Vec<u8>,
}

impl Signer {
    fn check(&self, now: OffsetDateTime) -> Result<(), PkiError> {
        if self.algorithm != self.private_key.signature_algorithm() {
            return Err(PkiError::InvalidInput(format!(
                "signature algorithm {} does not match {} key",
                self.algorithm,
                self.private_key.signature_algorithm()
            )));
        }
        if self.expiration > self.chain_validity.not_after {
            return Err(PkiError::Validity(format!(
                "signature expiration {} after chain expiration {}",
                self.expiration, self.chain_validity.not_after
            )));
        }
        if self.expiration < now {
            return Err(PkiError::Validity(format!(
                "signature expiration {} already passed",
                self.expiration
            )));
        }
        Ok(())
    }

    /// Signs `payload` into a CMS envelope carrying the current chain.
    pub fn sign_cms(&self, payload: &[u8]) -> Result<Vec<u8>, PkiError> {
        let now = OffsetDateTime::now_utc();
        self.check(now)?;
        SignedEnvelope::sign(
            payload,
            &EnvelopeSigner {
                key: &self.private_key,
                subject_key_id: self.subject_key_id.clone(),
                certificates: self.chain.to_vec(),
                ia: self.ia,
                signing_time: now,
                expiration: self.expiration,
            },
        )
    }
}

/// Builds a renewal request for the DER encoded certificate request `csr`,
/// signed with the requester's current identity.
pub fn new_chain_renewal_request(
    ctx: &RequestContext,
    csr: &[u8],
    signer: &Signer,
) -> Result<ChainRenewalRequest, RequestError> {
    ctx.check()?;
    debug!(ia = %signer.ia, expiration = %signer.expiration, "signing renewal request");
    Ok(ChainRenewalRequest {
        cms_signed_request: signer.sign_cms(csr)?,
        ..Default::default()
    })
}
