use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use time::OffsetDateTime;
use tracing::debug;

use super::CmsSigner;
use crate::addr::IA;
use crate::cert::params::checked_add;
use crate::cert::{Certificate, CertificateChain};
use crate::cms::{EnvelopeSigner, SignedEnvelope};
use crate::context::RequestContext;
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::renewal::encode_chain;

/// Signs renewal responses with the CA key, or with a responder key whose
/// certificate the CA issued.
#[derive(Debug, Clone, Builder)]
pub struct CaResponseSigner {
    key: Arc<KeyPair>,
    /// Certificate of `key`, embedded in every response.
    certificate: Certificate,
    /// Issuer of `certificate` when responding with a delegated key.
    issuer: Option<Certificate>,
    ia: IA,
    /// How long a response stays acceptable after signing.
    #[builder(default = Duration::from_secs(3600))]
    lifetime: Duration,
}

impl CaResponseSigner {
    /// Wraps `chain` into a CMS envelope.
    pub fn sign_chain(&self, chain: &CertificateChain) -> Result<Vec<u8>> {
        let now = OffsetDateTime::now_utc();
        let not_after = self.certificate.validity().not_after;
        let expiration = checked_add(now, self.lifetime).map_or(not_after, |t| t.min(not_after));
        if expiration < now {
            return Err(PkiError::Validity(
                "response signing certificate expired".to_string(),
            ));
        }
        let mut certificates = vec![self.certificate.clone()];
        certificates.extend(self.issuer.iter().cloned());

        let payload = encode_chain(chain)?;
        debug!(ia = %self.ia, "signing renewal response");
        SignedEnvelope::sign(
            &payload,
            &EnvelopeSigner {
                key: &self.key,
                subject_key_id: self.certificate.subject_key_id()?,
                certificates,
                ia: self.ia,
                signing_time: now,
                expiration,
            },
        )
    }
}

#[async_trait]
impl CmsSigner for CaResponseSigner {
    async fn sign_cms(&self, _ctx: &RequestContext, chain: &CertificateChain) -> Result<Vec<u8>> {
        self.sign_chain(chain)
    }
}
