//! CA policy: issues AS certificate chains from verified requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use x509_cert::name::Name;

use crate::cert::extensions::KeyUsages;
use crate::cert::params::{CertificateTemplate, ExtendedKeyUsageOption, Validity, checked_sub};
use crate::cert::{Certificate, CertificateChain};
use crate::context::RequestContext;
use crate::csr::CertificateRequest;
use crate::error::PkiError;
use crate::issuer::Issuer;
use crate::key::KeyPair;
use crate::server::ChainBuilder;

/// Why a chain could not be issued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssuanceError {
    /// The request itself is unusable, e.g. its subject carries no ISD-AS.
    #[error("invalid certificate request: {0}")]
    InvalidRequest(#[source] PkiError),

    /// The CA is not in a state that allows issuance.
    #[error("CA policy violation: {0}")]
    Policy(String),

    /// Producing the certificate failed.
    #[error("signing certificate: {0}")]
    Signing(#[source] PkiError),
}

/// Issuance policy of an AS CA.
///
/// Binds the CA certificate to its private key and the validity of issued
/// AS certificates. Leaf certificates never outlive the CA certificate.
#[derive(Debug, Clone, Builder)]
pub struct CaPolicy {
    /// Validity of issued AS certificates.
    validity: Duration,
    certificate: Certificate,
    signer: Arc<KeyPair>,
    /// How far `not_before` of issued certificates is backdated.
    #[builder(default)]
    backdate: Duration,
}

impl CaPolicy {
    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Issues a chain for `csr` as of now.
    pub fn create_chain(&self, csr: &CertificateRequest) -> Result<CertificateChain, IssuanceError> {
        self.create_chain_at(csr, OffsetDateTime::now_utc())
    }

    /// Issues a chain `[AS certificate, CA certificate]` for `csr` as of `now`.
    ///
    /// The request is expected to have been verified already; only its subject
    /// and public key are used.
    pub fn create_chain_at(
        &self,
        csr: &CertificateRequest,
        now: OffsetDateTime,
    ) -> Result<CertificateChain, IssuanceError> {
        let ia = csr.subject_ia().map_err(IssuanceError::InvalidRequest)?;
        if ia.is_wildcard() {
            return Err(IssuanceError::InvalidRequest(PkiError::InvalidInput(format!(
                "wildcard ISD-AS {ia} in certificate request"
            ))));
        }
        self.check_ca(now)?;

        let ca_validity = self.certificate.validity();
        let not_before = checked_sub(now, self.backdate)
            .ok_or_else(|| {
                IssuanceError::Policy(format!("backdate {:?} out of range", self.backdate))
            })?
            .max(ca_validity.not_before);
        let validity = Validity::starting_at(not_before, self.validity)
            .map_err(|e| IssuanceError::Policy(e.to_string()))?
            .clamp_to(&ca_validity);

        let template = CertificateTemplate::builder()
            .subject(csr.subject().clone())
            .subject_public_key(csr.public_key_info().clone())
            .serial_number(random_serial().to_vec())
            .validity(validity)
            .key_usage(KeyUsages::DigitalSignature.into())
            .usages(vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::TimeStamping,
            ])
            .build();

        let leaf = self.issue(&template).map_err(IssuanceError::Signing)?;
        info!(
            %ia,
            serial = %hex(leaf.serial()),
            not_after = %validity.not_after,
            "issued AS certificate"
        );
        Ok(CertificateChain::new(leaf, self.certificate.clone()))
    }

    fn check_ca(&self, now: OffsetDateTime) -> Result<(), IssuanceError> {
        let is_ca = self
            .certificate
            .is_ca()
            .map_err(|e| IssuanceError::Policy(e.to_string()))?;
        if !is_ca {
            return Err(IssuanceError::Policy(
                "configured certificate is not a CA certificate".to_string(),
            ));
        }
        let signer_spki = self
            .signer
            .as_spki()
            .map_err(|e| IssuanceError::Policy(e.to_string()))?;
        if &signer_spki != self.certificate.public_key_info() {
            return Err(IssuanceError::Policy(
                "signer does not match the CA certificate key".to_string(),
            ));
        }
        let validity = self.certificate.validity();
        if !validity.contains(now) {
            debug!(
                not_before = %validity.not_before,
                not_after = %validity.not_after,
                "CA certificate not valid"
            );
            return Err(IssuanceError::Policy(format!(
                "CA certificate not valid at {now}"
            )));
        }
        Ok(())
    }
}

impl Issuer for CaPolicy {
    fn issuer_name(&self) -> Name {
        self.certificate.subject().clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.signer
    }

    fn key_identifier(&self) -> crate::error::Result<Vec<u8>> {
        self.certificate.subject_key_id()
    }
}

#[async_trait]
impl ChainBuilder for CaPolicy {
    async fn create_chain(
        &self,
        _ctx: &RequestContext,
        csr: &CertificateRequest,
    ) -> Result<CertificateChain, IssuanceError> {
        CaPolicy::create_chain(self, csr)
    }
}

/// A random positive 160-bit serial number.
fn random_serial() -> [u8; 20] {
    let mut serial: [u8; 20] = rand::random();
    serial[0] = (serial[0] & 0x7f) | 0x40;
    serial
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
