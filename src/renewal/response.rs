//! Renewal responses: the issued chain wrapped in a CA-signed envelope.

use der::{Decode, Encode};
use time::OffsetDateTime;

use crate::cert::{Certificate, CertificateChain};
use crate::cms::SignedEnvelope;
use crate::error::{PkiError, Result};

/// Encodes `chain` as a DER `SEQUENCE OF Certificate`, AS certificate first.
pub fn encode_chain(chain: &CertificateChain) -> Result<Vec<u8>> {
    let certs: Vec<x509_cert::Certificate> =
        chain.to_vec().into_iter().map(|cert| cert.inner).collect();
    Ok(certs.to_der()?)
}

/// Decodes a chain encoded with [`encode_chain`].
pub fn decode_chain(der: &[u8]) -> Result<CertificateChain> {
    let certs = Vec::<x509_cert::Certificate>::from_der(der)?;
    CertificateChain::from_certificates(certs.into_iter().map(Certificate::from).collect())
}

/// Opens a renewal response and returns the issued chain.
///
/// The response must be signed by one of `trust_anchors`, or by a
/// certificate one of them issued, and must not have expired. The returned
/// chain is validated and must be issued by a trust anchor.
pub fn verify_chain_renewal_response(
    response: &[u8],
    trust_anchors: &[Certificate],
    now: OffsetDateTime,
) -> Result<CertificateChain> {
    let envelope = SignedEnvelope::decode(response)?;
    let signer = envelope.signer_certificate()?;
    if !signer.validity().contains(now) {
        return Err(PkiError::Validity(format!("response signer not valid at {now}")));
    }
    let trusted = trust_anchors.iter().any(|anchor| {
        anchor == signer
            || (anchor.is_ca().unwrap_or(false) && signer.verify_signed_by(anchor).is_ok())
    });
    if !trusted {
        return Err(PkiError::Verification(
            "response not signed by a trusted CA".to_string(),
        ));
    }
    envelope.verify_signature(&signer.public_key()?)?;

    let attrs = envelope.signed_attributes()?;
    if attrs.expiration < now {
        return Err(PkiError::Validity(format!(
            "response expired at {}",
            attrs.expiration
        )));
    }

    let chain = decode_chain(envelope.payload())?;
    chain.validate()?;
    if !trust_anchors.iter().any(|anchor| anchor == chain.issuer()) {
        return Err(PkiError::Verification(
            "issued chain not rooted in a trusted CA".to_string(),
        ));
    }
    chain.verify_validity_at(now)?;
    Ok(chain)
}
