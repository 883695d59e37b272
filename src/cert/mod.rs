pub mod chain;
pub mod extensions;
pub mod params;

use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use params::{CertificateTemplate, Validity};
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

pub use chain::CertificateChain;

use crate::addr::IA;
use crate::error::{PkiError, Result};
use crate::issuer::{Issuer, SelfIssuer};
use crate::key::{KeyPair, PublicKey, SignatureAlgorithm};

/// An X.509 certificate.
///
/// Thin wrapper over [`x509_cert::Certificate`] exposing the attributes the
/// renewal protocol cares about: subject ISD-AS, key identifiers, validity
/// and CA status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: x509_cert::Certificate,
}

impl From<x509_cert::Certificate> for Certificate {
    fn from(inner: x509_cert::Certificate) -> Self {
        Self { inner }
    }
}

impl Certificate {
    /// Decodes a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: x509_cert::Certificate::from_der(der)?,
        })
    }

    /// Decodes a single PEM certificate.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: x509_cert::Certificate::from_pem(pem.as_bytes())?,
        })
    }

    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::Encoding(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| PkiError::Encoding(e.to_string()))
    }

    /// Creates a self-signed certificate from `template`, signed by `key`.
    ///
    /// `key` must be the private half of the template's subject public key.
    pub fn new_self_signed(template: &CertificateTemplate, key: &KeyPair) -> Result<Self> {
        if template.subject_public_key != key.as_spki()? {
            return Err(PkiError::InvalidInput(
                "self-signed template does not carry the signing key".to_string(),
            ));
        }
        let issuer = SelfIssuer {
            name: template.subject.clone(),
            key,
        };
        issuer.issue(template)
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    /// The ISD-AS identifier carried in the subject name.
    pub fn ia(&self) -> Result<IA> {
        params::ia_from_name(self.subject())
    }

    pub fn serial(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn validity(&self) -> Validity {
        Validity::from_x509(&self.inner.tbs_certificate.validity)
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_spki(self.public_key_info())
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(self.inner.signature_algorithm.oid)
    }

    /// Looks up and decodes extension `E`, if present.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        let extensions = self.inner.tbs_certificate.extensions.as_deref().unwrap_or_default();
        let mut matching = extensions.iter().filter(|ext| ext.extn_id == E::OID);
        let Some(ext) = matching.next() else {
            return Ok(None);
        };
        if matching.next().is_some() {
            return Err(PkiError::Certificate(format!("duplicate extension {}", E::OID)));
        }
        E::from_x509_extension_value(ext.extn_value.as_bytes()).map(Some)
    }

    /// The subject key identifier. Certificates without one are rejected.
    pub fn subject_key_id(&self) -> Result<Vec<u8>> {
        self.extension::<SubjectKeyIdentifier>()?
            .map(|ski| ski.0)
            .ok_or_else(|| PkiError::Certificate("missing subject key identifier".to_string()))
    }

    pub fn authority_key_id(&self) -> Result<Option<Vec<u8>>> {
        Ok(self
            .extension::<AuthorityKeyIdentifier>()?
            .map(|aki| aki.key_identifier))
    }

    pub fn is_ca(&self) -> Result<bool> {
        Ok(self
            .extension::<BasicConstraints>()?
            .is_some_and(|bc| bc.is_ca))
    }

    pub fn max_path_length(&self) -> Result<Option<u8>> {
        Ok(self
            .extension::<BasicConstraints>()?
            .and_then(|bc| bc.max_path_length))
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsage>> {
        self.extension::<KeyUsage>()
    }

    /// Verifies that this certificate was signed by `issuer`'s key.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> Result<()> {
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or_else(|| PkiError::Signature("signature has unused bits".to_string()))?;
        issuer
            .public_key()?
            .verify(&tbs, signature, self.signature_algorithm()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn self_signed_ca_attributes() {
        let (ca_key, ca) = testutil::ca("1-ff00:0:110");
        assert_eq!(ca.ia().unwrap(), "1-ff00:0:110".parse().unwrap());
        assert!(ca.is_ca().unwrap());
        assert_eq!(ca.max_path_length().unwrap(), Some(0));
        let ski = ca.subject_key_id().unwrap();
        assert_eq!(ski, crate::key::subject_key_id(&ca_key.as_spki().unwrap()));
        assert_eq!(ca.authority_key_id().unwrap(), Some(ski));
        ca.verify_signed_by(&ca).unwrap();
    }

    #[test]
    fn der_and_pem_roundtrip() {
        let (_, ca) = testutil::ca("1-ff00:0:110");
        assert_eq!(Certificate::from_der(&ca.to_der().unwrap()).unwrap(), ca);
        assert_eq!(Certificate::from_pem(&ca.to_pem().unwrap()).unwrap(), ca);
    }

    #[test]
    fn rejects_foreign_key_for_self_signed() {
        let (_, ca) = testutil::ca("1-ff00:0:110");
        let template = CertificateTemplate::builder()
            .subject(ca.subject().clone())
            .subject_public_key(ca.public_key_info().clone())
            .serial_number(vec![1])
            .validity(ca.validity())
            .build();
        let other = KeyPair::generate_ecdsa_p256();
        assert!(Certificate::new_self_signed(&template, &other).is_err());
    }

    #[test]
    fn signature_check_detects_wrong_issuer() {
        let (_, ca) = testutil::ca("1-ff00:0:110");
        let (_, other) = testutil::ca("1-ff00:0:120");
        assert!(ca.verify_signed_by(&other).is_err());
    }
}
