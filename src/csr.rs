//! PKCS#10 certificate signing requests carrying an ISD-AS subject.

use der::asn1::BitString;
use der::{Decode, Encode};
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::addr::IA;
use crate::cert::params::{SubjectName, ia_from_name};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey, SignatureAlgorithm};

/// A decoded certificate signing request.
///
/// The raw DER is kept alongside the parsed form so that requests compare
/// and re-encode byte-for-byte as they were received.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    inner: CertReq,
    raw: Vec<u8>,
}

impl PartialEq for CertificateRequest {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for CertificateRequest {}

impl CertificateRequest {
    /// Creates a request for `subject`, proving possession of `key`.
    pub fn build(subject: &SubjectName, key: &KeyPair) -> Result<Self> {
        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: Default::default(),
        };
        let signature = key.sign_data(&info.to_der()?)?;
        let inner = CertReq {
            info,
            algorithm: key.signature_algorithm().into(),
            signature: BitString::from_bytes(&signature)?,
        };
        let raw = inner.to_der()?;
        Ok(Self { inner, raw })
    }

    /// Decodes a DER request. The self-signature is not checked.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der)?;
        Ok(Self {
            inner,
            raw: der.to_vec(),
        })
    }

    /// The DER encoding the request was built from or decoded from.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    /// The ISD-AS the requester asks to be certified for.
    pub fn subject_ia(&self) -> Result<IA> {
        ia_from_name(self.subject())
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    /// Checks the request signature against the key it carries, proving the
    /// requester holds the private half of the key to be certified.
    pub fn verify_self_signature(&self) -> Result<()> {
        let algorithm = SignatureAlgorithm::from_oid(self.inner.algorithm.oid)?;
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or_else(|| PkiError::Signature("signature has unused bits".to_string()))?;
        let key = PublicKey::from_spki(self.public_key_info())?;
        key.verify(&self.inner.info.to_der()?, signature, algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(ia: &str) -> SubjectName {
        SubjectName::builder()
            .ia(ia.parse().unwrap())
            .common_name(format!("{ia} AS Certificate"))
            .build()
    }

    #[test]
    fn build_and_decode() {
        let key = KeyPair::generate_ecdsa_p256();
        let csr = CertificateRequest::build(&subject("1-ff00:0:111"), &key).unwrap();
        let decoded = CertificateRequest::from_der(csr.raw()).unwrap();
        assert_eq!(decoded, csr);
        assert_eq!(decoded.subject_ia().unwrap(), "1-ff00:0:111".parse().unwrap());
        assert_eq!(decoded.public_key_info(), &key.as_spki().unwrap());
        decoded.verify_self_signature().unwrap();
    }

    #[test]
    fn ed25519_request_verifies() {
        let key = KeyPair::generate_ed25519();
        let csr = CertificateRequest::build(&subject("1-ff00:0:111"), &key).unwrap();
        csr.verify_self_signature().unwrap();
    }

    #[test]
    fn tampered_request_fails_verification() {
        let key = KeyPair::generate_ecdsa_p256();
        let mut csr = CertificateRequest::build(&subject("1-ff00:0:111"), &key).unwrap();
        csr.inner.info.subject = subject("1-ff00:0:112").as_x509_name().unwrap();
        assert!(csr.verify_self_signature().is_err());
    }

    #[test]
    fn garbage_is_a_decoding_error() {
        assert!(matches!(
            CertificateRequest::from_der(b"not a csr"),
            Err(PkiError::Decoding(_))
        ));
    }
}
