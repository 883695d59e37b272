//! Two-element certificate chains: an AS certificate and its issuing CA.

use time::OffsetDateTime;

use super::Certificate;
use crate::addr::IA;
use crate::error::{PkiError, Result};

/// An AS certificate together with the CA certificate that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    leaf: Certificate,
    issuer: Certificate,
}

impl CertificateChain {
    /// Pairs `leaf` with `issuer` without checking anything. Use
    /// [`validate`](Self::validate) before trusting the result.
    pub fn new(leaf: Certificate, issuer: Certificate) -> Self {
        Self { leaf, issuer }
    }

    /// Builds a chain out of a two-element slice ordered `[leaf, issuer]`.
    pub fn from_certificates(certs: Vec<Certificate>) -> Result<Self> {
        let [leaf, issuer]: [Certificate; 2] = certs.try_into().map_err(|certs: Vec<_>| {
            PkiError::InvalidInput(format!("chain must have 2 certificates, got {}", certs.len()))
        })?;
        Ok(Self { leaf, issuer })
    }

    pub fn leaf(&self) -> &Certificate {
        &self.leaf
    }

    pub fn issuer(&self) -> &Certificate {
        &self.issuer
    }

    /// The ISD-AS of the leaf certificate.
    pub fn ia(&self) -> Result<IA> {
        self.leaf.ia()
    }

    pub fn to_vec(&self) -> Vec<Certificate> {
        vec![self.leaf.clone(), self.issuer.clone()]
    }

    /// Checks the structural chain invariants:
    ///
    /// * the leaf is not a CA, the issuer is;
    /// * the leaf's authority key id equals the issuer's subject key id;
    /// * the leaf validity lies within the issuer validity;
    /// * the leaf signature verifies under the issuer key.
    pub fn validate(&self) -> Result<()> {
        if self.leaf.is_ca()? {
            return Err(PkiError::Certificate("leaf certificate is a CA".to_string()));
        }
        if !self.issuer.is_ca()? {
            return Err(PkiError::Certificate(
                "issuer certificate is not a CA".to_string(),
            ));
        }
        let authority_key_id = self.leaf.authority_key_id()?.ok_or_else(|| {
            PkiError::Certificate("leaf has no authority key identifier".to_string())
        })?;
        if authority_key_id != self.issuer.subject_key_id()? {
            return Err(PkiError::Certificate(
                "leaf authority key id does not match issuer subject key id".to_string(),
            ));
        }
        if !self.issuer.validity().covers(&self.leaf.validity()) {
            return Err(PkiError::Validity(
                "leaf certificate validity exceeds its issuer's".to_string(),
            ));
        }
        self.leaf.verify_signed_by(&self.issuer)
    }

    /// Checks that both certificates are valid at `time`.
    pub fn verify_validity_at(&self, time: OffsetDateTime) -> Result<()> {
        for (role, cert) in [("leaf", &self.leaf), ("issuer", &self.issuer)] {
            let validity = cert.validity();
            if !validity.contains(time) {
                return Err(PkiError::Validity(format!(
                    "{role} certificate not valid at {time}: [{}, {}]",
                    validity.not_before, validity.not_after
                )));
            }
        }
        Ok(())
    }

    /// Encodes the chain as concatenated PEM blocks, leaf first.
    pub fn to_pem(&self) -> Result<String> {
        let mut out = String::new();
        for cert in [&self.leaf, &self.issuer] {
            out.push_str(&cert.to_pem()?);
        }
        Ok(out)
    }

    /// Parses a PEM bundle containing exactly two certificates, leaf first.
    pub fn from_pem(bundle: &str) -> Result<Self> {
        let blocks = pem::parse_many(bundle).map_err(|e| PkiError::Decoding(e.to_string()))?;
        let certs = blocks
            .iter()
            .filter(|block| block.tag() == "CERTIFICATE")
            .map(|block| Certificate::from_der(block.contents()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_certificates(certs)
    }
}
