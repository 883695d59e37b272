use der::Encode;
use der::asn1::{BitString, OctetString};
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::Certificate;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, SignatureAlgorithm};

/// The "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian serial, at most 20 octets, positive.
/// * `signature_algorithm` - The algorithm the issuer signs with.
/// * `issuer` - The issuer's subject name.
/// * `validity` - The certificate's validity window.
/// * `subject` - The subject name, including the ISD-AS attribute.
/// * `subject_public_key_info` - The certified public key.
/// * `extensions` - Encoded X.509 extensions.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let serial_number = SerialNumber::new(self.serial_number.as_slice())
            .map_err(|e| PkiError::InvalidInput(format!("serial number: {e}")))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity: self.validity.to_x509()?,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }

    /// Signs the TBS structure with `key` and assembles the certificate.
    pub fn sign(&self, key: &KeyPair) -> Result<Certificate> {
        if key.signature_algorithm() != self.signature_algorithm {
            return Err(PkiError::InvalidInput(format!(
                "key signs with {}, TBS certificate declares {}",
                key.signature_algorithm(),
                self.signature_algorithm
            )));
        }
        let tbs_certificate = self.to_tbs_certificate_inner()?;
        let signature = key.sign_data(&tbs_certificate.to_der()?)?;
        Ok(Certificate {
            inner: x509_cert::Certificate {
                tbs_certificate,
                signature_algorithm: self.signature_algorithm.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }
}
