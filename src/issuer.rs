use der::flagset::FlagSet;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectKeyIdentifier,
};
use crate::cert::params::{CertificateTemplate, ExtensionParam};
use crate::error::Result;
use crate::key::{self, KeyPair};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
pub trait Issuer {
    /// Returns the subject name of the issuer.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the issuer's subject key identifier, used as the authority
    /// key identifier of everything it signs.
    fn key_identifier(&self) -> Result<Vec<u8>>;

    /// Issues a certificate for `template`.
    ///
    /// The subject key identifier is derived from the template's public key
    /// and the authority key identifier from [`Issuer::key_identifier`], so
    /// that every link in a chain uses the same derivation.
    fn issue(&self, template: &CertificateTemplate) -> Result<Certificate> {
        let subject_key_id = key::subject_key_id(&template.subject_public_key);

        let basic_constraints = BasicConstraints {
            is_ca: template.is_ca,
            max_path_length: if template.is_ca {
                template.max_path_length
            } else {
                None
            },
        };

        let mut key_usage_flags: FlagSet<KeyUsages> = template.key_usage;
        if template.is_ca {
            key_usage_flags |= KeyUsages::KeyCertSign;
        }

        let mut extensions = vec![
            ExtensionParam::from_extension(SubjectKeyIdentifier(subject_key_id), false)?,
            ExtensionParam::from_extension(
                AuthorityKeyIdentifier {
                    key_identifier: self.key_identifier()?,
                },
                false,
            )?,
            ExtensionParam::from_extension(basic_constraints, true)?,
        ];

        if !key_usage_flags.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                KeyUsage(key_usage_flags),
                true,
            )?);
        }

        if !template.usages.is_empty() {
            extensions.push(ExtensionParam::from_extension(
                ExtendedKeyUsage {
                    usage: template.usages.clone(),
                },
                false,
            )?);
        }

        let tbs_cert = TbsCertificate {
            serial_number: template.serial_number.clone(),
            signature_algorithm: self.signing_key().signature_algorithm(),
            issuer: self.issuer_name(),
            validity: template.validity,
            subject: template.subject.clone(),
            subject_public_key_info: template.subject_public_key.clone(),
            extensions,
        };
        tbs_cert.sign(self.signing_key())
    }
}

/// Issuer for self-signed certificates: subject and issuer coincide.
pub(crate) struct SelfIssuer<'a> {
    pub(crate) name: Name,
    pub(crate) key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn key_identifier(&self) -> Result<Vec<u8>> {
        Ok(key::subject_key_id(&self.key.as_spki()?))
    }
}
