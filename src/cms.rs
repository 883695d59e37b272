//! CMS `SignedData` envelopes (RFC 5652) used for renewal requests and
//! responses.
//!
//! Every envelope carries its payload encapsulated, the signer's certificates,
//! and exactly one `SignerInfo` identified by subject key identifier. The
//! signed attributes bind the ISD-AS of the signer and an expiration time to
//! the signature.

use ::cms::cert::CertificateChoices;
use ::cms::content_info::{CmsVersion, ContentInfo};
use ::cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
    SignerInfos,
};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, OctetString, SetOfVec};
use der::{Decode, Encode, Tag, Tagged};
use time::OffsetDateTime;
use x509_cert::attr::Attribute;
use x509_cert::ext::pkix::SubjectKeyIdentifier;

use crate::addr::IA;
use crate::cert::params::{OID_NAME_IA, to_x509_time};
use crate::cert::{Certificate, CertificateChain};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey, SignatureAlgorithm};

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
/// Signed attribute holding the time after which the signature must no
/// longer be accepted.
pub const OID_SIGNATURE_EXPIRATION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55324.1.3.1");

/// Signing material for one envelope.
pub struct EnvelopeSigner<'a> {
    pub key: &'a KeyPair,
    /// Subject key identifier of the certificate holding `key`.
    pub subject_key_id: Vec<u8>,
    /// Certificates to embed, typically the signer's chain.
    pub certificates: Vec<Certificate>,
    pub ia: IA,
    pub signing_time: OffsetDateTime,
    pub expiration: OffsetDateTime,
}

/// Signed attributes of an envelope, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttributes {
    pub content_type: ObjectIdentifier,
    pub message_digest: Vec<u8>,
    pub signing_time: OffsetDateTime,
    pub ia: IA,
    pub expiration: OffsetDateTime,
}

/// A structurally decoded `SignedData` envelope with a single signer.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    signed_data: SignedData,
    payload: Vec<u8>,
    certificates: Vec<Certificate>,
}

impl SignedEnvelope {
    /// Wraps `payload` in a DER encoded `ContentInfo` signed by `signer`.
    pub fn sign(payload: &[u8], signer: &EnvelopeSigner<'_>) -> Result<Vec<u8>> {
        let algorithm = signer.key.signature_algorithm();

        let signed_attrs = SetOfVec::try_from(vec![
            attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA)?)?,
            attribute(
                ID_MESSAGE_DIGEST,
                Any::new(Tag::OctetString, algorithm.digest(payload))?,
            )?,
            attribute(
                ID_SIGNING_TIME,
                Any::encode_from(&to_x509_time(signer.signing_time)?)?,
            )?,
            attribute(
                OID_NAME_IA,
                Any::new(Tag::Utf8String, signer.ia.to_string().as_bytes())?,
            )?,
            attribute(
                OID_SIGNATURE_EXPIRATION,
                Any::encode_from(&to_x509_time(signer.expiration)?)?,
            )?,
        ])?;
        let signature = signer.key.sign_data(&signed_attrs.to_der()?)?;

        let signer_info = SignerInfo {
            version: CmsVersion::V3,
            sid: SignerIdentifier::SubjectKeyIdentifier(SubjectKeyIdentifier(OctetString::new(
                signer.subject_key_id.clone(),
            )?)),
            digest_alg: algorithm.digest_algorithm(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: algorithm.into(),
            signature: OctetString::new(signature)?,
            unsigned_attrs: None,
        };

        let certificates = signer
            .certificates
            .iter()
            .map(|cert| CertificateChoices::Certificate(cert.inner.clone()))
            .collect::<Vec<_>>();

        let signed_data = SignedData {
            version: CmsVersion::V3,
            digest_algorithms: SetOfVec::try_from(vec![algorithm.digest_algorithm()])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: Some(Any::new(Tag::OctetString, payload)?),
            },
            certificates: Some(CertificateSet(SetOfVec::try_from(certificates)?)),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };

        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data)?,
        };
        Ok(content_info.to_der()?)
    }

    /// Decodes the envelope structure. No signature or certificate is checked.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let content_info = ContentInfo::from_der(bytes)?;
        if content_info.content_type != ID_SIGNED_DATA {
            return Err(PkiError::Decoding(format!(
                "unexpected content type {}",
                content_info.content_type
            )));
        }
        let signed_data = content_info.content.decode_as::<SignedData>()?;

        if signed_data.signer_infos.0.len() != 1 {
            return Err(PkiError::Decoding(format!(
                "expected exactly one signer, found {}",
                signed_data.signer_infos.0.len()
            )));
        }

        let econtent = signed_data
            .encap_content_info
            .econtent
            .as_ref()
            .ok_or_else(|| PkiError::Decoding("envelope has no encapsulated content".to_string()))?;
        if econtent.tag() != Tag::OctetString {
            return Err(PkiError::Decoding(format!(
                "encapsulated content has tag {}, expected OCTET STRING",
                econtent.tag()
            )));
        }
        let payload = econtent.value().to_vec();

        let certificates = signed_data
            .certificates
            .iter()
            .flat_map(|set| set.0.iter())
            .map(|choice| match choice {
                CertificateChoices::Certificate(cert) => Ok(Certificate::from(cert.clone())),
                _ => Err(PkiError::Decoding(
                    "unsupported certificate format in envelope".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        let envelope = Self {
            signed_data,
            payload,
            certificates,
        };
        envelope.signer_key_id()?;
        if envelope.signer_info()?.signed_attrs.is_none() {
            return Err(PkiError::Decoding("signer has no signed attributes".to_string()));
        }
        Ok(envelope)
    }

    /// The encapsulated content.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// All certificates embedded in the envelope.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    fn signer_info(&self) -> Result<&SignerInfo> {
        self.signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .ok_or_else(|| PkiError::Decoding("envelope has no signer".to_string()))
    }

    /// Subject key identifier of the signing certificate.
    pub fn signer_key_id(&self) -> Result<Vec<u8>> {
        match &self.signer_info()?.sid {
            SignerIdentifier::SubjectKeyIdentifier(ski) => Ok(ski.0.as_bytes().to_vec()),
            SignerIdentifier::IssuerAndSerialNumber(_) => Err(PkiError::Decoding(
                "signer must be identified by subject key identifier".to_string(),
            )),
        }
    }

    /// Assembles the signer's chain from the embedded certificates: the leaf
    /// is the certificate whose key id matches the signer, the issuer the one
    /// matching the leaf's authority key id.
    pub fn signer_chain(&self) -> Result<CertificateChain> {
        let signer_key_id = self.signer_key_id()?;
        let leaf = self.signer_certificate()?;
        let authority_key_id = leaf.authority_key_id()?.ok_or_else(|| {
            PkiError::Verification("signer certificate has no authority key id".to_string())
        })?;
        if authority_key_id == signer_key_id {
            return Err(PkiError::Verification(
                "signer certificate is self-signed".to_string(),
            ));
        }
        let issuer = self.find_by_key_id(&authority_key_id).ok_or_else(|| {
            PkiError::Verification("issuer certificate not in envelope".to_string())
        })?;
        Ok(CertificateChain::new(leaf.clone(), issuer.clone()))
    }

    /// The embedded certificate matching the signer identifier.
    pub fn signer_certificate(&self) -> Result<&Certificate> {
        self.find_by_key_id(&self.signer_key_id()?)
            .ok_or_else(|| PkiError::Verification("signer certificate not in envelope".to_string()))
    }

    /// Certificates without a usable subject key identifier never match.
    fn find_by_key_id(&self, key_id: &[u8]) -> Option<&Certificate> {
        self.certificates
            .iter()
            .find(|cert| cert.subject_key_id().is_ok_and(|id| id == key_id))
    }

    /// Decodes the signed attributes. All five attributes are mandatory.
    pub fn signed_attributes(&self) -> Result<SignedAttributes> {
        let attrs = self
            .signer_info()?
            .signed_attrs
            .as_ref()
            .ok_or_else(|| PkiError::Decoding("signer has no signed attributes".to_string()))?;

        let content_type: ObjectIdentifier = single_value(attrs, ID_CONTENT_TYPE)?.decode_as()?;
        let message_digest: OctetString = single_value(attrs, ID_MESSAGE_DIGEST)?.decode_as()?;
        let signing_time = decode_time(single_value(attrs, ID_SIGNING_TIME)?)?;
        let ia = single_value(attrs, OID_NAME_IA)?
            .decode_as::<String>()?
            .parse::<IA>()?;
        let expiration = decode_time(single_value(attrs, OID_SIGNATURE_EXPIRATION)?)?;

        Ok(SignedAttributes {
            content_type,
            message_digest: message_digest.as_bytes().to_vec(),
            signing_time,
            ia,
            expiration,
        })
    }

    /// Verifies the signer's signature over the signed attributes with `key`,
    /// and that the attributes bind the encapsulated payload.
    pub fn verify_signature(&self, key: &PublicKey) -> Result<()> {
        let signer_info = self.signer_info()?;
        let algorithm = SignatureAlgorithm::from_oid(signer_info.signature_algorithm.oid)?;
        if signer_info.digest_alg.oid != algorithm.digest_algorithm().oid {
            return Err(PkiError::Verification(format!(
                "digest algorithm {} does not match signature algorithm {algorithm}",
                signer_info.digest_alg.oid
            )));
        }

        let attrs = self.signed_attributes()?;
        if attrs.content_type != self.signed_data.encap_content_info.econtent_type {
            return Err(PkiError::Verification(
                "content type attribute does not match encapsulated content".to_string(),
            ));
        }
        if attrs.message_digest != algorithm.digest(&self.payload) {
            return Err(PkiError::Verification(
                "message digest does not match payload".to_string(),
            ));
        }

        let signed_attrs = signer_info
            .signed_attrs
            .as_ref()
            .ok_or_else(|| PkiError::Decoding("signer has no signed attributes".to_string()))?;
        key.verify(
            &signed_attrs.to_der()?,
            signer_info.signature.as_bytes(),
            algorithm,
        )
    }
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

fn single_value(attrs: &SetOfVec<Attribute>, oid: ObjectIdentifier) -> Result<&Any> {
    let mut matching = attrs.iter().filter(|attr| attr.oid == oid);
    let attr = matching
        .next()
        .ok_or_else(|| PkiError::Decoding(format!("missing signed attribute {oid}")))?;
    if matching.next().is_some() {
        return Err(PkiError::Decoding(format!("duplicate signed attribute {oid}")));
    }
    let mut values = attr.values.iter();
    match (values.next(), values.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(PkiError::Decoding(format!(
            "signed attribute {oid} must have exactly one value"
        ))),
    }
}

fn decode_time(value: &Any) -> Result<OffsetDateTime> {
    let time = x509_cert::time::Time::from_der(&value.to_der()?)?;
    Ok(OffsetDateTime::from(time.to_system_time()))
}
