use std::time::SystemTime;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::Tag;
use der::asn1::{Any, GeneralizedTime, SetOfVec, UtcTime};
use der::flagset::FlagSet;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::addr::IA;
use crate::cert::extensions::KeyUsages;
use crate::error::{PkiError, Result};

/// Name attribute carrying the ISD-AS identifier of a certificate subject.
pub const OID_NAME_IA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55324.1.2.1");

const OID_COMMON_NAME: ObjectIdentifier = const_oid::db::rfc4519::CN;
const OID_ORGANIZATION: ObjectIdentifier = const_oid::db::rfc4519::O;

/// Subject name of an AS or CA certificate.
///
/// The IA attribute is mandatory; common name and organization are
/// informational only.
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct SubjectName {
    pub ia: IA,
    pub common_name: Option<String>,
    pub organization: Option<String>,
}

impl SubjectName {
    /// Converts the subject to an X.509 name.
    pub fn as_x509_name(&self) -> Result<Name> {
        let mut rdns = Vec::new();
        if let Some(cn) = &self.common_name {
            rdns.push(single_rdn(OID_COMMON_NAME, cn)?);
        }
        if let Some(org) = &self.organization {
            rdns.push(single_rdn(OID_ORGANIZATION, org)?);
        }
        rdns.push(single_rdn(OID_NAME_IA, &self.ia.to_string())?);
        Ok(RdnSequence(rdns))
    }
}

fn single_rdn(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    let atv = AttributeTypeAndValue {
        oid,
        value: Any::new(Tag::Utf8String, value.as_bytes())?,
    };
    Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
}

/// Extracts the ISD-AS identifier from the IA name attribute.
///
/// Fails if the attribute is missing, appears more than once, or does not
/// hold a valid identifier.
pub fn ia_from_name(name: &Name) -> Result<IA> {
    let mut found = None;
    for attr in name.0.iter().flat_map(|rdn| rdn.0.iter()) {
        if attr.oid != OID_NAME_IA {
            continue;
        }
        if found.is_some() {
            return Err(PkiError::InvalidInput(
                "subject contains multiple ISD-AS attributes".to_string(),
            ));
        }
        let value = attr.value.decode_as::<String>().map_err(|e| {
            PkiError::InvalidInput(format!("ISD-AS attribute is not a UTF8String: {e}"))
        })?;
        found = Some(value.parse::<IA>()?);
    }
    found.ok_or_else(|| PkiError::InvalidInput("subject has no ISD-AS attribute".to_string()))
}

/// Certificate validity period.
///
/// Both bounds are truncated to whole seconds, the resolution X.509 can
/// carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    pub fn new(not_before: OffsetDateTime, not_after: OffsetDateTime) -> Result<Self> {
        let validity = Self {
            not_before: truncate(not_before)?,
            not_after: truncate(not_after)?,
        };
        if validity.not_after < validity.not_before {
            return Err(PkiError::Validity(format!(
                "not_after {} precedes not_before {}",
                validity.not_after, validity.not_before
            )));
        }
        Ok(validity)
    }

    /// Creates a validity period of `duration` starting at `start`.
    pub fn starting_at(start: OffsetDateTime, duration: std::time::Duration) -> Result<Self> {
        let end = checked_add(start, duration).ok_or_else(|| {
            PkiError::Validity(format!("validity of {duration:?} from {start} out of range"))
        })?;
        Self::new(start, end)
    }

    /// Reports whether `time` lies inside the window (bounds inclusive).
    pub fn contains(&self, time: OffsetDateTime) -> bool {
        self.not_before <= time && time <= self.not_after
    }

    /// Reports whether this window fully encloses `other`.
    pub fn covers(&self, other: &Validity) -> bool {
        self.not_before <= other.not_before && other.not_after <= self.not_after
    }

    /// Shortens the window so that it ends no later than `outer` does.
    pub fn clamp_to(&self, outer: &Validity) -> Self {
        Self {
            not_before: self.not_before,
            not_after: self.not_after.min(outer.not_after),
        }
    }

    pub(crate) fn to_x509(self) -> Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    pub(crate) fn from_x509(validity: &x509_cert::time::Validity) -> Self {
        Self {
            not_before: OffsetDateTime::from(validity.not_before.to_system_time()),
            not_after: OffsetDateTime::from(validity.not_after.to_system_time()),
        }
    }
}

/// `at + duration`, or `None` if the result is not a representable date.
pub(crate) fn checked_add(
    at: OffsetDateTime,
    duration: std::time::Duration,
) -> Option<OffsetDateTime> {
    at.checked_add(time::Duration::try_from(duration).ok()?)
}

/// `at - duration`, or `None` if the result is not a representable date.
pub(crate) fn checked_sub(
    at: OffsetDateTime,
    duration: std::time::Duration,
) -> Option<OffsetDateTime> {
    at.checked_sub(time::Duration::try_from(duration).ok()?)
}

fn truncate(time: OffsetDateTime) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(time.unix_timestamp())
        .map_err(|e| PkiError::Validity(e.to_string()))
}

/// Encodes a timestamp as UTCTime until 2049 and GeneralizedTime afterwards
/// (RFC 5280, section 4.1.2.5).
pub(crate) fn to_x509_time(time: OffsetDateTime) -> Result<x509_cert::time::Time> {
    let system_time = SystemTime::from(time);
    if time.year() < 2050 {
        Ok(x509_cert::time::Time::UtcTime(UtcTime::from_system_time(
            system_time,
        )?))
    } else {
        Ok(x509_cert::time::Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time)?,
        ))
    }
}

/// An X.509 extension in encoded form.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Encodes `extension` into an `ExtensionParam`.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }
}

/// Everything an issuer needs to know about the certificate it is asked to
/// sign. Issuer name, authority key identifier and signature algorithm are
/// filled in by the [`Issuer`](crate::issuer::Issuer).
#[derive(Clone, Debug, Builder)]
pub struct CertificateTemplate {
    pub subject: Name,
    pub subject_public_key: SubjectPublicKeyInfoOwned,
    pub serial_number: Vec<u8>,
    pub validity: Validity,
    #[builder(default)]
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
    #[builder(default)]
    pub key_usage: FlagSet<KeyUsages>,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
}
