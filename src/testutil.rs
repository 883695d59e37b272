//! Fixtures shared by the unit tests.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::cert::extensions::KeyUsages;
use crate::cert::params::{CertificateTemplate, SubjectName, Validity};
use crate::cert::{Certificate, CertificateChain};
use crate::csr::CertificateRequest;
use crate::key::KeyPair;
use crate::policy::CaPolicy;
use crate::renewal::Signer;

/// A self-signed P-256 CA certificate for `ia`, valid for a week.
pub(crate) fn ca(ia: &str) -> (KeyPair, Certificate) {
    let key = KeyPair::generate_ecdsa_p256();
    let subject = SubjectName::builder()
        .ia(ia.parse().unwrap())
        .common_name(format!("{ia} CA Certificate"))
        .build();
    let template = CertificateTemplate::builder()
        .subject(subject.as_x509_name().unwrap())
        .subject_public_key(key.as_spki().unwrap())
        .serial_number(vec![0x01, 0x23, 0x45])
        .validity(
            Validity::starting_at(OffsetDateTime::now_utc(), Duration::from_secs(7 * 24 * 3600))
                .unwrap(),
        )
        .is_ca(true)
        .max_path_length(0)
        .key_usage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
        .build();
    let cert = Certificate::new_self_signed(&template, &key).unwrap();
    (key, cert)
}

/// A CA policy for `ca_ia` issuing hour-long certificates.
pub(crate) fn policy(ca_ia: &str) -> CaPolicy {
    let (key, cert) = ca(ca_ia);
    CaPolicy::builder()
        .validity(Duration::from_secs(3600))
        .certificate(cert)
        .signer(Arc::new(key))
        .build()
}

/// A certificate request for `ia` with a fresh P-256 key.
pub(crate) fn csr(ia: &str) -> (KeyPair, CertificateRequest) {
    let key = KeyPair::generate_ecdsa_p256();
    let subject = SubjectName::builder().ia(ia.parse().unwrap()).build();
    let csr = CertificateRequest::build(&subject, &key).unwrap();
    (key, csr)
}

/// An AS chain for `client_ia` issued by a fresh CA for `ca_ia`.
pub(crate) fn client_chain(ca_ia: &str, client_ia: &str) -> (KeyPair, CertificateChain) {
    let policy = policy(ca_ia);
    let (key, csr) = csr(client_ia);
    let chain = policy.create_chain(&csr).unwrap();
    (key, chain)
}

/// A requester-side signer for `chain`, with the signature expiring a
/// minute before the chain does.
pub(crate) fn signer(key: KeyPair, chain: &CertificateChain) -> Signer {
    let validity = chain.leaf().validity();
    Signer::builder()
        .algorithm(key.signature_algorithm())
        .private_key(Arc::new(key))
        .chain(chain.clone())
        .chain_validity(validity)
        .expiration(validity.not_after - time::Duration::minutes(1))
        .ia(chain.ia().unwrap())
        .subject_key_id(chain.leaf().subject_key_id().unwrap())
        .build()
}
