#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ca_renewal::cert::extensions::KeyUsages;
use ca_renewal::cert::params::{CertificateTemplate, SubjectName, Validity};
use ca_renewal::cert::{Certificate, CertificateChain};
use ca_renewal::csr::CertificateRequest;
use ca_renewal::key::KeyPair;
use ca_renewal::policy::CaPolicy;
use ca_renewal::renewal::Signer;
use time::OffsetDateTime;

pub struct CaWithKey {
    pub cert: Certificate,
    pub key: Arc<KeyPair>,
}

impl CaWithKey {
    pub fn policy(&self) -> CaPolicy {
        CaPolicy::builder()
            .validity(Duration::from_secs(3 * 24 * 3600))
            .certificate(self.cert.clone())
            .signer(self.key.clone())
            .build()
    }
}

pub fn generate_ca_cert(ia: &str) -> CaWithKey {
    let key = KeyPair::generate_ecdsa_p256();

    let subject = SubjectName::builder()
        .ia(ia.parse().unwrap())
        .common_name(format!("{ia} CA Certificate"))
        .organization("myca.local".to_string())
        .build();

    let template = CertificateTemplate::builder()
        .subject(subject.as_x509_name().unwrap())
        .subject_public_key(key.as_spki().unwrap())
        .serial_number(vec![0x01])
        .validity(
            Validity::starting_at(
                OffsetDateTime::now_utc() - time::Duration::hours(1),
                Duration::from_secs(7 * 24 * 3600),
            )
            .unwrap(),
        )
        .is_ca(true)
        .max_path_length(0)
        .key_usage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
        .build();

    CaWithKey {
        cert: Certificate::new_self_signed(&template, &key).unwrap(),
        key: Arc::new(key),
    }
}

pub fn generate_csr(ia: &str) -> (KeyPair, CertificateRequest) {
    let key = KeyPair::generate_ecdsa_p256();
    let subject = SubjectName::builder()
        .ia(ia.parse().unwrap())
        .common_name(format!("{ia} AS Certificate"))
        .build();
    let csr = CertificateRequest::build(&subject, &key).unwrap();
    (key, csr)
}

/// A chain for `ia` issued by `ca`, together with the key it certifies.
pub fn generate_as_chain(ca: &CaWithKey, ia: &str) -> (KeyPair, CertificateChain) {
    let (key, csr) = generate_csr(ia);
    let chain = ca.policy().create_chain(&csr).unwrap();
    (key, chain)
}

pub fn signer(key: KeyPair, chain: &CertificateChain) -> Signer {
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
