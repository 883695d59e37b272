//! Runs one renewal round trip in-process: an AS holding a chain from the
//! CA asks for a fresh one and opens the signed response.
//!
//! `RUST_LOG=debug cargo run --example renewal`

use std::sync::Arc;
use std::time::Duration;

use ca_renewal::cert::Certificate;
use ca_renewal::cert::extensions::KeyUsages;
use ca_renewal::cert::params::{CertificateTemplate, SubjectName, Validity};
use ca_renewal::config::CaConfig;
use ca_renewal::context::RequestContext;
use ca_renewal::csr::CertificateRequest;
use ca_renewal::key::KeyPair;
use ca_renewal::renewal::{Signer, new_chain_renewal_request, verify_chain_renewal_response};
use ca_renewal::server::{Cms, RenewalMetrics, RenewalServer};
use prometheus::{Encoder, Registry, TextEncoder};
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CONFIG: &str = r#"
ia = "1-ff00:0:110"
validity = "3d"
max_clock_skew = "5s"
response_lifetime = "10m"
"#;

fn ca_certificate(config: &CaConfig, key: &KeyPair) -> Result<Certificate, Box<dyn std::error::Error>> {
    let subject = SubjectName::builder()
        .ia(config.ia)
        .common_name(format!("{} CA Certificate", config.ia))
        .build();
    let template = CertificateTemplate::builder()
        .subject(subject.as_x509_name()?)
        .subject_public_key(key.as_spki()?)
        .serial_number(vec![0x01])
        .validity(Validity::starting_at(
            OffsetDateTime::now_utc(),
            Duration::from_secs(30 * 24 * 3600),
        )?)
        .is_ca(true)
        .max_path_length(0)
        .key_usage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)
        .build();
    Ok(Certificate::new_self_signed(&template, key)?)
}

fn as_request(ia: &str) -> Result<(KeyPair, CertificateRequest), Box<dyn std::error::Error>> {
    let key = KeyPair::generate_ecdsa_p256();
    let subject = SubjectName::builder()
        .ia(ia.parse()?)
        .common_name(format!("{ia} AS Certificate"))
        .build();
    let csr = CertificateRequest::build(&subject, &key)?;
    Ok((key, csr))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = CaConfig::from_toml_str(CONFIG)?;
    let ca_key = Arc::new(KeyPair::generate_ecdsa_p256());
    let ca_cert = ca_certificate(&config, &ca_key)?;
    let policy = config.policy(ca_cert.clone(), ca_key.clone())?;

    let registry = Registry::new();
    let metrics = RenewalMetrics::register(&registry)?;
    let handler = Cms::builder()
        .verifier(Arc::new(config.verifier(vec![ca_cert.clone()])))
        .chain_builder(Arc::new(policy.clone()))
        .ia(config.ia)
        .metrics(metrics.cms_handler())
        .build();
    let server = RenewalServer::builder()
        .cms_handler(Arc::new(handler))
        .cms_signer(Arc::new(config.response_signer(ca_cert.clone(), ca_key)?))
        .metrics(metrics.server())
        .build();

    // Initial chain, issued out of band.
    let (as_key, csr) = as_request("1-ff00:0:111")?;
    let current = policy.create_chain(&csr)?;
    info!(not_after = %current.leaf().validity().not_after, "initial chain issued");

    let validity = current.leaf().validity();
    let signer = Signer::builder()
        .algorithm(as_key.signature_algorithm())
        .private_key(Arc::new(as_key))
        .chain(current.clone())
        .chain_validity(validity)
        .expiration(validity.not_after)
        .ia(current.ia()?)
        .subject_key_id(current.leaf().subject_key_id()?)
        .build();

    let (_, next_csr) = as_request("1-ff00:0:111")?;
    let request = new_chain_renewal_request(&RequestContext::new(), next_csr.raw(), &signer)?;
    let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
    let response = server.chain_renewal(&ctx, request).await?;

    let renewed = verify_chain_renewal_response(
        &response.cms_signed_response,
        &[ca_cert],
        OffsetDateTime::now_utc(),
    )?;
    info!(ia = %renewed.ia()?, "chain renewed");
    println!("{}", renewed.to_pem()?);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    println!("{}", String::from_utf8(buffer)?);
    Ok(())
}
