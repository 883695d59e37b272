mod util;

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use ca_renewal::context::RequestContext;
use ca_renewal::renewal::new_chain_renewal_request;
use regex::Regex;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ca-renewal-{}-{name}", std::process::id()))
}

fn openssl(args: &[&str]) -> String {
    let output = Command::new("openssl")
        .args(args)
        .output()
        .expect("Failed to execute OpenSSL command");
    assert!(
        output.status.success(),
        "OpenSSL command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_openssl_parses_issued_certificate() {
    let ca = util::generate_ca_cert("1-ff00:0:110");
    let (_, chain) = util::generate_as_chain(&ca, "1-ff00:0:111");

    let cert_path = temp_path("as_cert.pem");
    fs::write(&cert_path, chain.leaf().to_pem().unwrap()).expect("Failed to write AS certificate");

    let output_text = openssl(&["x509", "-in", cert_path.to_str().unwrap(), "-noout", "-text"]);

    assert!(
        output_text.contains("Version: 3 (0x2)"),
        "Version field is incorrect"
    );
    assert!(
        output_text.contains("Signature Algorithm: ecdsa-with-SHA256"),
        "Signature Algorithm field is incorrect"
    );
    assert!(output_text.contains("CA:FALSE"), "AS certificate must not be a CA");
    assert!(
        output_text.contains("Digital Signature"),
        "Key usage is missing digital signature"
    );
    for usage in [
        "TLS Web Server Authentication",
        "TLS Web Client Authentication",
        "Time Stamping",
    ] {
        assert!(output_text.contains(usage), "Extended key usage is missing {usage}");
    }
    assert!(
        !output_text.contains("Certificate Sign"),
        "AS certificate must not sign certificates"
    );

    let subject_regex = Regex::new(r"Subject:.*CN\s*=\s*1-ff00:0:111 AS Certificate").unwrap();
    let issuer_regex = Regex::new(r"Issuer:.*CN\s*=\s*1-ff00:0:110 CA Certificate").unwrap();
    assert!(subject_regex.is_match(&output_text), "Subject field is incorrect");
    assert!(issuer_regex.is_match(&output_text), "Issuer field is incorrect");

    let not_before_regex = Regex::new(r"Not Before: .+").unwrap();
    let not_after_regex = Regex::new(r"Not After : .+").unwrap();
    assert!(
        not_before_regex.is_match(&output_text),
        "Missing or incorrect Not Before field"
    );
    assert!(
        not_after_regex.is_match(&output_text),
        "Missing or incorrect Not After field"
    );

    fs::remove_file(cert_path).expect("Failed to remove test certificate");
}

#[test]
fn test_openssl_verifies_issued_chain() {
    let ca = util::generate_ca_cert("1-ff00:0:110");
    let (_, chain) = util::generate_as_chain(&ca, "1-ff00:0:111");

    let ca_path = temp_path("ca_cert.pem");
    let leaf_path = temp_path("leaf_cert.pem");
    fs::write(&ca_path, ca.cert.to_pem().unwrap()).unwrap();
    fs::write(&leaf_path, chain.leaf().to_pem().unwrap()).unwrap();

    let output_text = openssl(&[
        "verify",
        "-CAfile",
        ca_path.to_str().unwrap(),
        leaf_path.to_str().unwrap(),
    ]);
    assert!(output_text.contains("OK"), "Chain verification failed: {output_text}");

    fs::remove_file(ca_path).unwrap();
    fs::remove_file(leaf_path).unwrap();
}

#[test]
fn test_openssl_opens_renewal_request() {
    let ca = util::generate_ca_cert("1-ff00:0:110");
    let (key, chain) = util::generate_as_chain(&ca, "1-ff00:0:111");
    let (_, csr) = util::generate_csr("1-ff00:0:111");
    let request =
        new_chain_renewal_request(&RequestContext::new(), csr.raw(), &util::signer(key, &chain))
            .unwrap();

    let request_path = temp_path("request.der");
    let payload_path = temp_path("payload.der");
    fs::write(&request_path, &request.cms_signed_request).unwrap();

    openssl(&[
        "cms",
        "-verify",
        "-noverify",
        "-binary",
        "-inform",
        "DER",
        "-in",
        request_path.to_str().unwrap(),
        "-out",
        payload_path.to_str().unwrap(),
    ]);
    assert_eq!(fs::read(&payload_path).unwrap(), csr.raw());

    // Exits non-zero if the self-signature does not verify.
    openssl(&[
        "req",
        "-inform",
        "DER",
        "-in",
        payload_path.to_str().unwrap(),
        "-noout",
        "-verify",
    ]);

    fs::remove_file(request_path).unwrap();
    fs::remove_file(payload_path).unwrap();
}

#[test]
fn test_openssl_crate_validate_cert() {
    use openssl::x509::X509;

    let ca = util::generate_ca_cert("1-ff00:0:110");
    let (_, chain) = util::generate_as_chain(&ca, "1-ff00:0:111");

    let ca_x509 = X509::from_der(&ca.cert.to_der().unwrap()).expect("Failed to parse CA DER");
    let x509 = X509::from_pem(chain.leaf().to_pem().unwrap().as_bytes())
        .expect("Failed to parse PEM");

    let common_name = |name: &openssl::x509::X509NameRef| {
        name.entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .unwrap()
            .data()
            .as_utf8()
            .unwrap()
            .to_string()
    };
    assert_eq!(common_name(x509.subject_name()), "1-ff00:0:111 AS Certificate");
    assert_eq!(common_name(x509.issuer_name()), "1-ff00:0:110 CA Certificate");
    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");

    let ca_key = ca_x509.public_key().unwrap();
    assert!(x509.verify(&ca_key).unwrap(), "Leaf signature does not verify");
    assert!(ca_x509.verify(&ca_key).unwrap(), "CA is not self-signed");

    assert_eq!(
        x509.signature_algorithm().object().nid(),
        openssl::nid::Nid::ECDSA_WITH_SHA256,
        "Signature algorithm should be ecdsa-with-SHA256"
    );
}
