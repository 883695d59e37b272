//! # ca-renewal
//!
//! Certificate renewal for AS certificate authorities, built entirely on
//! RustCrypto libraries.
//!
//! An AS holding a valid certificate chain asks the CA of its ISD for a fresh
//! chain. The request carries a PKCS#10 certificate request wrapped in a CMS
//! `SignedData` envelope signed with the AS's current key. The CA checks the
//! envelope against its trust anchors, issues a new AS certificate and
//! returns the resulting chain in a CMS envelope signed by the CA.
//!
//! ## Request flow
//!
//! ```text
//! ChainRenewalRequest
//!   -> RenewalServer      envelope selection, dispatcher metrics
//!   -> Cms                jurisdiction, decoding, handler metrics
//!   -> RequestVerifier    signer chain, envelope signature, CSR
//!   -> ChainBuilder       CA policy issues the AS certificate
//!   -> CmsSigner          response envelope
//! ChainRenewalResponse
//! ```
//!
//! Each stage is a trait in [`server`]; the crate ships one implementation
//! of each ([`renewal::RenewalRequestVerifier`], [`policy::CaPolicy`],
//! [`server::CaResponseSigner`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ca_renewal::config::CaConfig;
//! use ca_renewal::context::RequestContext;
//! use ca_renewal::server::{Cms, RenewalMetrics, RenewalServer};
//! # use ca_renewal::cert::Certificate;
//! # use ca_renewal::key::KeyPair;
//!
//! # async fn run(
//! #     ca_cert: Certificate,
//! #     ca_key: Arc<KeyPair>,
//! #     request: ca_renewal::renewal::ChainRenewalRequest,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaConfig::from_toml_str(
//!     r#"
//!     ia = "1-ff00:0:110"
//!     validity = "3d"
//!     max_clock_skew = "5s"
//!     "#,
//! )?;
//! let metrics = RenewalMetrics::register(prometheus::default_registry())?;
//!
//! let handler = Cms::builder()
//!     .verifier(Arc::new(config.verifier(vec![ca_cert.clone()])))
//!     .chain_builder(Arc::new(config.policy(ca_cert.clone(), ca_key.clone())?))
//!     .ia(config.ia)
//!     .metrics(metrics.cms_handler())
//!     .build();
//! let server = RenewalServer::builder()
//!     .cms_handler(Arc::new(handler))
//!     .cms_signer(Arc::new(config.response_signer(ca_cert, ca_key)?))
//!     .metrics(metrics.server())
//!     .build();
//!
//! let response = server.chain_renewal(&RequestContext::new(), request).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! ## Requesting a renewal
//!
//! ```rust,no_run
//! use ca_renewal::context::RequestContext;
//! use ca_renewal::csr::CertificateRequest;
//! use ca_renewal::renewal::{new_chain_renewal_request, Signer};
//!
//! # fn request(csr: &CertificateRequest, signer: &Signer) -> Result<(), ca_renewal::renewal::RequestError> {
//! let request = new_chain_renewal_request(&RequestContext::new(), csr.raw(), signer)?;
//! assert!(request.signed_request.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`addr`]: ISD-AS identifiers
//! - [`key`]: Key generation and signatures
//! - [`cert`]: Certificates, chains and extensions
//! - [`csr`]: PKCS#10 certificate requests
//! - [`cms`]: CMS `SignedData` envelopes
//! - [`policy`]: Chain issuance by the CA
//! - [`renewal`]: Wire messages, request building, verification
//! - [`server`]: Renewal dispatcher, CMS handler, response signer, metrics
//! - [`config`]: CA configuration
//! - [`context`]: Per-request cancellation, deadline and peer
//! - [`error`]: Error types

pub mod addr;
pub mod cert;
pub mod cms;
pub mod config;
pub mod context;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod policy;
pub mod renewal;
pub mod server;
pub mod tbs_certificate;

#[cfg(test)]
mod testutil;
