//! Error types of the PKI layer.

use thiserror::Error;

/// Errors produced by the certificate, key, CSR and CMS layers.
///
/// These carry no renewal semantics on their own; the renewal pipeline
/// classifies them depending on which stage produced them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PkiError {
    /// Error during data encoding.
    #[error("failed to encode data: {0}")]
    Encoding(String),

    /// Error during data decoding.
    #[error("failed to decode data: {0}")]
    Decoding(String),

    /// Error due to invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    /// Error related to certificate contents.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// A signature could not be produced or did not verify.
    #[error("signature error: {0}")]
    Signature(String),

    /// A validity window check failed.
    #[error("validity error: {0}")]
    Validity(String),

    /// A semantic check on a signed object failed.
    #[error("verification failed: {0}")]
    Verification(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    Rsa(String),
}

/// Result alias used throughout the PKI layer.
pub type Result<T> = std::result::Result<T, PkiError>;

impl From<der::Error> for PkiError {
    fn from(err: der::Error) -> Self {
        PkiError::Decoding(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::Rsa(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for PkiError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        PkiError::Rsa(err.to_string())
    }
}

impl From<ecdsa::Error> for PkiError {
    fn from(err: ecdsa::Error) -> Self {
        PkiError::Signature(err.to_string())
    }
}

impl From<x509_cert::spki::Error> for PkiError {
    fn from(err: x509_cert::spki::Error) -> Self {
        PkiError::Encoding(err.to_string())
    }
}

impl From<crate::addr::IaError> for PkiError {
    fn from(err: crate::addr::IaError) -> Self {
        PkiError::InvalidInput(err.to_string())
    }
}
