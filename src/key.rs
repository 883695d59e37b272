//! Key material, signing and verification.
//!
//! [`KeyPair`] holds private keys for the algorithms the renewal protocol
//! accepts. [`PublicKey`] is the verification counterpart, usually obtained
//! from a certificate or CSR `SubjectPublicKeyInfo`.

use std::fmt;

use const_oid::ObjectIdentifier;
use ecdsa::signature::{SignatureEncoding, Signer, Verifier};
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use ed25519_dalek::VerifyingKey as Ed25519VerifyingKey;
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::error::{PkiError, Result};

const ID_ED_25519: ObjectIdentifier = const_oid::db::rfc8410::ID_ED_25519;
const ID_EC_PUBLIC_KEY: ObjectIdentifier = const_oid::db::rfc5912::ID_EC_PUBLIC_KEY;
const SECP_256_R_1: ObjectIdentifier = const_oid::db::rfc5912::SECP_256_R_1;
const SECP_384_R_1: ObjectIdentifier = const_oid::db::rfc5912::SECP_384_R_1;
const RSA_ENCRYPTION: ObjectIdentifier = const_oid::db::rfc5912::RSA_ENCRYPTION;

/// Minimum RSA modulus size accepted for generated keys.
const MIN_RSA_BITS: usize = 2048;

/// Signature algorithms used for certificates, CSRs and CMS signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// ECDSA over P-256 with SHA-256.
    EcdsaWithSha256,
    /// ECDSA over P-384 with SHA-384.
    EcdsaWithSha384,
    /// Pure Ed25519.
    Ed25519,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Sha256WithRsa,
}

impl SignatureAlgorithm {
    /// Object identifier of the signature algorithm.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::EcdsaWithSha256 => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::EcdsaWithSha384 => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Ed25519 => ID_ED_25519,
            SignatureAlgorithm::Sha256WithRsa => {
                const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
            }
        }
    }

    /// Maps an algorithm identifier OID back to a supported algorithm.
    pub fn from_oid(oid: ObjectIdentifier) -> Result<Self> {
        match oid {
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(SignatureAlgorithm::EcdsaWithSha256),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_384 => Ok(SignatureAlgorithm::EcdsaWithSha384),
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                Ok(SignatureAlgorithm::Sha256WithRsa)
            }
            ID_ED_25519 => Ok(SignatureAlgorithm::Ed25519),
            other => Err(PkiError::InvalidInput(format!(
                "unsupported signature algorithm {other}"
            ))),
        }
    }

    /// Digest algorithm paired with this signature algorithm in CMS.
    pub fn digest_algorithm(self) -> AlgorithmIdentifierOwned {
        let oid = match self {
            SignatureAlgorithm::EcdsaWithSha256 | SignatureAlgorithm::Sha256WithRsa => {
                const_oid::db::rfc5912::ID_SHA_256
            }
            SignatureAlgorithm::EcdsaWithSha384 => const_oid::db::rfc5912::ID_SHA_384,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc5912::ID_SHA_512,
        };
        AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        }
    }

    /// Hashes `data` with the digest algorithm paired with this algorithm.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            SignatureAlgorithm::EcdsaWithSha256 | SignatureAlgorithm::Sha256WithRsa => {
                Sha256::digest(data).to_vec()
            }
            SignatureAlgorithm::EcdsaWithSha384 => Sha384::digest(data).to_vec(),
            SignatureAlgorithm::Ed25519 => Sha512::digest(data).to_vec(),
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters: None,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureAlgorithm::EcdsaWithSha256 => "ECDSA-SHA256",
            SignatureAlgorithm::EcdsaWithSha384 => "ECDSA-SHA384",
            SignatureAlgorithm::Ed25519 => "Ed25519",
            SignatureAlgorithm::Sha256WithRsa => "SHA256-RSA",
        };
        f.write_str(name)
    }
}

/// Supported private keys.
#[derive(Clone)]
pub enum KeyPair {
    EcdsaP256 { signing_key: P256SigningKey },
    EcdsaP384 { signing_key: P384SigningKey },
    Ed25519 { signing_key: Ed25519SigningKey },
    Rsa { private: Box<RsaPrivateKey> },
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.signature_algorithm())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        KeyPair::EcdsaP256 {
            signing_key: P256SigningKey::random(&mut rng),
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        KeyPair::EcdsaP384 {
            signing_key: P384SigningKey::random(&mut rng),
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let mut rng = rand_core::OsRng;
        KeyPair::Ed25519 {
            signing_key: Ed25519SigningKey::generate(&mut rng),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        if bits < MIN_RSA_BITS {
            return Err(PkiError::KeyGeneration(format!(
                "RSA keys must have at least {MIN_RSA_BITS} bits, got {bits}"
            )));
        }
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        Ok(KeyPair::Rsa {
            private: Box::new(private),
        })
    }

    /// The algorithm this key signs with.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::EcdsaWithSha256,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::EcdsaWithSha384,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRsa,
        }
    }

    /// The public half of this key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::EcdsaP256 { signing_key } => {
                PublicKey::EcdsaP256(signing_key.verifying_key().clone())
            }
            KeyPair::EcdsaP384 { signing_key } => {
                PublicKey::EcdsaP384(signing_key.verifying_key().clone())
            }
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
            KeyPair::Rsa { private } => PublicKey::Rsa(RsaPublicKey::from(&**private)),
        }
    }

    /// The `SubjectPublicKeyInfo` of the public half.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }

    /// Signs `data`. ECDSA signatures are DER encoded, as X.509 and CMS expect.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::EcdsaP256 { signing_key } => {
                let signature: p256::ecdsa::Signature = signing_key.try_sign(data)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key } => {
                let signature: p384::ecdsa::Signature = signing_key.try_sign(data)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::Ed25519 { signing_key } => {
                let signature = signing_key.try_sign(data)?;
                Ok(signature.to_bytes().to_vec())
            }
            KeyPair::Rsa { private } => {
                let signing_key = RsaSigningKey::<Sha256>::new((**private).clone());
                let signature = signing_key.try_sign(data)?;
                Ok(signature.to_vec())
            }
        }
    }
}

/// Supported public keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// Parses a key out of a `SubjectPublicKeyInfo`.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let raw = spki.subject_public_key.raw_bytes();
        match spki.algorithm.oid {
            ID_EC_PUBLIC_KEY => {
                let curve: ObjectIdentifier = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| PkiError::Decoding("EC key without curve".to_string()))?
                    .decode_as()?;
                match curve {
                    SECP_256_R_1 => Ok(PublicKey::EcdsaP256(P256VerifyingKey::from_sec1_bytes(
                        raw,
                    )?)),
                    SECP_384_R_1 => Ok(PublicKey::EcdsaP384(P384VerifyingKey::from_sec1_bytes(
                        raw,
                    )?)),
                    other => Err(PkiError::InvalidInput(format!(
                        "unsupported elliptic curve {other}"
                    ))),
                }
            }
            ID_ED_25519 => {
                let bytes: [u8; 32] = raw
                    .try_into()
                    .map_err(|_| PkiError::Decoding("Ed25519 key must be 32 bytes".to_string()))?;
                Ok(PublicKey::Ed25519(Ed25519VerifyingKey::from_bytes(&bytes)?))
            }
            RSA_ENCRYPTION => Ok(PublicKey::Rsa(RsaPublicKey::from_pkcs1_der(raw)?)),
            other => Err(PkiError::InvalidInput(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }

    /// Encodes the key as a `SubjectPublicKeyInfo`.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(verifying_key.clone())?
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(verifying_key.clone())?
            }
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::Ed25519(verifying_key) => SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: ID_ED_25519,
                    parameters: None,
                },
                subject_public_key: der::asn1::BitString::from_bytes(&verifying_key.to_bytes())?,
            },
        };
        Ok(spki)
    }

    /// Verifies `signature` over `data` produced with `algorithm`.
    pub fn verify(&self, data: &[u8], signature: &[u8], algorithm: SignatureAlgorithm) -> Result<()> {
        match (self, algorithm) {
            (PublicKey::EcdsaP256(key), SignatureAlgorithm::EcdsaWithSha256) => {
                let signature = p256::ecdsa::Signature::from_der(signature)?;
                key.verify(data, &signature)?;
            }
            (PublicKey::EcdsaP384(key), SignatureAlgorithm::EcdsaWithSha384) => {
                let signature = p384::ecdsa::Signature::from_der(signature)?;
                key.verify(data, &signature)?;
            }
            (PublicKey::Ed25519(key), SignatureAlgorithm::Ed25519) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)?;
                key.verify(data, &signature)?;
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha256WithRsa) => {
                let verifying_key = RsaVerifyingKey::<Sha256>::new(key.clone());
                let signature = rsa::pkcs1v15::Signature::try_from(signature)?;
                verifying_key.verify(data, &signature)?;
            }
            (_, algorithm) => {
                return Err(PkiError::Signature(format!(
                    "algorithm {algorithm} does not match key type"
                )));
            }
        }
        Ok(())
    }
}

/// Derives the subject key identifier of a public key.
///
/// SHA-1 over the subject public key bit string (RFC 5280, section
/// 4.2.1.2, method 1). Every certificate this crate issues uses the same
/// derivation for its SKI and its issuer's AKI.
pub fn subject_key_id(spki: &SubjectPublicKeyInfoOwned) -> Vec<u8> {
    <Sha1 as Digest>::digest(spki.subject_public_key.raw_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_signature(key: KeyPair) {
        let data = b"renewal request";
        let signature = key.sign_data(data).unwrap();
        let public = PublicKey::from_spki(&key.as_spki().unwrap()).unwrap();
        assert_eq!(public, key.public_key());
        public
            .verify(data, &signature, key.signature_algorithm())
            .unwrap();
        assert!(public
            .verify(b"tampered", &signature, key.signature_algorithm())
            .is_err());
    }

    #[test]
    fn ecdsa_p256_sign_verify() {
        roundtrip_signature(KeyPair::generate_ecdsa_p256());
    }

    #[test]
    fn ecdsa_p384_sign_verify() {
        roundtrip_signature(KeyPair::generate_ecdsa_p384());
    }

    #[test]
    fn ed25519_sign_verify() {
        roundtrip_signature(KeyPair::generate_ed25519());
    }

    #[test]
    fn rejects_algorithm_mismatch() {
        let key = KeyPair::generate_ecdsa_p256();
        let signature = key.sign_data(b"data").unwrap();
        let err = key
            .public_key()
            .verify(b"data", &signature, SignatureAlgorithm::Ed25519)
            .unwrap_err();
        assert!(matches!(err, PkiError::Signature(_)));
    }

    #[test]
    fn rejects_small_rsa_keys() {
        assert!(matches!(
            KeyPair::generate_rsa(1024),
            Err(PkiError::KeyGeneration(_))
        ));
    }

    #[test]
    fn subject_key_id_is_stable() {
        let key = KeyPair::generate_ecdsa_p256();
        let spki = key.as_spki().unwrap();
        assert_eq!(subject_key_id(&spki), subject_key_id(&spki));
        assert_eq!(subject_key_id(&spki).len(), 20);
        let other = KeyPair::generate_ecdsa_p256().as_spki().unwrap();
        assert_ne!(subject_key_id(&spki), subject_key_id(&other));
    }

    #[test]
    fn algorithm_oid_roundtrip() {
        for alg in [
            SignatureAlgorithm::EcdsaWithSha256,
            SignatureAlgorithm::EcdsaWithSha384,
            SignatureAlgorithm::Ed25519,
            SignatureAlgorithm::Sha256WithRsa,
        ] {
            assert_eq!(SignatureAlgorithm::from_oid(alg.oid()).unwrap(), alg);
        }
    }
}
