//! CA configuration.
//!
//! ```toml
//! ia = "1-ff00:0:110"
//! validity = "3d"
//! max_clock_skew = "5s"
//! response_lifetime = "1h"
//! ```
//!
//! Key material is not part of the configuration; the CA certificate and key
//! are loaded elsewhere and combined with the configuration through
//! [`CaConfig::policy`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::addr::IA;
use crate::cert::Certificate;
use crate::key::KeyPair;
use crate::policy::CaPolicy;
use crate::renewal::RenewalRequestVerifier;
use crate::server::CaResponseSigner;

/// Errors loading or applying a [`CaConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Upper bound of every configured duration, one hundred Julian years.
const MAX_DURATION: Duration = Duration::from_secs(100 * 31_557_600);

fn default_response_lifetime() -> Duration {
    Duration::from_secs(3600)
}

/// Renewal settings of one AS CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaConfig {
    /// ISD-AS of the CA.
    pub ia: IA,

    /// Validity of issued AS certificates.
    #[serde(with = "humantime_serde")]
    pub validity: Duration,

    /// Clock difference tolerated when checking requester chains.
    #[serde(default, with = "humantime_serde")]
    pub max_clock_skew: Duration,

    /// How long signed responses stay acceptable.
    #[serde(default = "default_response_lifetime", with = "humantime_serde")]
    pub response_lifetime: Duration,
}

impl CaConfig {
    /// Loads the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ia.is_wildcard() {
            return Err(ConfigError::Validation(format!(
                "CA ISD-AS {} must not be a wildcard",
                self.ia
            )));
        }
        if self.validity.is_zero() {
            return Err(ConfigError::Validation(
                "validity must be positive".to_string(),
            ));
        }
        if self.response_lifetime.is_zero() {
            return Err(ConfigError::Validation(
                "response_lifetime must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("validity", self.validity),
            ("max_clock_skew", self.max_clock_skew),
            ("response_lifetime", self.response_lifetime),
        ] {
            if value > MAX_DURATION {
                return Err(ConfigError::Validation(format!(
                    "{name} of {value:?} exceeds {MAX_DURATION:?}"
                )));
            }
        }
        Ok(())
    }

    fn check_certificate(&self, certificate: &Certificate) -> Result<(), ConfigError> {
        let cert_ia = certificate
            .ia()
            .map_err(|e| ConfigError::Validation(format!("CA certificate: {e}")))?;
        if cert_ia != self.ia {
            return Err(ConfigError::Validation(format!(
                "CA certificate is for {cert_ia}, configured ISD-AS is {}",
                self.ia
            )));
        }
        Ok(())
    }

    /// Builds the issuance policy for the loaded CA certificate and key.
    pub fn policy(
        &self,
        certificate: Certificate,
        signer: Arc<KeyPair>,
    ) -> Result<CaPolicy, ConfigError> {
        self.check_certificate(&certificate)?;
        Ok(CaPolicy::builder()
            .validity(self.validity)
            .certificate(certificate)
            .signer(signer)
            .backdate(self.max_clock_skew)
            .build())
    }

    /// Builds a verifier accepting requester chains issued by `trust_anchors`.
    pub fn verifier(&self, trust_anchors: Vec<Certificate>) -> RenewalRequestVerifier {
        RenewalRequestVerifier::builder()
            .trust_anchors(trust_anchors)
            .max_clock_skew(self.max_clock_skew)
            .build()
    }

    /// Builds the response signer for the loaded CA certificate and key.
    pub fn response_signer(
        &self,
        certificate: Certificate,
        key: Arc<KeyPair>,
    ) -> Result<CaResponseSigner, ConfigError> {
        self.check_certificate(&certificate)?;
        Ok(CaResponseSigner::builder()
            .key(key)
            .certificate(certificate)
            .ia(self.ia)
            .lifetime(self.response_lifetime)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn parses_durations() {
        let config = CaConfig::from_toml_str(
            r#"
            ia = "1-ff00:0:110"
            validity = "3d"
            max_clock_skew = "5s"
            "#,
        )
        .unwrap();
        assert_eq!(config.ia, "1-ff00:0:110".parse().unwrap());
        assert_eq!(config.validity, Duration::from_secs(3 * 24 * 3600));
        assert_eq!(config.max_clock_skew, Duration::from_secs(5));
        assert_eq!(config.response_lifetime, Duration::from_secs(3600));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = CaConfig::from_toml_str(
            r#"
            ia = "1-ff00:0:110"
            validity = "3d"
            key_file = "/etc/ca.key"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(CaConfig::from_toml_str("ia = \"1-ff00:0:110\"\nvalidity = \"0s\"").is_err());
        assert!(CaConfig::from_toml_str("ia = \"0-0\"\nvalidity = \"1h\"").is_err());
        assert!(CaConfig::from_toml_str("ia = \"bogus\"\nvalidity = \"1h\"").is_err());
    }

    #[test]
    fn rejects_oversized_durations() {
        for field in ["validity", "max_clock_skew", "response_lifetime"] {
            let mut content = String::from("ia = \"1-ff00:0:110\"\n");
            if field != "validity" {
                content.push_str("validity = \"1h\"\n");
            }
            content.push_str(&format!("{field} = \"20000years\"\n"));
            assert!(
                matches!(
                    CaConfig::from_toml_str(&content),
                    Err(ConfigError::Validation(_))
                ),
                "{field}"
            );
        }
        assert!(
            CaConfig::from_toml_str(
                "ia = \"1-ff00:0:110\"\nvalidity = \"100years\"\nresponse_lifetime = \"0s\""
            )
            .is_err()
        );
        let config = CaConfig::from_toml_str(
            "ia = \"1-ff00:0:110\"\nvalidity = \"100years\"\nmax_clock_skew = \"1y\"",
        )
        .unwrap();
        assert_eq!(config.validity, MAX_DURATION);
    }

    #[test]
    fn policy_requires_matching_certificate() {
        let config =
            CaConfig::from_toml_str("ia = \"1-ff00:0:110\"\nvalidity = \"1h\"").unwrap();
        let (key, ca) = testutil::ca("1-ff00:0:120");
        assert!(matches!(
            config.policy(ca, Arc::new(key)),
            Err(ConfigError::Validation(_))
        ));

        let (key, ca) = testutil::ca("1-ff00:0:110");
        let policy = config.policy(ca, Arc::new(key)).unwrap();
        assert_eq!(policy.validity(), Duration::from_secs(3600));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config =
            CaConfig::from_toml_str("ia = \"1-ff00:0:110\"\nvalidity = \"1h\"").unwrap();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(CaConfig::from_toml_str(&text).unwrap(), config);
    }
}
