//! Chain renewal protocol messages and the requester side of the protocol.
//!
//! A requester builds a [`ChainRenewalRequest`] with
//! [`new_chain_renewal_request`], signing a fresh certificate request with the
//! key of its current, still valid chain. The CA checks the request with a
//! [`RequestVerifier`](crate::server::RequestVerifier) such as
//! [`RenewalRequestVerifier`], issues a new chain and answers with a
//! [`ChainRenewalResponse`] that the requester opens with
//! [`verify_chain_renewal_response`].

pub mod request;
pub mod response;
pub mod verifier;

pub use request::{RequestError, Signer, new_chain_renewal_request};
pub use response::{decode_chain, encode_chain, verify_chain_renewal_response};
pub use verifier::RenewalRequestVerifier;

use crate::server::RenewalError;

/// Renewal request as carried on the wire.
///
/// At most one of the two payloads may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRenewalRequest {
    /// Legacy signed-message payload.
    pub signed_request: Vec<u8>,
    /// CMS `SignedData` payload wrapping a certificate request.
    pub cms_signed_request: Vec<u8>,
}

/// Renewal response as carried on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRenewalResponse {
    /// CMS `SignedData` payload wrapping the issued chain.
    pub cms_signed_response: Vec<u8>,
}

/// The payload kind a renewal request carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalEnvelope {
    Legacy(Vec<u8>),
    Cms(Vec<u8>),
    Empty,
}

impl TryFrom<ChainRenewalRequest> for RenewalEnvelope {
    type Error = RenewalError;

    fn try_from(request: ChainRenewalRequest) -> Result<Self, Self::Error> {
        match (
            request.signed_request.is_empty(),
            request.cms_signed_request.is_empty(),
        ) {
            (false, false) => Err(RenewalError::AmbiguousEnvelope),
            (true, false) => Ok(RenewalEnvelope::Cms(request.cms_signed_request)),
            (false, true) => Ok(RenewalEnvelope::Legacy(request.signed_request)),
            (true, true) => Ok(RenewalEnvelope::Empty),
        }
    }
}

impl From<RenewalEnvelope> for ChainRenewalRequest {
    fn from(envelope: RenewalEnvelope) -> Self {
        match envelope {
            RenewalEnvelope::Legacy(signed_request) => Self {
                signed_request,
                ..Default::default()
            },
            RenewalEnvelope::Cms(cms_signed_request) => Self {
                cms_signed_request,
                ..Default::default()
            },
            RenewalEnvelope::Empty => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_kinds() {
        let cms = ChainRenewalRequest {
            cms_signed_request: b"cms".to_vec(),
            ..Default::default()
        };
        assert_eq!(
            RenewalEnvelope::try_from(cms.clone()).unwrap(),
            RenewalEnvelope::Cms(b"cms".to_vec())
        );
        assert_eq!(
            ChainRenewalRequest::from(RenewalEnvelope::Cms(b"cms".to_vec())),
            cms
        );

        let legacy = ChainRenewalRequest {
            signed_request: b"legacy".to_vec(),
            ..Default::default()
        };
        assert_eq!(
            RenewalEnvelope::try_from(legacy).unwrap(),
            RenewalEnvelope::Legacy(b"legacy".to_vec())
        );
        assert_eq!(
            RenewalEnvelope::try_from(ChainRenewalRequest::default()).unwrap(),
            RenewalEnvelope::Empty
        );
    }

    #[test]
    fn both_payloads_are_rejected() {
        let both = ChainRenewalRequest {
            signed_request: b"legacy".to_vec(),
            cms_signed_request: b"cms".to_vec(),
        };
        assert!(matches!(
            RenewalEnvelope::try_from(both),
            Err(RenewalError::AmbiguousEnvelope)
        ));
    }
}
