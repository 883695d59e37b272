use std::sync::Arc;

use bon::Builder;
use tonic::Status;
use tracing::{debug, error, warn};

use super::{Category, CmsRequestHandler, CmsSigner, RenewalError, RenewalServerMetrics};
use crate::context::RequestContext;
use crate::renewal::{ChainRenewalRequest, ChainRenewalResponse, RenewalEnvelope};

/// RPC-facing entry point for chain renewal.
///
/// Only CMS signed requests are served. Failures keep the status code of the
/// stage that produced them and are all counted as backend errors here; the
/// finer result is recorded by the CMS handler.
#[derive(Builder)]
pub struct RenewalServer {
    cms_handler: Arc<dyn CmsRequestHandler>,
    cms_signer: Arc<dyn CmsSigner>,
    metrics: RenewalServerMetrics,
}

impl RenewalServer {
    pub async fn chain_renewal(
        &self,
        ctx: &RequestContext,
        request: ChainRenewalRequest,
    ) -> Result<ChainRenewalResponse, Status> {
        match self.renew(ctx, request).await {
            Ok(response) => {
                self.metrics.record(Category::Success);
                Ok(response)
            }
            Err(err) => {
                self.metrics.record(Category::BackendError);
                if err.is_client_fault() {
                    warn!(error = %err, "chain renewal rejected");
                } else {
                    error!(error = %err, "chain renewal failed");
                }
                Err(err.into())
            }
        }
    }

    async fn renew(
        &self,
        ctx: &RequestContext,
        request: ChainRenewalRequest,
    ) -> Result<ChainRenewalResponse, RenewalError> {
        let cms_request = match RenewalEnvelope::try_from(request)? {
            RenewalEnvelope::Cms(bytes) => bytes,
            RenewalEnvelope::Legacy(_) | RenewalEnvelope::Empty => {
                return Err(RenewalError::MissingCms);
            }
        };
        debug!(len = cms_request.len(), "handling CMS renewal request");

        let chain = self.cms_handler.handle_cms_request(ctx, &cms_request).await?;
        let cms_signed_response = ctx
            .run(self.cms_signer.sign_cms(ctx, &chain))
            .await?
            .map_err(RenewalError::ResponseSigning)?;
        Ok(ChainRenewalResponse {
            cms_signed_response,
        })
    }
}

#[cfg(test)]
mod tests {
    use prometheus::Registry;
    use tonic::Code;

    use super::*;
    use crate::error::PkiError;
    use crate::server::metrics::RenewalMetrics;
    use crate::server::{MockCmsRequestHandler, MockCmsSigner};
    use crate::testutil;

    fn server(
        handler: MockCmsRequestHandler,
        signer: MockCmsSigner,
    ) -> (RenewalServer, RenewalMetrics) {
        let metrics = RenewalMetrics::register(&Registry::new()).unwrap();
        let server = RenewalServer::builder()
            .cms_handler(Arc::new(handler))
            .cms_signer(Arc::new(signer))
            .metrics(metrics.server())
            .build();
        (server, metrics)
    }

    fn assert_recorded(metrics: &RenewalMetrics, expected: &str) {
        for label in ["ok_success", "err_backend"] {
            assert_eq!(
                metrics.requests.with_label_values(&[label]).get(),
                u64::from(label == expected),
                "{label}"
            );
        }
    }

    fn cms_request(bytes: &[u8]) -> ChainRenewalRequest {
        ChainRenewalRequest {
            cms_signed_request: bytes.to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn legacy_only_request_is_a_backend_error() {
        let mut handler = MockCmsRequestHandler::new();
        handler.expect_handle_cms_request().never();
        let mut signer = MockCmsSigner::new();
        signer.expect_sign_cms().never();
        let (server, metrics) = server(handler, signer);

        let request = ChainRenewalRequest {
            signed_request: b"legacy request".to_vec(),
            ..Default::default()
        };
        let status = server
            .chain_renewal(&RequestContext::new(), request)
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unknown);
        assert_recorded(&metrics, "err_backend");
    }

    #[tokio::test]
    async fn empty_request_is_a_backend_error() {
        let mut handler = MockCmsRequestHandler::new();
        handler.expect_handle_cms_request().never();
        let (server, metrics) = server(handler, MockCmsSigner::new());

        assert!(
            server
                .chain_renewal(&RequestContext::new(), ChainRenewalRequest::default())
                .await
                .is_err()
        );
        assert_recorded(&metrics, "err_backend");
    }

    #[tokio::test]
    async fn both_payloads_are_rejected() {
        let mut handler = MockCmsRequestHandler::new();
        handler.expect_handle_cms_request().never();
        let (server, metrics) = server(handler, MockCmsSigner::new());

        let request = ChainRenewalRequest {
            signed_request: b"legacy".to_vec(),
            cms_signed_request: b"cms".to_vec(),
        };
        let status = server
            .chain_renewal(&RequestContext::new(), request)
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_recorded(&metrics, "err_backend");
    }

    #[tokio::test]
    async fn handler_error_keeps_its_code() {
        let mut handler = MockCmsRequestHandler::new();
        handler
            .expect_handle_cms_request()
            .times(1)
            .returning(|_, _| Err(RenewalError::Parse(PkiError::Decoding("dummy".to_string()))));
        let mut signer = MockCmsSigner::new();
        signer.expect_sign_cms().never();
        let (server, metrics) = server(handler, signer);

        let status = server
            .chain_renewal(&RequestContext::new(), cms_request(b"dummy request"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_recorded(&metrics, "err_backend");
    }

    #[tokio::test]
    async fn signing_error_is_a_backend_error() {
        let (_, chain) = testutil::client_chain("1-ff00:0:110", "1-ff00:0:111");
        let mut handler = MockCmsRequestHandler::new();
        handler
            .expect_handle_cms_request()
            .times(1)
            .returning(move |_, _| Ok(chain.clone()));
        let mut signer = MockCmsSigner::new();
        signer
            .expect_sign_cms()
            .times(1)
            .returning(|_, _| Err(PkiError::Signature("key unavailable".to_string())));
        let (server, metrics) = server(handler, signer);

        let status = server
            .chain_renewal(&RequestContext::new(), cms_request(b"request"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unknown);
        assert_recorded(&metrics, "err_backend");
    }

    #[tokio::test]
    async fn success() {
        let (_, chain) = testutil::client_chain("1-ff00:0:110", "1-ff00:0:111");
        let mut handler = MockCmsRequestHandler::new();
        handler
            .expect_handle_cms_request()
            .times(1)
            .returning(move |_, _| Ok(chain.clone()));
        let mut signer = MockCmsSigner::new();
        signer
            .expect_sign_cms()
            .times(1)
            .returning(|_, _| Ok(b"signed response".to_vec()));
        let (server, metrics) = server(handler, signer);

        let response = server
            .chain_renewal(&RequestContext::new(), cms_request(b"request"))
            .await
            .unwrap();
        assert_eq!(response.cms_signed_response, b"signed response");
        assert_recorded(&metrics, "ok_success");
    }
}
