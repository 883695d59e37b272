use std::sync::Arc;

use async_trait::async_trait;
use bon::Builder;
use tracing::{debug, error, info, warn};

use super::{
    Category, ChainBuilder, CmsHandlerMetrics, CmsRequestHandler, RenewalError, RequestVerifier,
};
use crate::addr::IA;
use crate::cert::CertificateChain;
use crate::cms::SignedEnvelope;
use crate::context::RequestContext;

/// Handles CMS signed renewal requests for the ASes of one ISD.
///
/// The pipeline short-circuits on the first failure: jurisdiction, envelope
/// decoding, request verification, chain issuance. Every call records exactly
/// one result in [`CmsHandlerMetrics`].
#[derive(Builder)]
pub struct Cms {
    verifier: Arc<dyn RequestVerifier>,
    chain_builder: Arc<dyn ChainBuilder>,
    /// ISD-AS of the CA this handler serves.
    ia: IA,
    metrics: CmsHandlerMetrics,
}

impl Cms {
    fn check_jurisdiction(&self, client: IA) -> Result<(), RenewalError> {
        if !self.ia.same_isd(&client) {
            return Err(RenewalError::NotClient {
                ia: client,
                isd: self.ia.isd(),
            });
        }
        Ok(())
    }

    async fn process(
        &self,
        ctx: &RequestContext,
        request: &[u8],
    ) -> Result<CertificateChain, RenewalError> {
        if let Some(peer) = ctx.peer() {
            self.check_jurisdiction(peer)?;
        }

        let envelope = SignedEnvelope::decode(request).map_err(RenewalError::Parse)?;
        let claimed = envelope
            .signer_certificate()
            .and_then(|cert| cert.ia())
            .map_err(RenewalError::Parse)?;
        self.check_jurisdiction(claimed)?;
        debug!(ia = %claimed, "verifying CMS renewal request");

        let csr = ctx
            .run(self.verifier.verify_renewal_request(ctx, request))
            .await?
            .map_err(RenewalError::Verify)?;

        ctx.run(self.chain_builder.create_chain(ctx, &csr))
            .await?
            .map_err(RenewalError::Internal)
    }
}

#[async_trait]
impl CmsRequestHandler for Cms {
    async fn handle_cms_request(
        &self,
        ctx: &RequestContext,
        request: &[u8],
    ) -> Result<CertificateChain, RenewalError> {
        let result = self.process(ctx, request).await;
        match &result {
            Ok(chain) => {
                self.metrics.record(Category::Success);
                if let Ok(ia) = chain.ia() {
                    info!(%ia, "renewed AS certificate chain");
                }
            }
            Err(err) => {
                self.metrics.record(err.category());
                if err.is_client_fault() {
                    warn!(error = %err, result = err.category().label(), "rejected renewal request");
                } else {
                    error!(error = %err, result = err.category().label(), "renewal failed");
                }
            }
        }
        result
    }
}
