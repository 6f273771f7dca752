//! Meta resolution: first addon with an answer wins.

use tokio_util::sync::CancellationToken;

use super::Aggregator;
use crate::addon::{Addon, MetaItem, MetaResponse, ResourceRequest, RESOURCE_META};

impl Aggregator {
    /// Full metadata for a title from whichever supporting addon answers
    /// first with a meta object. Remaining calls are cancelled.
    pub async fn get_meta(
        &self,
        media_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Option<(Addon, MetaItem)> {
        let candidates = self.index().addons_supporting(RESOURCE_META, media_type, id);
        if candidates.is_empty() {
            tracing::debug!(media_type, id, "No addon serves meta");
            return None;
        }

        let request = ResourceRequest::new(RESOURCE_META, media_type, id);
        self.dispatcher
            .dispatch_first(
                candidates,
                |addon| Ok(request.url(&addon.transport_url)),
                |body: MetaResponse| body.meta,
                cancel,
            )
            .await
    }
}
