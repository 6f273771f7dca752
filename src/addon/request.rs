//! Resource request paths and addon URLs.
//!
//! Requests follow the addon protocol layout
//! `{base}/{resource}/{type}/{id}[/{extra}].json`, where extra is a list of
//! `name=value` pairs joined by `&` in caller order.

use std::fmt;

use super::{ExtraValue, EXTRA_SKIP, MANIFEST_FILE};

/// Normalize an addon transport URL.
///
/// Trims surrounding whitespace, a trailing `/manifest.json` and trailing
/// slashes, so `https://a.io/manifest.json`, `https://a.io/` and
/// `https://a.io` all map to `https://a.io`.
pub fn normalize_base_url(url: &str) -> String {
    let mut base = url.trim().trim_end_matches('/');
    if let Some(stripped) =
        base.strip_suffix(MANIFEST_FILE).filter(|rest| rest.ends_with('/'))
    {
        base = stripped.trim_end_matches('/');
    }
    base.to_string()
}

/// URL of the manifest for a transport URL.
pub fn manifest_url(url: &str) -> String {
    format!("{}/{MANIFEST_FILE}", normalize_base_url(url))
}

/// A request for one resource from one addon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRequest {
    pub resource: String,
    pub media_type: String,
    pub id: String,
    pub extra: Vec<ExtraValue>,
}

impl ResourceRequest {
    pub fn new(
        resource: impl Into<String>,
        media_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            media_type: media_type.into(),
            id: id.into(),
            extra: Vec::new(),
        }
    }

    /// Attach extra pairs. Order is kept as given.
    #[must_use]
    pub fn with_extra(mut self, extra: Vec<ExtraValue>) -> Self {
        self.extra = extra;
        self
    }

    /// Append a `skip` pair for pagination.
    ///
    /// Zero is a no-op, as is a request that already carries `skip`.
    #[must_use]
    pub fn with_skip(mut self, skip: u32) -> Self {
        if skip > 0 && !self.extra.iter().any(|e| e.name == EXTRA_SKIP) {
            self.extra.push(ExtraValue::new(EXTRA_SKIP, skip.to_string()));
        }
        self
    }

    /// Encoded extra segment, or `None` when there are no extras.
    fn extra_segment(&self) -> Option<String> {
        if self.extra.is_empty() {
            return None;
        }

        let pairs: Vec<String> = self
            .extra
            .iter()
            .map(|e| format!("{}={}", urlencoding::encode(&e.name), urlencoding::encode(&e.value)))
            .collect();
        Some(pairs.join("&"))
    }

    /// Path relative to the addon base URL, including the `.json` suffix.
    pub fn path(&self) -> String {
        let mut path = format!("{}/{}/{}", self.resource, self.media_type, self.id);
        if let Some(extra) = self.extra_segment() {
            path.push('/');
            path.push_str(&extra);
        }
        path.push_str(".json");
        path
    }

    /// Full URL against an addon transport URL.
    pub fn url(&self, transport_url: &str) -> String {
        format!("{}/{}", normalize_base_url(transport_url), self.path())
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
