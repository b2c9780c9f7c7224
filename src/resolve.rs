use crate::config::MediaConfig;
use crate::reference::ImageReference;

const ABSOLUTE_PREFIXES: [&str; 5] = ["http://", "https://", "data:", "blob:", "file:"];
const FRONTEND_PREFIX: &str = "frontend/";

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Address(String),
    /// The reference is a local blob; the caller must acquire a preview
    /// handle from the registry and display its URI.
    NeedsHandle,
}

/// Maps stored addresses to something an image element can load.
///
/// Never fails: anything it cannot make sense of becomes the placeholder.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    origin: String,
    media_dir: String,
    placeholder: String,
}

impl AddressResolver {
    pub fn new(config: MediaConfig) -> Self {
        let origin = config.media_origin.trim().trim_end_matches('/').to_string();
        let mut media_dir = config.default_media_dir.trim().to_string();
        if !media_dir.starts_with('/') {
            media_dir.insert(0, '/');
        }
        if !media_dir.ends_with('/') {
            media_dir.push('/');
        }
        Self {
            origin,
            media_dir,
            placeholder: config.placeholder_address,
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn resolve(&self, reference: &ImageReference) -> Resolution {
        match reference {
            ImageReference::Pending { .. } => Resolution::NeedsHandle,
            ImageReference::Remote { address } => Resolution::Address(self.resolve_address(address)),
        }
    }

    pub fn resolve_address(&self, raw: &str) -> String {
        let source: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '"' && *c != '\'')
            .collect();
        if source.is_empty() {
            tracing::debug!(raw, "empty image address; using placeholder");
            return self.placeholder.clone();
        }
        if is_absolute(&source) {
            return source;
        }
        if let Some(rest) = source.strip_prefix("//") {
            let host = rest.split('/').next().unwrap_or_default();
            if host.is_empty() {
                tracing::debug!(raw, "protocol-relative address without host; using placeholder");
                return self.placeholder.clone();
            }
            return source;
        }
        if source.starts_with('/') {
            return format!("{}{source}", self.origin);
        }
        if starts_with_ignore_case(&source, FRONTEND_PREFIX) {
            return format!("{}/{source}", self.origin);
        }
        format!("{}{}{source}", self.origin, self.media_dir)
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new(MediaConfig::default())
    }
}

fn is_absolute(source: &str) -> bool {
    ABSOLUTE_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(source, prefix))
}

fn starts_with_ignore_case(source: &str, prefix: &str) -> bool {
    source
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
