//! Shared-cache policy for rendered pages.

use axum::http::HeaderValue;

pub const ANONYMOUS_CACHE_CONTROL: &str =
    "max-age=300, s-maxage=3600, stale-while-revalidate=300, must-revalidate";
pub const AUTHENTICATED_CACHE_CONTROL: &str = "s-maxage=0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Anonymous pages may be served from shared caches and revalidated in the
    /// background.
    Public,
    /// Pages personalised for a signed-in viewer must never sit in a shared cache.
    Personalized,
}

impl CachePolicy {
    pub fn for_viewer(authenticated: bool) -> Self {
        if authenticated {
            Self::Personalized
        } else {
            Self::Public
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            Self::Public => ANONYMOUS_CACHE_CONTROL,
            Self::Personalized => AUTHENTICATED_CACHE_CONTROL,
        }
    }

    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.directive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_viewers_get_a_shared_cache_window() {
        let policy = CachePolicy::for_viewer(false);
        assert_eq!(policy, CachePolicy::Public);
        assert_eq!(
            policy.header_value(),
            "max-age=300, s-maxage=3600, stale-while-revalidate=300, must-revalidate"
        );
    }

    #[test]
    fn signed_in_viewers_disable_shared_caching() {
        assert_eq!(CachePolicy::for_viewer(true).directive(), "s-maxage=0");
    }
}
