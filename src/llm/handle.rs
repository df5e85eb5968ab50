use std::sync::Arc;

use crate::core::errors::WeaverError;

/// Provider availability as an explicit tagged value.
///
/// A provider that could not be configured (missing API key, bad base URL)
/// is carried as `Unavailable` with its reason, and every call site decides
/// what unavailability means there — no optional fields silently checked for
/// truthiness.
pub enum ProviderHandle<T: ?Sized> {
    Available(Arc<T>),
    Unavailable(String),
}

impl<T: ?Sized> ProviderHandle<T> {
    pub fn available(provider: Arc<T>) -> Self {
        ProviderHandle::Available(provider)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ProviderHandle::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ProviderHandle::Available(_))
    }

    /// The provider, or a `WeaverError::Provider` carrying the reason it is
    /// not configured.
    pub fn get(&self) -> Result<&Arc<T>, WeaverError> {
        match self {
            ProviderHandle::Available(provider) => Ok(provider),
            ProviderHandle::Unavailable(reason) => Err(WeaverError::Provider(reason.clone())),
        }
    }

    /// "ready" or "unavailable", for status reporting.
    pub fn status(&self) -> &'static str {
        if self.is_available() {
            "ready"
        } else {
            "unavailable"
        }
    }
}

impl<T: ?Sized> Clone for ProviderHandle<T> {
    fn clone(&self) -> Self {
        match self {
            ProviderHandle::Available(provider) => ProviderHandle::Available(provider.clone()),
            ProviderHandle::Unavailable(reason) => ProviderHandle::Unavailable(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_handle_reports_its_reason() {
        let handle: ProviderHandle<str> = ProviderHandle::unavailable("GOOGLE_API_KEY not set");
        assert!(!handle.is_available());
        assert_eq!(handle.status(), "unavailable");
        match handle.get() {
            Err(WeaverError::Provider(reason)) => assert!(reason.contains("GOOGLE_API_KEY")),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn available_handle_yields_the_provider() {
        let handle = ProviderHandle::available(Arc::new(7_u32));
        assert!(handle.is_available());
        assert_eq!(**handle.get().unwrap(), 7);
    }
}
