use image::DynamicImage;
use std::sync::Mutex;
use thiserror::Error;
use url::Url;

/// Errors surfaced by image providers. Individual failures never abort a
/// resolution batch; the failed entry is simply absent from the table.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("{0}")]
    Unavailable(String),
}

/// Fetches and decodes the image behind a resolved URL. The resolver calls
/// providers concurrently, once per unique reference.
pub trait ImageProvider: Send + Sync {
    fn fetch(&self, url: &Url, alt: &str) -> Result<DynamicImage, ProviderError>;
}

/// The fetch half of [`ImageProvider`] without the concurrency requirement.
/// Wrap implementations in [`SerialProvider`] to use them with the resolver.
pub trait LocalImageProvider: Send {
    fn fetch(&mut self, url: &Url, alt: &str) -> Result<DynamicImage, ProviderError>;
}

/// Serializes calls to a provider that cannot handle concurrent use.
/// Resolution semantics are unchanged; fetches within a batch just run one
/// at a time.
pub struct SerialProvider<P>(Mutex<P>);

impl<P> SerialProvider<P> {
    pub fn new(provider: P) -> Self {
        Self(Mutex::new(provider))
    }
}

impl<P: LocalImageProvider> ImageProvider for SerialProvider<P> {
    fn fetch(&self, url: &Url, alt: &str) -> Result<DynamicImage, ProviderError> {
        let mut provider = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        provider.fetch(url, alt)
    }
}

/// Reads images from the local filesystem. Pair with a `file://` image base
/// URL on the render context so relative sources resolve to paths.
pub struct FsImageProvider;

impl ImageProvider for FsImageProvider {
    fn fetch(&self, url: &Url, _alt: &str) -> Result<DynamicImage, ProviderError> {
        if url.scheme() != "file" {
            return Err(ProviderError::UnsupportedScheme(url.scheme().to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|_| ProviderError::NotFound(url.to_string()))?;
        if !path.exists() {
            return Err(ProviderError::NotFound(path.display().to_string()));
        }
        Ok(image::open(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    struct CountingProvider {
        calls: usize,
    }

    impl LocalImageProvider for CountingProvider {
        fn fetch(&mut self, _url: &Url, _alt: &str) -> Result<DynamicImage, ProviderError> {
            self.calls += 1;
            Ok(DynamicImage::ImageRgba8(RgbaImage::new(2, 2)))
        }
    }

    #[test]
    fn test_serial_provider_forwards_fetches() {
        let provider = SerialProvider::new(CountingProvider { calls: 0 });
        let url = Url::parse("https://example.com/a.png").unwrap();
        assert!(provider.fetch(&url, "a").is_ok());
        assert!(provider.fetch(&url, "a").is_ok());
        assert_eq!(provider.0.lock().unwrap().calls, 2);
    }

    #[test]
    fn test_fs_provider_rejects_non_file_schemes() {
        let url = Url::parse("https://example.com/a.png").unwrap();
        let err = FsImageProvider.fetch(&url, "a").unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_fs_provider_reports_missing_files() {
        let url = Url::parse("file:///definitely/not/here.png").unwrap();
        let err = FsImageProvider.fetch(&url, "a").unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
