use std::time::Duration;

/// Builder for [`ExtractConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExtractConfigBuilder {
    endpoint: String,
    field_name: Option<String>,
    timeout: Option<Duration>,
}

impl ExtractConfigBuilder {
    /// Creates a builder that posts files to `endpoint`.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            field_name: None,
            timeout: None,
        }
    }

    /// Sets the name of the form field carrying the file.
    #[inline]
    pub fn with_field_name<S: Into<String>>(mut self, field_name: S) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Sets how long a whole extraction request may take.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> ExtractConfig {
        ExtractConfig {
            endpoint: self.endpoint,
            field_name: self.field_name.unwrap_or_else(|| "pdfFile".to_owned()),
            timeout: self.timeout.unwrap_or(Duration::from_secs(120)),
        }
    }
}

/// Configuration for [`HttpTextExtractor`](crate::HttpTextExtractor).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExtractConfig {
    pub(crate) endpoint: String,
    pub(crate) field_name: String,
    pub(crate) timeout: Duration,
}

impl ExtractConfig {
    /// Returns the URL files are posted to.
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the name of the form field carrying the file.
    #[inline]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}
