/// Descriptor of a container image.
///
/// `raw_name` keeps the image reference exactly as reported by the runtime;
/// the remaining fields are derived from it by [`ContainerImage::from_raw_name`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContainerImage {
    pub raw_name: String,
    pub name: String,
    pub short_name: String,
    pub tag: String,
    pub id: String,
}

impl ContainerImage {
    /// Parses an image reference like `registry.example.com/org/app:1.2.3`
    /// into its parts.
    ///
    /// A digest suffix (`@sha256:...`) is stripped from the derived fields
    /// but preserved in `raw_name`. When the tag is omitted the runtime
    /// defaults to `latest`, so the parsed tag does too. `short_name` is the
    /// last path segment of the repository, without registry or tag.
    ///
    /// # Examples
    ///
    /// ```
    /// # use creo_metastore::entity::ContainerImage;
    /// let image = ContainerImage::from_raw_name("gcr.io/datadoghq/agent:7.32.0");
    /// assert_eq!(image.name, "gcr.io/datadoghq/agent");
    /// assert_eq!(image.short_name, "agent");
    /// assert_eq!(image.tag, "7.32.0");
    /// ```
    pub fn from_raw_name(raw: impl Into<String>) -> Self {
        let raw = raw.into();

        let reference = match raw.split_once('@') {
            Some((before_digest, _)) => before_digest,
            None => raw.as_str(),
        };

        // A ':' only separates a tag if it appears after the last '/';
        // otherwise it belongs to a registry port, e.g. `localhost:5000/app`.
        let (name, tag) = match reference.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (reference, "latest"),
        };

        let short_name = name.rsplit('/').next().unwrap_or(name);

        Self {
            name: name.to_owned(),
            short_name: short_name.to_owned(),
            tag: tag.to_owned(),
            id: String::new(),
            raw_name: raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_name_with_tag() {
        let image = ContainerImage::from_raw_name("datadog/agent:7.32.0");
        assert_eq!(image.raw_name, "datadog/agent:7.32.0");
        assert_eq!(image.name, "datadog/agent");
        assert_eq!(image.short_name, "agent");
        assert_eq!(image.tag, "7.32.0");
    }

    #[test]
    fn test_from_raw_name_defaults_to_latest() {
        let image = ContainerImage::from_raw_name("redis");
        assert_eq!(image.name, "redis");
        assert_eq!(image.short_name, "redis");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn test_from_raw_name_with_registry_port() {
        let image = ContainerImage::from_raw_name("localhost:5000/org/app");
        assert_eq!(image.name, "localhost:5000/org/app");
        assert_eq!(image.short_name, "app");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn test_from_raw_name_strips_digest() {
        let raw = "gcr.io/org/app:1.0@sha256:0123456789abcdef";
        let image = ContainerImage::from_raw_name(raw);
        assert_eq!(image.raw_name, raw);
        assert_eq!(image.name, "gcr.io/org/app");
        assert_eq!(image.short_name, "app");
        assert_eq!(image.tag, "1.0");
    }

    #[test]
    fn test_from_raw_name_digest_without_tag() {
        let image = ContainerImage::from_raw_name("redis@sha256:0123456789abcdef");
        assert_eq!(image.name, "redis");
        assert_eq!(image.tag, "latest");
    }
}
