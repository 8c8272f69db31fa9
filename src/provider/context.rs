//! Runtime context handed to the provider by the host pipeline

use crate::provider::ProviderError;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Runtime value naming the document path to crawl
pub const PATH_KEY: &str = "path";

/// Whether the host is indexing new documents or refreshing existing ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchType {
    Insert,
    Update,
}

impl DispatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for DispatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DispatchType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            _ => Err(ProviderError::RuntimeValidation(format!(
                "unknown dispatch type '{}', expected INSERT or UPDATE",
                s
            ))),
        }
    }
}

/// Per-dispatch input: the context name, dispatch type and untyped values
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Context name scoping every ledger row
    pub context: String,
    pub dispatch_type: DispatchType,
    pub runtime_values: Map<String, Value>,
}

impl RuntimeContext {
    pub fn new(context: impl Into<String>, dispatch_type: DispatchType) -> Self {
        Self {
            context: context.into(),
            dispatch_type,
            runtime_values: Map::new(),
        }
    }

    /// Adds a runtime value
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.runtime_values.insert(key.into(), value.into());
        self
    }

    /// Shorthand for a context carrying a string `path`
    pub fn with_path(self, path: impl Into<String>) -> Self {
        self.with_value(PATH_KEY, path.into())
    }

    /// Extracts the required `path` runtime value
    ///
    /// Both dispatch types require it, and it must be a JSON string.
    pub fn validated_path(&self) -> Result<&str, ProviderError> {
        match self.runtime_values.get(PATH_KEY) {
            Some(Value::String(path)) => Ok(path.as_str()),
            Some(other) => Err(ProviderError::RuntimeValidation(format!(
                "\"path\" runtime option must be a string, got {}",
                value_kind(other)
            ))),
            None => Err(ProviderError::RuntimeValidation(
                "no \"path\" runtime option given, needs to be a valid string".to_string(),
            )),
        }
    }

    /// Picks the URL a run starts from
    ///
    /// INSERT crawls from the seed. UPDATE crawls from `path`, which may be
    /// an absolute URL or a reference resolved against the seed.
    pub fn entry_url(&self, seed: &Url) -> Result<Url, ProviderError> {
        let path = self.validated_path()?;

        match self.dispatch_type {
            DispatchType::Insert => Ok(seed.clone()),
            DispatchType::Update => resolve_path(seed, path),
        }
    }
}

fn resolve_path(seed: &Url, path: &str) -> Result<Url, ProviderError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::RuntimeValidation(
            "\"path\" runtime option is empty".to_string(),
        ));
    }

    match Url::parse(trimmed) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => seed.join(trimmed).map_err(|e| {
            ProviderError::RuntimeValidation(format!("cannot resolve path '{}': {}", trimmed, e))
        }),
        Err(e) => Err(ProviderError::RuntimeValidation(format!(
            "invalid path '{}': {}",
            trimmed, e
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seed() -> Url {
        Url::parse("http://example.com/docs/").unwrap()
    }

    #[test]
    fn test_dispatch_type_parsing() {
        assert_eq!("insert".parse::<DispatchType>().unwrap(), DispatchType::Insert);
        assert_eq!("UPDATE".parse::<DispatchType>().unwrap(), DispatchType::Update);
        assert!("delete".parse::<DispatchType>().is_err());
    }

    #[test]
    fn test_path_required_for_both_dispatch_types() {
        for dispatch in [DispatchType::Insert, DispatchType::Update] {
            let context = RuntimeContext::new("default", dispatch);
            assert!(matches!(
                context.validated_path(),
                Err(ProviderError::RuntimeValidation(_))
            ));
        }
    }

    #[test]
    fn test_path_must_be_string() {
        let context = RuntimeContext::new("default", DispatchType::Update).with_value("path", json!(42));
        let err = context.validated_path().unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_insert_starts_at_seed() {
        let context = RuntimeContext::new("default", DispatchType::Insert).with_path("/ignored");
        assert_eq!(context.entry_url(&seed()).unwrap(), seed());
    }

    #[test]
    fn test_update_resolves_path() {
        let relative = RuntimeContext::new("default", DispatchType::Update).with_path("page.html");
        assert_eq!(
            relative.entry_url(&seed()).unwrap().as_str(),
            "http://example.com/docs/page.html"
        );

        let rooted = RuntimeContext::new("default", DispatchType::Update).with_path("/about");
        assert_eq!(
            rooted.entry_url(&seed()).unwrap().as_str(),
            "http://example.com/about"
        );

        let absolute = RuntimeContext::new("default", DispatchType::Update)
            .with_path("http://other.example.com/x");
        assert_eq!(
            absolute.entry_url(&seed()).unwrap().as_str(),
            "http://other.example.com/x"
        );
    }

    #[test]
    fn test_update_rejects_empty_path() {
        let context = RuntimeContext::new("default", DispatchType::Update).with_path("  ");
        assert!(context.entry_url(&seed()).is_err());
    }
}
