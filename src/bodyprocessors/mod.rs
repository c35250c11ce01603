//! Request body processors.
//!
//! Processors are registered by name. Each one lists the MIME types it
//! handles, and the transaction picks the processor for the request's
//! `Content-Type`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::variables::{parse_query, TransactionVariables};

/// Parses a buffered request body into transaction variables.
pub trait BodyProcessor: Send + Sync {
    /// Parse `body` and add what it contains to `variables`.
    fn process(&self, body: &[u8], variables: &mut TransactionVariables) -> Result<()>;

    /// MIME types, without parameters, this processor is selected for.
    fn content_types(&self) -> &[&str] {
        &[]
    }
}

/// `application/x-www-form-urlencoded` bodies become `ARGS_POST`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlencodedProcessor;

impl BodyProcessor for UrlencodedProcessor {
    fn process(&self, body: &[u8], variables: &mut TransactionVariables) -> Result<()> {
        for (key, value) in parse_query(body) {
            variables.add_post_argument_bytes(&key, &value);
        }
        Ok(())
    }

    fn content_types(&self) -> &[&str] {
        &["application/x-www-form-urlencoded"]
    }
}

/// Body processors by name, plus the MIME type to name mapping.
#[derive(Clone, Default)]
pub struct BodyProcessorRegistry {
    processors: HashMap<String, Arc<dyn BodyProcessor>>,
    content_types: HashMap<String, String>,
}

impl fmt::Debug for BodyProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.processors.keys().collect();
        names.sort();
        f.debug_struct("BodyProcessorRegistry")
            .field("names", &names)
            .field("content_types", &self.content_types)
            .finish()
    }
}

impl BodyProcessorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `urlencoded` processor.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("urlencoded", Arc::new(UrlencodedProcessor));
        registry
    }

    /// Register `processor` under `name`, replacing any previous entry, and
    /// map each of its content types to it.
    pub fn register(&mut self, name: &str, processor: Arc<dyn BodyProcessor>) {
        let name = name.to_lowercase();
        for content_type in processor.content_types() {
            self.content_types
                .insert(content_type.to_lowercase(), name.clone());
        }
        if self.processors.insert(name.clone(), processor).is_some() {
            tracing::debug!(processor = %name, "body processor overridden");
        }
    }

    /// Route `content_type` to the processor registered as `name`.
    pub fn register_content_type(&mut self, content_type: &str, name: &str) {
        self.content_types
            .insert(content_type.to_lowercase(), name.to_lowercase());
    }

    /// Look up a processor by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn BodyProcessor>> {
        self.processors
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::BodyProcessor {
                message: format!("unknown body processor '{}'", name),
            })
    }

    /// Processor, and its name, for a `Content-Type` header value.
    /// Parameters such as `charset` are ignored.
    pub fn for_content_type(&self, content_type: &str) -> Option<(&str, Arc<dyn BodyProcessor>)> {
        let mime = content_type.split(';').next().unwrap_or("").trim();
        let name = self.content_types.get(&mime.to_lowercase())?;
        let processor = self.processors.get(name)?;
        Some((name.as_str(), Arc::clone(processor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{Keyed, VariableName};

    struct MarkerProcessor;

    impl BodyProcessor for MarkerProcessor {
        fn process(&self, _body: &[u8], variables: &mut TransactionVariables) -> Result<()> {
            variables.add_post_argument("json", "seen");
            Ok(())
        }

        fn content_types(&self) -> &[&str] {
            &["application/json"]
        }
    }

    #[test]
    fn test_urlencoded() {
        let mut vars = TransactionVariables::new();
        UrlencodedProcessor
            .process(b"user=admin&q=a+b%21&user=root", &mut vars)
            .unwrap();
        let post = vars.keyed(VariableName::ArgsPost).unwrap();
        assert_eq!(post.get("user"), vec!["admin", "root"]);
        assert_eq!(post.get("q"), vec!["a b!"]);
        assert_eq!(vars.keyed(VariableName::Args).unwrap().get("q"), vec!["a b!"]);
    }

    #[test]
    fn test_urlencoded_keeps_raw_values() {
        let mut vars = TransactionVariables::new();
        UrlencodedProcessor.process(b"b=%FF", &mut vars).unwrap();
        let found = vars.keyed(VariableName::ArgsPost).unwrap().find_string("b");
        assert_eq!(found[0].bytes(), b"\xFF");
    }

    #[test]
    fn test_unknown_processor() {
        let registry = BodyProcessorRegistry::with_builtins();
        assert!(matches!(registry.get("xml"), Err(Error::BodyProcessor { .. })));
    }

    #[test]
    fn test_selection_by_content_type() {
        let mut registry = BodyProcessorRegistry::with_builtins();
        let (name, _) = registry
            .for_content_type("Application/X-WWW-Form-Urlencoded; charset=utf-8")
            .unwrap();
        assert_eq!(name, "urlencoded");
        assert!(registry.for_content_type("application/json").is_none());

        registry.register("json", Arc::new(MarkerProcessor));
        let (name, _) = registry.for_content_type("application/json").unwrap();
        assert_eq!(name, "json");

        registry.register_content_type("text/json", "json");
        assert!(registry.for_content_type("text/json").is_some());
    }
}
