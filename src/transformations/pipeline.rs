//! Ordered transformation chain attached to a rule.

use super::Transformation;
use std::borrow::Cow;
use std::sync::Arc;

/// Transformations applied in order to every value a rule inspects.
#[derive(Clone, Default)]
pub struct TransformationPipeline {
    steps: Vec<(String, Arc<dyn Transformation>)>,
}

impl TransformationPipeline {
    /// Empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn push(&mut self, name: impl Into<String>, transformation: Arc<dyn Transformation>) {
        self.steps.push((name.into(), transformation));
    }

    /// Drop every step (`t:none`).
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Apply every step in order.
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut current: Cow<'a, str> = Cow::Borrowed(input);

        for (_, t) in &self.steps {
            current = match current {
                Cow::Borrowed(s) => t.transform(s),
                Cow::Owned(s) => {
                    // A borrow of the whole input means the step changed nothing.
                    let next = match t.transform(&s) {
                        Cow::Borrowed(b) if std::ptr::eq(b, s.as_str()) => None,
                        Cow::Borrowed(b) => Some(b.to_string()),
                        Cow::Owned(o) => Some(o),
                    };
                    Cow::Owned(next.unwrap_or(s))
                }
            };
        }

        current
    }

    /// Apply every step in order to raw bytes.
    pub fn apply_bytes<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        let mut current: Cow<'a, [u8]> = Cow::Borrowed(input);

        for (_, t) in &self.steps {
            current = match current {
                Cow::Borrowed(b) => t.transform_bytes(b),
                Cow::Owned(v) => {
                    let next = match t.transform_bytes(&v) {
                        Cow::Borrowed(b) if std::ptr::eq(b, v.as_slice()) => None,
                        Cow::Borrowed(b) => Some(b.to_vec()),
                        Cow::Owned(o) => Some(o),
                    };
                    Cow::Owned(next.unwrap_or(v))
                }
            };
        }

        current
    }

    /// Whether no step is attached.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Step names in application order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Debug for TransformationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformationPipeline")
            .field("transformations", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
