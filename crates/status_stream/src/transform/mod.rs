//! Field transformers and the keyed registry that dispatches to them.

mod generic;
mod registry;

pub use generic::{from_fn, Chain, FnTransformer, Identity, Latency, Profiling, TimedCaching};
pub use registry::{TransformerKey, TransformerRegistry};

use crate::error::TransformError;
use crate::field::Field;

/// Maps one field to its replacement.
///
/// Implementations may keep state across calls (timers, caches, counters);
/// that is why `transform` takes `&mut self`. Errors propagate to the caller
/// of [`TransformerRegistry::apply`] unchanged.
pub trait FieldTransformer: Send {
    fn transform(&mut self, field: Field) -> Result<Field, TransformError>;
}

pub type BoxedTransformer = Box<dyn FieldTransformer>;

impl<T: FieldTransformer + ?Sized> FieldTransformer for Box<T> {
    fn transform(&mut self, field: Field) -> Result<Field, TransformError> {
        (**self).transform(field)
    }
}
