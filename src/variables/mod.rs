//! Variable system.
//!
//! Request, response and transaction data live in collections keyed by
//! [`VariableName`]. Rule targets and macros read them through
//! [`TransactionVariables::collection`].

mod collection;
mod named;
mod resolver;
mod store;

pub use crate::parser::{VariableKind, VariableName};
pub use collection::{Collection, Keyed, Map, MatchData, Single};
pub(crate) use collection::text_and_raw;
pub use named::{NamedCollection, NamedCollectionNames};
pub use resolver::resolve;
pub use store::{parse_query, CollectionRef, TransactionVariables};
