//! authz-types - Foundation data model for batch authorization
//!
//! Pure data structures shared by the evaluator (`authz-eval`) and the batch
//! driver (`authz-batch`):
//! - `Value` and its containers (`Record`, `Set`), entity references
//! - The entity graph (`Entities`)
//! - Policies: scope constraints, `when`/`unless` conditions, the `Expr` tree
//! - Requests, decisions and diagnostics
//!
//! ## Critical Rules
//!
//! 1. **NO EVALUATION LOGIC** - constructors, accessors and builders only
//! 2. **NO WORKSPACE DEPENDENCIES** - this is the bottom of the hierarchy
//! 3. **SERIALIZABLE** - every type has a JSON form
//! 4. **CHEAP TO CLONE** - containers share their contents behind `Arc`

mod entity;
mod expr;
mod policy;
mod request;
mod value;

pub use entity::{Entities, Entity};
pub use expr::{BinaryOp, Expr, Var};
pub use policy::{
    Condition, ConditionKind, Effect, Policy, PolicyEntry, PolicyId, PolicySet, PolicySetError,
    Scope,
};
pub use request::{Decision, Diagnostic, DiagnosticReason, Request};
pub use value::{EntityUid, ExtensionValue, Record, Set, Value, ValueError};
