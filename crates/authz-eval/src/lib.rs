//! Evaluation collaborators for batch authorization.
//!
//! This crate provides:
//!
//! - **placeholder**: recognizer for variable placeholders and the ignore sentinel
//! - **convert**: strict conversion of slot values into request form
//! - **eval**: full evaluator over a concrete [`Env`]
//! - **compile**: policies compiled into reusable [`BoolEvaler`]s
//! - **partial**: partial evaluator that simplifies or drops a policy for a
//!   templated request
//!
//! # Architecture
//!
//! ```text
//! Policy ──► partial_policy(env) ──► Some(simplified) | None | Err
//!    │
//!    └────► compile() ──► CompiledPolicy ──► eval(env) ──► bool
//! ```
//!
//! # Example
//!
//! ```
//! use authz_eval::{compile, BoolEvaler, Env};
//! use authz_types::{Entities, EntityUid, Policy, Record, Value};
//!
//! let entities = Entities::new();
//! let policy = Policy::permit().principal_eq(EntityUid::new("User", "alice"));
//! let env = Env::new(
//!     &entities,
//!     Value::Entity(EntityUid::new("User", "alice")),
//!     Value::Entity(EntityUid::new("Action", "view")),
//!     Value::Entity(EntityUid::new("Doc", "1")),
//!     Value::Record(Record::new()),
//! );
//! assert_eq!(compile(&policy).eval(&env), Ok(true));
//! ```

pub mod compile;
pub mod convert;
mod env;
mod error;
pub mod eval;
pub mod partial;
pub mod placeholder;

pub use compile::{compile, BoolEvaler, CompiledPolicy};
pub use convert::{to_entity, to_record};
pub use env::Env;
pub use error::EvalError;
pub use eval::{evaluate, evaluate_policy};
pub use partial::partial_policy;
pub use placeholder::{ignore, is_ignore, is_placeholder, to_variable, unknown_entity, variable};
