//! Batch authorization over templated requests.
//!
//! Given a policy set, an entity graph and a request template whose slots
//! contain variables, [`run_batch`] produces a decision and diagnostic for
//! every combination of variable values without building the full set of
//! requests up front.
//!
//! # Example
//!
//! ```
//! use authz_batch::{run_batch, BatchRequest};
//! use authz_eval::variable;
//! use authz_types::{EntityUid, Policy, PolicySet, Entities, Record, Value};
//! use tokio_util::sync::CancellationToken;
//!
//! let policies = PolicySet::from_policies([
//!     Policy::permit().principal_eq(EntityUid::new("User", "alice")),
//! ]);
//! let request = BatchRequest::new(
//!     variable("who"),
//!     Value::Entity(EntityUid::new("Action", "view")),
//!     Value::Entity(EntityUid::new("Doc", "1")),
//!     Value::Record(Record::new()),
//! )
//! .variable(
//!     "who",
//!     vec![
//!         Value::Entity(EntityUid::new("User", "alice")),
//!         Value::Entity(EntityUid::new("User", "bob")),
//!     ],
//! );
//!
//! let mut allowed = Vec::new();
//! run_batch(&CancellationToken::new(), &policies, &Entities::new(), request, |r| {
//!     allowed.push(r.decision.is_allow());
//! })
//! .unwrap();
//! assert_eq!(allowed, vec![true, false]);
//! ```

pub mod batch;
pub mod config;
pub mod error;

pub use batch::{run_batch, BatchRequest, BatchResult, BatchRunner, Values, Variables};
pub use config::BatchConfig;
pub use error::{BatchError, ConfigError, Slot};
