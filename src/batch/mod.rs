//! Batch authorization over a templated request.
//!
//! A [`BatchRequest`] holds principal, action, resource and context values
//! that may contain variable placeholders, plus a candidate list per
//! variable. The run visits every combination of candidates depth-first,
//! pruning policies at each level, and hands one [`BatchResult`] per
//! combination to the caller's callback.
//!
//! ```text
//! run_batch ──► expand(node) ──► prune frame ──► bind next variable ──► expand(child)
//!                    │
//!                    └── no variables left ──► decide ──► callback(BatchResult)
//! ```

mod bindings;
mod decision;
mod expand;
mod substitute;

use std::collections::BTreeMap;

use authz_types::{Decision, Diagnostic, Entities, PolicySet, Request, Value};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::BatchConfig;
use crate::error::{BatchError, Slot};

pub use bindings::Bindings;
pub use substitute::{mentions_variable, substitute};

use decision::Frame;
use expand::{order_variables, uses_ignore, Expander, Slots};

/// Candidate values per variable name
pub type Variables = BTreeMap<String, Vec<Value>>;

/// The value bound to each variable for one result
pub type Values = BTreeMap<String, Value>;

/// A request template.
///
/// Every slot must be present. Slots may contain placeholders built with
/// [`authz_eval::variable`]; any slot may instead be the whole
/// [`authz_eval::ignore`] sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub principal: Option<Value>,
    pub action: Option<Value>,
    pub resource: Option<Value>,
    pub context: Option<Value>,
    #[serde(default)]
    pub variables: Variables,
}

impl BatchRequest {
    pub fn new(principal: Value, action: Value, resource: Value, context: Value) -> Self {
        Self {
            principal: Some(principal),
            action: Some(action),
            resource: Some(resource),
            context: Some(context),
            variables: Variables::new(),
        }
    }

    pub fn variable(mut self, name: impl Into<String>, candidates: Vec<Value>) -> Self {
        self.variables.insert(name.into(), candidates);
        self
    }

    fn into_parts(self) -> Result<(Slots, Variables), BatchError> {
        let slots = Slots {
            principal: self.principal.ok_or(BatchError::MissingSlot(Slot::Principal))?,
            action: self.action.ok_or(BatchError::MissingSlot(Slot::Action))?,
            resource: self.resource.ok_or(BatchError::MissingSlot(Slot::Resource))?,
            context: self.context.ok_or(BatchError::MissingSlot(Slot::Context))?,
        };
        Ok((slots, self.variables))
    }
}

/// Outcome for one concrete combination of variable values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub request: Request,
    pub values: Values,
    pub decision: Decision,
    pub diagnostic: Diagnostic,
}

/// Runs batches with an explicit [`BatchConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Evaluate every combination of `request`'s variables.
    ///
    /// `callback` runs once per combination, in depth-first order over the
    /// expansion order of the variables. The first cancellation or
    /// conversion error stops the run; results already delivered stand.
    pub fn run<F>(
        &self,
        cancel: &CancellationToken,
        policies: &PolicySet,
        entities: &Entities,
        request: BatchRequest,
        callback: F,
    ) -> Result<(), BatchError>
    where
        F: FnMut(BatchResult),
    {
        let (slots, variables) = request.into_parts()?;
        let variables = order_variables(variables, self.config.sort_variables);

        if !self.config.prune && uses_ignore(&slots) {
            warn!("Ignore sentinel used without pruning; ignored slots are evaluated as stand-ins");
        }
        info!(
            policies = policies.len(),
            variables = variables.len(),
            prune = self.config.prune,
            "Starting batch"
        );

        let frame = Frame::from_set(policies);
        let mut expander = Expander::new(cancel, entities, self.config, callback);
        let outcome = expander.expand(&frame, slots, &variables, Bindings::new());

        let stats = expander.stats;
        match &outcome {
            Ok(()) => info!(
                nodes = stats.nodes,
                results = stats.leaves,
                pruned = stats.pruned,
                "Batch finished"
            ),
            Err(e) => warn!(results = stats.leaves, error = %e, "Batch stopped"),
        }
        outcome
    }
}

/// [`BatchRunner::run`] with the default configuration
pub fn run_batch<F>(
    cancel: &CancellationToken,
    policies: &PolicySet,
    entities: &Entities,
    request: BatchRequest,
    callback: F,
) -> Result<(), BatchError>
where
    F: FnMut(BatchResult),
{
    BatchRunner::default().run(cancel, policies, entities, request, callback)
}
