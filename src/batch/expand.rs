//! Depth-first expansion of the variable Cartesian product.
//!
//! Each node binds one variable. Before branching, the node's policy frame
//! is partially evaluated against the still-templated slots so that every
//! leaf below it only compiles and evaluates the policies that can still
//! matter.

use std::rc::Rc;

use authz_eval::{is_ignore, to_entity, to_record, unknown_entity, Env};
use authz_types::{Entities, Record, Request, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::bindings::Bindings;
use super::decision::Frame;
use super::substitute::{mentions_variable, substitute};
use super::{BatchResult, Variables};
use crate::config::BatchConfig;
use crate::error::{BatchError, Slot};

pub(crate) struct Variable {
    name: Rc<str>,
    candidates: Vec<Value>,
}

/// Expansion order: name order, then fewest candidates first when sorting is
/// enabled. The sort is stable so ties stay in name order.
pub(crate) fn order_variables(variables: Variables, sort: bool) -> Vec<Variable> {
    let mut ordered: Vec<Variable> = variables
        .into_iter()
        .map(|(name, candidates)| Variable {
            name: name.into(),
            candidates,
        })
        .collect();
    if sort {
        ordered.sort_by_key(|v| v.candidates.len());
    }
    ordered
}

#[derive(Clone)]
pub(crate) struct Slots {
    pub principal: Value,
    pub action: Value,
    pub resource: Value,
    pub context: Value,
}

impl Slots {
    fn env<'a>(&self, entities: &'a Entities) -> Env<'a> {
        Env::new(
            entities,
            self.principal.clone(),
            self.action.clone(),
            self.resource.clone(),
            self.context.clone(),
        )
    }

    /// Stand in for slots nothing below this node reads
    fn resolve_ignored(&mut self) {
        for slot in [&mut self.principal, &mut self.action, &mut self.resource] {
            if is_ignore(slot) {
                *slot = Value::Entity(unknown_entity());
            }
        }
        if is_ignore(&self.context) {
            self.context = Value::Record(Record::new());
        }
    }

    fn to_request(&self) -> Result<Request, BatchError> {
        let entity = |slot: Slot, value: &Value| {
            to_entity(value).map_err(|source| BatchError::Conversion { slot, source })
        };
        Ok(Request {
            principal: entity(Slot::Principal, &self.principal)?,
            action: entity(Slot::Action, &self.action)?,
            resource: entity(Slot::Resource, &self.resource)?,
            context: to_record(&self.context).map_err(|source| BatchError::Conversion {
                slot: Slot::Context,
                source,
            })?,
        })
    }
}

/// Which slots mention the variable being bound
#[derive(Debug, Clone, Copy)]
struct Mentions {
    principal: bool,
    action: bool,
    resource: bool,
    context: bool,
}

impl Mentions {
    fn probe(slots: &Slots, name: &str) -> Self {
        Self {
            principal: mentions_variable(&slots.principal, name),
            action: mentions_variable(&slots.action, name),
            resource: mentions_variable(&slots.resource, name),
            context: mentions_variable(&slots.context, name),
        }
    }
}

fn rebind(slot: &Value, mentioned: bool, name: &str, value: &Value) -> Value {
    if mentioned {
        substitute(slot, name, value).unwrap_or_else(|| slot.clone())
    } else {
        slot.clone()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ExpandStats {
    pub nodes: u64,
    pub leaves: u64,
    pub pruned: u64,
}

pub(crate) struct Expander<'a, F> {
    cancel: &'a CancellationToken,
    entities: &'a Entities,
    config: BatchConfig,
    callback: F,
    pub stats: ExpandStats,
}

impl<'a, F: FnMut(BatchResult)> Expander<'a, F> {
    pub(crate) fn new(
        cancel: &'a CancellationToken,
        entities: &'a Entities,
        config: BatchConfig,
        callback: F,
    ) -> Self {
        Self {
            cancel,
            entities,
            config,
            callback,
            stats: ExpandStats::default(),
        }
    }

    pub(crate) fn expand(
        &mut self,
        frame: &Frame,
        mut slots: Slots,
        variables: &[Variable],
        bindings: Bindings,
    ) -> Result<(), BatchError> {
        if self.cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }
        self.stats.nodes += 1;

        let Some((first, rest)) = variables.split_first() else {
            return self.leaf(frame, &slots, bindings);
        };

        let pruned;
        let frame = if self.config.prune {
            pruned = frame.prune(&slots.env(self.entities));
            let dropped = frame.len() - pruned.len();
            self.stats.pruned += dropped as u64;
            debug!(
                depth = bindings.len(),
                variable = %first.name,
                kept = pruned.len(),
                dropped,
                "Pruned policy frame"
            );
            &pruned
        } else {
            frame
        };

        if rest.is_empty() {
            slots.resolve_ignored();
        }

        let mentions = Mentions::probe(&slots, &first.name);
        for value in &first.candidates {
            let child = Slots {
                principal: rebind(&slots.principal, mentions.principal, &first.name, value),
                action: rebind(&slots.action, mentions.action, &first.name, value),
                resource: rebind(&slots.resource, mentions.resource, &first.name, value),
                context: rebind(&slots.context, mentions.context, &first.name, value),
            };
            let bindings = bindings.bind(first.name.clone(), value.clone());
            self.expand(frame, child, rest, bindings)?;
        }
        Ok(())
    }

    fn leaf(&mut self, frame: &Frame, slots: &Slots, bindings: Bindings) -> Result<(), BatchError> {
        let request = slots.to_request()?;
        let (decision, diagnostic) = frame.decide(&slots.env(self.entities));
        self.stats.leaves += 1;
        trace!(
            principal = %request.principal,
            action = %request.action,
            resource = %request.resource,
            %decision,
            "Leaf decided"
        );
        (self.callback)(BatchResult {
            request,
            values: bindings.to_values(),
            decision,
            diagnostic,
        });
        Ok(())
    }
}

/// True when the template uses the ignore sentinel in any slot
pub(crate) fn uses_ignore(slots: &Slots) -> bool {
    [&slots.principal, &slots.action, &slots.resource, &slots.context]
        .into_iter()
        .any(is_ignore)
}
