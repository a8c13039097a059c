//! Policy frames and the per-leaf decision.

use authz_eval::{compile, partial_policy, BoolEvaler, CompiledPolicy, Env};
use authz_types::{Decision, Diagnostic, Effect, Policy, PolicyId, PolicySet};
use once_cell::unsync::OnceCell;
use tracing::debug;

struct Compiled {
    forbids: Vec<(PolicyId, CompiledPolicy)>,
    permits: Vec<(PolicyId, CompiledPolicy)>,
}

/// The policies still in play at one node of the expansion tree.
///
/// Compiled lazily on the first leaf decision and then reused by every
/// sibling leaf of the node.
pub(crate) struct Frame {
    policies: Vec<(PolicyId, Policy)>,
    compiled: OnceCell<Compiled>,
}

impl Frame {
    fn new(policies: Vec<(PolicyId, Policy)>) -> Self {
        Self {
            policies,
            compiled: OnceCell::new(),
        }
    }

    pub(crate) fn from_set(set: &PolicySet) -> Self {
        Self::new(set.iter().map(|(id, p)| (id.clone(), p.clone())).collect())
    }

    pub(crate) fn len(&self) -> usize {
        self.policies.len()
    }

    /// Partially evaluate every policy against the templated `env`. Policies
    /// that can never be satisfied, or that error for every completion, are
    /// left out of the new frame.
    pub(crate) fn prune(&self, env: &Env<'_>) -> Frame {
        let mut kept = Vec::with_capacity(self.policies.len());
        for (id, policy) in &self.policies {
            match partial_policy(env, policy) {
                Ok(Some(simplified)) => kept.push((id.clone(), simplified)),
                Ok(None) => {}
                Err(e) => debug!(policy = %id, error = %e, "Policy always errors, dropping"),
            }
        }
        Frame::new(kept)
    }

    fn compiled(&self) -> &Compiled {
        self.compiled.get_or_init(|| {
            let mut forbids = Vec::new();
            let mut permits = Vec::new();
            for (id, policy) in &self.policies {
                let target = match policy.effect {
                    Effect::Forbid => &mut forbids,
                    Effect::Permit => &mut permits,
                };
                target.push((id.clone(), compile(policy)));
            }
            Compiled { forbids, permits }
        })
    }

    /// Forbid overrides permit; no satisfied policy means deny.
    ///
    /// The diagnostic lists every satisfied policy of the deciding effect in
    /// frame order. Permits are not evaluated once a forbid holds.
    pub(crate) fn decide(&self, env: &Env<'_>) -> (Decision, Diagnostic) {
        let compiled = self.compiled();

        let forbidden = satisfied(&compiled.forbids, env);
        if !forbidden.is_empty() {
            return (Decision::Deny, forbidden);
        }

        let permitted = satisfied(&compiled.permits, env);
        let decision = Decision::from(!permitted.is_empty());
        (decision, permitted)
    }
}

fn satisfied(policies: &[(PolicyId, CompiledPolicy)], env: &Env<'_>) -> Diagnostic {
    let mut diagnostic = Diagnostic::default();
    for (id, evaler) in policies {
        match evaler.eval(env) {
            Ok(true) => diagnostic.push(id.clone()),
            Ok(false) => {}
            Err(e) => debug!(policy = %id, error = %e, "Policy evaluation failed, not satisfied"),
        }
    }
    diagnostic
}
