use authz_types::{Entities, Value, Var};

/// Evaluation environment: the entity graph plus the four request slots.
///
/// Slots are plain values so the same environment type serves both fully
/// concrete leaves and templated requests under partial evaluation.
#[derive(Debug, Clone)]
pub struct Env<'a> {
    pub entities: &'a Entities,
    pub principal: Value,
    pub action: Value,
    pub resource: Value,
    pub context: Value,
}

impl<'a> Env<'a> {
    pub fn new(
        entities: &'a Entities,
        principal: Value,
        action: Value,
        resource: Value,
        context: Value,
    ) -> Self {
        Self {
            entities,
            principal,
            action,
            resource,
            context,
        }
    }

    pub fn slot(&self, var: Var) -> &Value {
        match var {
            Var::Principal => &self.principal,
            Var::Action => &self.action,
            Var::Resource => &self.resource,
            Var::Context => &self.context,
        }
    }
}
