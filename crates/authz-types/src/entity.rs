//! Entity graph: attributes and parent links per entity.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::value::{EntityUid, Record};

/// A single entity with its attributes and direct parents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub uid: EntityUid,
    #[serde(default)]
    pub attrs: Record,
    #[serde(default)]
    pub parents: BTreeSet<EntityUid>,
}

impl Entity {
    pub fn new(uid: EntityUid) -> Self {
        Self {
            uid,
            attrs: Record::new(),
            parents: BTreeSet::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Record) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_parent(mut self, parent: EntityUid) -> Self {
        self.parents.insert(parent);
        self
    }
}

/// Read-only entity store. JSON form is an array of entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Entity>", into = "Vec<Entity>")]
pub struct Entities(HashMap<EntityUid, Entity>);

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, replacing any previous entity with the same uid
    pub fn insert(&mut self, entity: Entity) {
        self.0.insert(entity.uid.clone(), entity);
    }

    pub fn get(&self, uid: &EntityUid) -> Option<&Entity> {
        self.0.get(uid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.values()
    }

    /// Whether `ancestor` is reachable from `uid` through parent links.
    /// An entity is not its own ancestor; cycles are tolerated.
    pub fn is_ancestor(&self, uid: &EntityUid, ancestor: &EntityUid) -> bool {
        let mut seen: HashSet<&EntityUid> = HashSet::new();
        let mut pending: Vec<&EntityUid> = vec![uid];

        while let Some(current) = pending.pop() {
            let Some(entity) = self.0.get(current) else {
                continue;
            };
            for parent in &entity.parents {
                if parent == ancestor {
                    return true;
                }
                if seen.insert(parent) {
                    pending.push(parent);
                }
            }
        }
        false
    }
}

impl FromIterator<Entity> for Entities {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self(iter.into_iter().map(|e| (e.uid.clone(), e)).collect())
    }
}

impl From<Vec<Entity>> for Entities {
    fn from(entities: Vec<Entity>) -> Self {
        entities.into_iter().collect()
    }
}

impl From<Entities> for Vec<Entity> {
    fn from(entities: Entities) -> Self {
        let mut list: Vec<Entity> = entities.0.into_values().collect();
        list.sort_by(|a, b| a.uid.cmp(&b.uid));
        list
    }
}
