//! In-memory component store.
//!
//! Stands in for the host's entity-component store: typed component records
//! keyed by [`EntityId`], with get/set/create/remove and iteration by
//! component membership. Columns are ordered maps so every system walks
//! entities in the same order on every run.

use std::collections::{BTreeMap, BTreeSet};

use arena_common::{EntityId, StoreError};

use crate::components::{
    Attack, Behavior, Body, CrowdControl, Effect, Health, Movement, Position, Projectile,
    SpecialCharge, Structure,
};

/// A record type that can be stored against an entity.
pub trait Component: Clone + Sized + 'static {
    /// Component name used in error messages.
    const NAME: &'static str;

    /// Column holding every instance of this component.
    fn column(columns: &Columns) -> &BTreeMap<EntityId, Self>;

    /// Mutable column holding every instance of this component.
    fn column_mut(columns: &mut Columns) -> &mut BTreeMap<EntityId, Self>;
}

macro_rules! columns {
    ($($ty:ident => $field:ident),* $(,)?) => {
        /// One ordered column per component type.
        #[derive(Debug, Default)]
        pub struct Columns {
            $($field: BTreeMap<EntityId, $ty>,)*
        }

        impl Columns {
            fn remove_all(&mut self, id: EntityId) {
                $(self.$field.remove(&id);)*
            }
        }

        $(
            impl Component for $ty {
                const NAME: &'static str = stringify!($ty);

                fn column(columns: &Columns) -> &BTreeMap<EntityId, Self> {
                    &columns.$field
                }

                fn column_mut(columns: &mut Columns) -> &mut BTreeMap<EntityId, Self> {
                    &mut columns.$field
                }
            }
        )*
    };
}

columns! {
    Position => positions,
    Body => bodies,
    Movement => movements,
    Health => healths,
    Attack => attacks,
    SpecialCharge => specials,
    CrowdControl => crowd_control,
    Behavior => behaviors,
    Structure => structures,
    Projectile => projectiles,
    Effect => effects,
}

/// Entity-component store.
#[derive(Debug)]
pub struct World {
    /// Live entities
    entities: BTreeSet<EntityId>,
    /// Next raw id to hand out
    next_id: u64,
    /// Component columns
    columns: Columns,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeSet::new(),
            next_id: 1,
            columns: Columns::default(),
        }
    }

    /// Reserves a new entity and returns a builder to attach components.
    pub fn create(&mut self) -> EntityBuilder<'_> {
        let id = EntityId::from_raw(self.next_id);
        self.next_id += 1;
        self.entities.insert(id);
        EntityBuilder { world: self, id }
    }

    /// Whether the entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns a copy of a component.
    pub fn get<T: Component>(&self, id: EntityId) -> Result<T, StoreError> {
        self.get_ref(id).cloned()
    }

    /// Borrows a component.
    pub fn get_ref<T: Component>(&self, id: EntityId) -> Result<&T, StoreError> {
        T::column(&self.columns).get(&id).ok_or_else(|| self.missing::<T>(id))
    }

    /// Mutably borrows a component.
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Result<&mut T, StoreError> {
        if !self.entities.contains(&id) {
            return Err(StoreError::EntityNotFound(id));
        }
        T::column_mut(&mut self.columns)
            .get_mut(&id)
            .ok_or(StoreError::MissingComponent {
                entity: id,
                component: T::NAME,
            })
    }

    /// Whether the entity has a component of type `T`.
    #[must_use]
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        T::column(&self.columns).contains_key(&id)
    }

    /// Writes a component, replacing any previous value.
    ///
    /// Fails if the entity has been removed.
    pub fn set<T: Component>(&mut self, id: EntityId, value: T) -> Result<(), StoreError> {
        if !self.entities.contains(&id) {
            return Err(StoreError::WriteRejected {
                entity: id,
                component: T::NAME,
            });
        }
        T::column_mut(&mut self.columns).insert(id, value);
        Ok(())
    }

    /// Removes an entity and every component attached to it.
    pub fn remove(&mut self, id: EntityId) -> Result<(), StoreError> {
        if !self.entities.remove(&id) {
            return Err(StoreError::EntityNotFound(id));
        }
        self.columns.remove_all(id);
        Ok(())
    }

    /// Ids of every entity carrying `T`, in ascending order.
    #[must_use]
    pub fn ids_with<T: Component>(&self) -> Vec<EntityId> {
        T::column(&self.columns).keys().copied().collect()
    }

    /// Iterates `(id, component)` pairs for `T` in ascending id order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        T::column(&self.columns).iter().map(|(id, c)| (*id, c))
    }

    fn missing<T: Component>(&self, id: EntityId) -> StoreError {
        if self.entities.contains(&id) {
            StoreError::MissingComponent {
                entity: id,
                component: T::NAME,
            }
        } else {
            StoreError::EntityNotFound(id)
        }
    }
}

/// Attaches components to a freshly created entity.
#[derive(Debug)]
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    id: EntityId,
}

impl EntityBuilder<'_> {
    /// Attaches a component.
    #[must_use]
    pub fn with<T: Component>(self, component: T) -> Self {
        T::column_mut(&mut self.world.columns).insert(self.id, component);
        self
    }

    /// Attaches a component if one is given.
    #[must_use]
    pub fn with_opt<T: Component>(self, component: Option<T>) -> Self {
        match component {
            Some(c) => self.with(c),
            None => self,
        }
    }

    /// Finishes the entity and returns its id.
    #[must_use]
    pub fn id(self) -> EntityId {
        self.id
    }
}
