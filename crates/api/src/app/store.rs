//! In-memory persistence with transactional units of work.
//!
//! A `UnitOfWork` holds the write lock, mutates a staged copy of the tables,
//! and collects lifecycle events with `on_commit`. `commit` publishes the
//! staged tables and hands back the events; dropping the unit of work (or
//! calling `rollback`) leaves the store untouched and discards the events.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use jobboard_core::{DomainError, DomainResult, Entity};
use jobboard_events::{CommitHooks, LifecycleEvent};

use crate::app::models::{Application, Category, Industry, Job, User};

/// Rows of one entity type keyed by id.
#[derive(Debug, Clone)]
pub struct Table<E: Entity> {
    rows: HashMap<E::Id, E>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self { rows: HashMap::new() }
    }
}

impl<E: Entity> Table<E> {
    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.rows.get(id)
    }

    pub fn require(&self, id: &E::Id) -> DomainResult<&E> {
        self.rows.get(id).ok_or(DomainError::NotFound)
    }

    pub fn require_mut(&mut self, id: &E::Id) -> DomainResult<&mut E> {
        self.rows.get_mut(id).ok_or(DomainError::NotFound)
    }

    pub fn insert(&mut self, row: E) -> DomainResult<()> {
        let id = *row.id();
        if self.rows.contains_key(&id) {
            return Err(DomainError::conflict(format!("{id:?} already exists")));
        }
        self.rows.insert(id, row);
        Ok(())
    }

    pub fn remove(&mut self, id: &E::Id) -> DomainResult<E> {
        self.rows.remove(id).ok_or(DomainError::NotFound)
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: Table<User>,
    pub industries: Table<Industry>,
    pub categories: Table<Category>,
    pub jobs: Table<Job>,
    pub applications: Table<Application>,
}

impl Tables {
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.as_str() == email)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read-only query against committed state.
    pub fn read<R>(&self, query: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        query(&tables)
    }

    /// Start a unit of work. Writers are serialized until it commits or is dropped.
    pub fn transaction(&self) -> UnitOfWork<'_> {
        let guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let staged = guard.clone();
        UnitOfWork {
            guard,
            staged,
            hooks: CommitHooks::new(),
        }
    }
}

pub struct UnitOfWork<'a> {
    guard: RwLockWriteGuard<'a, Tables>,
    staged: Tables,
    hooks: CommitHooks<LifecycleEvent>,
}

impl UnitOfWork<'_> {
    pub fn tables(&self) -> &Tables {
        &self.staged
    }

    pub fn tables_mut(&mut self) -> &mut Tables {
        &mut self.staged
    }

    /// Stage an event to be released once this unit of work commits.
    pub fn on_commit(&mut self, event: LifecycleEvent) {
        self.hooks.defer(event);
    }

    /// Publish the staged tables and release the staged events.
    pub fn commit(self) -> Vec<LifecycleEvent> {
        let UnitOfWork {
            mut guard,
            staged,
            hooks,
        } = self;
        *guard = staged;
        drop(guard);
        hooks.commit()
    }

    pub fn rollback(self) {
        self.hooks.rollback();
    }
}
