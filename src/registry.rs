//! Handler registration, resolution, and execution scopes.
//!
//! The registry is the composition surface of the crate: callers register
//! handler factories per notification type at startup, and the publisher
//! and dispatcher later resolve fresh handler instances from it for every
//! fan-out. The registry is immutable once built and is shared behind an
//! `Arc`, so concurrent fan-outs resolve without any locking.
//!
//! Handler order is contractual: handlers run in registration order.

use crate::core::{Notification, NotificationHandler};
use anyhow::{Context, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type DynFactory<N> =
    Arc<dyn Fn(&Scope) -> Result<Arc<dyn NotificationHandler<N>>> + Send + Sync>;

/// A single registered handler factory, keyed under its notification type.
struct Registration {
    /// Type name of the handler, carried into log events.
    handler: &'static str,
    /// Type-erased `DynFactory<N>` for the owning notification type.
    factory: Box<dyn Any + Send + Sync>,
}

/// A handler instance resolved for one fan-out, paired with its identity.
pub struct ResolvedHandler<N: Notification> {
    pub name: &'static str,
    pub instance: Arc<dyn NotificationHandler<N>>,
}

impl<N: Notification> fmt::Debug for ResolvedHandler<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A unit-of-work boundary from which scoped dependencies are resolved.
///
/// Each scope carries its own typed instance cache: resolving the same
/// dependency type twice within one scope yields the same instance, while
/// a new scope always starts empty. The background dispatcher creates one
/// fresh scope per dispatch so handler dependencies are never shared with
/// the caller's unit of work.
pub struct Scope {
    id: u64,
    instances: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

impl Scope {
    fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// A process-unique id for diagnostic correlation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the scoped instance of `T`, creating it with `init` on
    /// first access within this scope.
    pub fn get_or_init<T, F>(&self, init: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut instances = self.instances.lock().unwrap();
        if let Some(existing) = instances.get(&TypeId::of::<T>()).cloned() {
            if let Ok(typed) = existing.downcast::<T>() {
                return typed;
            }
        }
        let value = Arc::new(init());
        instances.insert(TypeId::of::<T>(), value.clone());
        value
    }
}

/// Builder for [`HandlerRegistry`]. Registration order per notification
/// type is preserved and becomes the invocation order.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<TypeId, Vec<Registration>>,
}

impl RegistryBuilder {
    /// Registers a handler factory for notification type `N`.
    ///
    /// The factory runs once per fan-out, inside the fan-out's scope, so
    /// it may resolve scoped dependencies through [`Scope::get_or_init`].
    pub fn subscribe<N, H, F>(self, factory: F) -> Self
    where
        N: Notification,
        H: NotificationHandler<N> + 'static,
        F: Fn(&Scope) -> H + Send + Sync + 'static,
    {
        self.subscribe_with::<N, _>(std::any::type_name::<H>(), move |scope| {
            Ok(Arc::new(factory(scope)) as Arc<dyn NotificationHandler<N>>)
        })
    }

    /// Registers a fallible handler factory under an explicit name.
    ///
    /// A factory error surfaces as a resolution failure: the publisher
    /// propagates it to its caller, the dispatcher logs and swallows it.
    pub fn subscribe_with<N, F>(mut self, handler: &'static str, factory: F) -> Self
    where
        N: Notification,
        F: Fn(&Scope) -> Result<Arc<dyn NotificationHandler<N>>> + Send + Sync + 'static,
    {
        let factory: DynFactory<N> = Arc::new(factory);
        self.entries
            .entry(TypeId::of::<N>())
            .or_default()
            .push(Registration {
                handler,
                factory: Box::new(factory),
            });
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            entries: self.entries,
        }
    }
}

/// The type-keyed handler table consumed by the publisher and dispatcher.
pub struct HandlerRegistry {
    entries: HashMap<TypeId, Vec<Registration>>,
}

impl HandlerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Creates a new, independent execution scope.
    ///
    /// Used by the background dispatcher for every dispatch; callers of
    /// the publisher use it to establish their own unit-of-work scope.
    pub fn create_scope(&self) -> Scope {
        Scope::new()
    }

    /// Resolves all handlers registered for `N`, in registration order,
    /// instantiated within `scope`.
    ///
    /// A notification type with no registrations resolves to an empty
    /// list; that is a normal outcome, not an error.
    pub fn resolve<N: Notification>(&self, scope: &Scope) -> Result<Vec<ResolvedHandler<N>>> {
        let Some(registrations) = self.entries.get(&TypeId::of::<N>()) else {
            return Ok(Vec::new());
        };
        let mut resolved = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let factory = registration
                .factory
                .downcast_ref::<DynFactory<N>>()
                .expect("registration under TypeId::of::<N> holds a factory for N");
            let instance = factory(scope)
                .with_context(|| format!("handler factory {} failed", registration.handler))?;
            resolved.push(ResolvedHandler {
                name: registration.handler,
                instance,
            });
        }
        Ok(resolved)
    }
}
