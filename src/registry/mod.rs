//! Code-keyed handler registry with atomically swapped snapshots
//!
//! Tasks often carry a numeric code naming the handler that should process
//! them. [`HandlerRegistry`] maps codes to factory functions in two tables:
//! a static table fixed at construction and a dynamic snapshot that
//! [`HandlerRegistry::reload`] replaces as a whole. Lookups read the snapshot
//! through an [`ArcSwap`] and never block, even while a reload is building the
//! next one.
//!
//! # Example
//!
//! ```rust
//! use rust_queue_group::registry::{HandlerRegistry, Registration};
//!
//! trait Handler: Send {
//!     fn handle(&self, payload: &str) -> String;
//! }
//!
//! struct Echo;
//! impl Handler for Echo {
//!     fn handle(&self, payload: &str) -> String {
//!         payload.to_string()
//!     }
//! }
//!
//! fn echo() -> Box<dyn Handler> {
//!     Box::new(Echo)
//! }
//!
//! let registry: HandlerRegistry<dyn Handler> =
//!     HandlerRegistry::new("handlers", vec![Registration::new(1, "echo", echo)]);
//!
//! let handler = registry.build_instance(1).unwrap();
//! assert_eq!(handler.handle("hi"), "hi");
//! assert!(registry.build_instance(2).is_none());
//! ```

use crate::core::{QueueGroupError, Result};
use arc_swap::ArcSwap;
use log::{debug, error};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Function creating a fresh handler instance
pub type HandlerFactory<H> = fn() -> Box<H>;

/// One code to factory binding
pub struct Registration<H: ?Sized> {
    /// Handler code
    pub code: i32,
    /// Name used in logs
    pub name: &'static str,
    /// Creates the handler
    pub factory: HandlerFactory<H>,
}

impl<H: ?Sized> Registration<H> {
    /// Create a registration
    pub fn new(code: i32, name: &'static str, factory: HandlerFactory<H>) -> Self {
        Self {
            code,
            name,
            factory,
        }
    }
}

impl<H: ?Sized> Clone for Registration<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: ?Sized> Copy for Registration<H> {}

impl<H: ?Sized> fmt::Debug for Registration<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("code", &self.code)
            .field("name", &self.name)
            .finish()
    }
}

/// Lifecycle of the dynamic table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegistryState {
    /// No reload has run yet
    Ready,
    /// A reload is building the next snapshot
    Loading,
    /// At least one reload has published a snapshot
    Loaded,
}

impl RegistryState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RegistryState::Loading,
            2 => RegistryState::Loaded,
            _ => RegistryState::Ready,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RegistryState::Ready => 0,
            RegistryState::Loading => 1,
            RegistryState::Loaded => 2,
        }
    }
}

type Table<H> = HashMap<i32, Registration<H>>;

/// Registry resolving handler codes to new handler instances
pub struct HandlerRegistry<H: ?Sized + 'static> {
    name: String,
    statics: Table<H>,
    dynamic: ArcSwap<Table<H>>,
    state: AtomicU8,
    reload_lock: Mutex<()>,
    reload_disabled: AtomicBool,
}

impl<H: ?Sized + 'static> HandlerRegistry<H> {
    /// Create a registry whose static table holds `statics`
    ///
    /// Duplicate codes keep the first registration; later ones are logged.
    pub fn new<S, I>(name: S, statics: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Registration<H>>,
    {
        let name = name.into();
        let statics = build_table(&name, statics);
        debug!(
            "Handler registry '{}' created with {} static handlers",
            name,
            statics.len()
        );
        Self {
            name,
            statics,
            dynamic: ArcSwap::from_pointee(HashMap::new()),
            state: AtomicU8::new(RegistryState::Ready.as_u8()),
            reload_lock: Mutex::new(()),
            reload_disabled: AtomicBool::new(false),
        }
    }

    /// Create a new handler instance for `code`
    ///
    /// The static table wins over the dynamic snapshot. An unknown code is
    /// logged and yields `None`.
    pub fn build_instance(&self, code: i32) -> Option<Box<H>> {
        if let Some(registration) = self.statics.get(&code) {
            return Some((registration.factory)());
        }
        let snapshot = self.dynamic.load();
        match snapshot.get(&code) {
            Some(registration) => Some((registration.factory)()),
            None => {
                error!(
                    "Handler registry '{}': no handler for code {} ({:#x})",
                    self.name, code, code
                );
                None
            }
        }
    }

    /// Check whether `code` is registered in either table
    pub fn contains(&self, code: i32) -> bool {
        self.statics.contains_key(&code) || self.dynamic.load().contains_key(&code)
    }

    /// Every registered code, sorted
    pub fn codes(&self) -> Vec<i32> {
        let snapshot = self.dynamic.load();
        let mut codes: Vec<i32> = self
            .statics
            .keys()
            .chain(snapshot.keys().filter(|code| !self.statics.contains_key(code)))
            .copied()
            .collect();
        codes.sort_unstable();
        codes
    }

    /// Replace the dynamic table with `registrations`
    ///
    /// Returns `Ok(false)` without touching the table if another reload is
    /// in progress.
    ///
    /// # Errors
    ///
    /// `QueueGroupError::ReloadDisabled` after [`disable_reload`](Self::disable_reload).
    pub fn reload<I>(&self, registrations: I) -> Result<bool>
    where
        I: IntoIterator<Item = Registration<H>>,
    {
        if self.reload_disabled.load(Ordering::Acquire) {
            error!("Handler registry '{}': reload is disabled", self.name);
            return Err(QueueGroupError::ReloadDisabled);
        }
        let Some(_guard) = self.reload_lock.try_lock() else {
            debug!(
                "Handler registry '{}': reload already in progress, skipped",
                self.name
            );
            return Ok(false);
        };

        self.state
            .store(RegistryState::Loading.as_u8(), Ordering::Release);
        let table = build_table(&self.name, registrations);
        for code in table.keys().filter(|code| self.statics.contains_key(code)) {
            debug!(
                "Handler registry '{}': code {} is shadowed by the static table",
                self.name, code
            );
        }
        let count = table.len();
        self.dynamic.store(Arc::new(table));
        self.state
            .store(RegistryState::Loaded.as_u8(), Ordering::Release);

        debug!(
            "Handler registry '{}' reloaded with {} dynamic handlers",
            self.name, count
        );
        Ok(true)
    }

    /// Make every later reload fail
    pub fn disable_reload(&self) {
        self.reload_disabled.store(true, Ordering::Release);
    }

    /// Check whether reloads are disabled
    pub fn is_reload_disabled(&self) -> bool {
        self.reload_disabled.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> RegistryState {
        RegistryState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Registry name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<H: ?Sized + 'static> fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("name", &self.name)
            .field("static_handlers", &self.statics.len())
            .field("dynamic_handlers", &self.dynamic.load().len())
            .field("state", &self.state())
            .finish()
    }
}

fn build_table<H: ?Sized, I>(name: &str, registrations: I) -> Table<H>
where
    I: IntoIterator<Item = Registration<H>>,
{
    let mut table = HashMap::new();
    for registration in registrations {
        match table.get(&registration.code) {
            Some(existing) => {
                let existing: &Registration<H> = existing;
                error!(
                    "Handler registry '{}': duplicate code {} ({}), keeping '{}' and ignoring '{}'",
                    name, registration.code, registration.code, existing.name, registration.name
                );
            }
            None => {
                table.insert(registration.code, registration);
            }
        }
    }
    table
}
