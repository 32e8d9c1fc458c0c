//! Single-writer access to an engine shared across threads.
//!
//! Mutations hold the write lock for the whole operation, recalculation
//! included, so readers never observe a half-updated graph. Reads share
//! the lock with each other.
//!
//! Listeners run after the lock is released, so they may query or mutate
//! the same engine. Events are queued in revision order and delivered by
//! whichever thread is draining the queue.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rustc_hash::FxHashSet;

use crate::address::Address;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventCallback};
use crate::formula::value::RawValue;
use crate::recalc::CellChange;

type Listener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

#[derive(Default)]
struct Dispatch {
    queue: VecDeque<EngineEvent>,
    draining: bool,
}

#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<Engine>>,
    listeners: Arc<Mutex<Vec<Listener>>>,
    dispatch: Arc<Mutex<Dispatch>>,
}

impl Default for SharedEngine {
    fn default() -> Self {
        Self::new(Engine::new())
    }
}

impl SharedEngine {
    /// Wrap `engine`. Listeners already subscribed on it move to the shared
    /// dispatcher.
    pub fn new(mut engine: Engine) -> Self {
        let listeners = engine
            .defer_events()
            .into_iter()
            .map(Listener::from)
            .collect();
        Self {
            inner: Arc::new(RwLock::new(engine)),
            listeners: Arc::new(Mutex::new(listeners)),
            dispatch: Arc::new(Mutex::new(Dispatch::default())),
        }
    }

    pub fn set_value(&self, addr: Address, value: RawValue) -> Result<Vec<CellChange>, EngineError> {
        self.update(|engine| engine.set_value(addr, value))
    }

    pub fn set_formula(&self, addr: Address, source: &str) -> Result<Vec<CellChange>, EngineError> {
        self.update(|engine| engine.set_formula(addr, source))
    }

    pub fn set_input(&self, addr: Address, input: &str) -> Result<Vec<CellChange>, EngineError> {
        self.update(|engine| engine.set_input(addr, input))
    }

    pub fn clear(&self, addr: Address) -> Result<Vec<CellChange>, EngineError> {
        self.update(|engine| engine.clear(addr))
    }

    pub fn undo(&self) -> Result<Vec<CellChange>, EngineError> {
        self.update(Engine::undo)
    }

    pub fn redo(&self) -> Result<Vec<CellChange>, EngineError> {
        self.update(Engine::redo)
    }

    pub fn get_value(&self, addr: Address) -> RawValue {
        self.inner.read().get_value(addr)
    }

    pub fn get_formula(&self, addr: Address) -> Option<String> {
        self.inner.read().get_formula(addr)
    }

    pub fn dependents(&self, addr: Address) -> FxHashSet<Address> {
        self.inner.read().dependents(addr)
    }

    pub fn revision(&self) -> u64 {
        self.inner.read().revision()
    }

    pub fn subscribe(&self, listener: EventCallback) {
        self.listeners.lock().push(Listener::from(listener));
    }

    /// Hold the read lock across several queries, e.g. to serialize a
    /// consistent snapshot. Mutating through a listener while holding
    /// this guard deadlocks.
    pub fn read(&self) -> RwLockReadGuard<'_, Engine> {
        self.inner.read()
    }

    /// Run several mutations under one write lock. Their events are
    /// delivered once the lock is released.
    pub fn update<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let result = {
            let mut engine = self.inner.write();
            let result = f(&mut engine);
            let events = engine.take_events();
            if !events.is_empty() {
                self.dispatch.lock().queue.extend(events);
            }
            result
        };
        self.deliver();
        result
    }

    fn deliver(&self) {
        {
            let mut dispatch = self.dispatch.lock();
            // Another call up the stack, or another thread, drains for us
            if dispatch.draining {
                return;
            }
            dispatch.draining = true;
        }
        loop {
            let event = {
                let mut dispatch = self.dispatch.lock();
                match dispatch.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        dispatch.draining = false;
                        return;
                    }
                }
            };
            let listeners = self.listeners.lock().clone();
            for listener in &listeners {
                listener(&event);
            }
        }
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedEngine").field(&*self.inner.read()).finish()
    }
}
