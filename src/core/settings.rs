//! Configuration store.
//!
//! Values are either literal JSON or lazy: a resolver that runs on first
//! access and whose result is memoized for the lifetime of the store. Lazy
//! values are how `bin/docker` avoids probing the host until something needs
//! the binary.

use crate::context::Context;
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::cell::{Cell, OnceCell};
use std::collections::BTreeMap;

/// Resolver for a lazy setting. Receives the context so it can run commands.
pub type Resolver = Box<dyn Fn(&Context) -> Result<Value>>;

pub enum Setting {
    Value(Value),
    Lazy(LazyValue),
}

pub struct LazyValue {
    resolver: Resolver,
    cache: OnceCell<Value>,
    resolving: Cell<bool>,
}

impl LazyValue {
    fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            cache: OnceCell::new(),
            resolving: Cell::new(false),
        }
    }

    /// Cached value, if the resolver already ran successfully.
    pub fn cached(&self) -> Option<&Value> {
        self.cache.get()
    }

    fn resolve(&self, key: &str, ctx: &Context) -> Result<Value> {
        if let Some(value) = self.cache.get() {
            return Ok(value.clone());
        }

        if self.resolving.replace(true) {
            return Err(Error::config_invalid_value(
                key,
                None,
                "Lazy value depends on itself",
            ));
        }
        let result = (self.resolver)(ctx);
        self.resolving.set(false);

        // Failed resolutions are not cached; the next access retries.
        let value = result?;
        Ok(self.cache.get_or_init(|| value).clone())
    }
}

#[derive(Default)]
pub struct Settings {
    entries: BTreeMap<String, Setting>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from literal values (e.g. the `settings` map of dockyard.json).
    pub fn from_map(values: &Map<String, Value>) -> Self {
        let mut settings = Self::new();
        for (key, value) in values {
            settings.set(key.clone(), value.clone());
        }
        settings
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), Setting::Value(value));
    }

    pub fn set_lazy<F>(&mut self, key: impl Into<String>, resolver: F)
    where
        F: Fn(&Context) -> Result<Value> + 'static,
    {
        self.entries
            .insert(key.into(), Setting::Lazy(LazyValue::new(Box::new(resolver))));
    }

    /// Resolve a key, running its lazy resolver on first access.
    pub fn resolve(&self, key: &str, ctx: &Context) -> Result<Option<Value>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Setting::Value(value)) => Ok(Some(value.clone())),
            Some(Setting::Lazy(lazy)) => lazy.resolve(key, ctx).map(Some),
        }
    }

    /// Snapshot of literal values and already-resolved lazy values.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, setting) in &self.entries {
            let value = match setting {
                Setting::Value(value) => value.clone(),
                Setting::Lazy(lazy) => lazy.cached().cloned().unwrap_or(Value::Null),
            };
            map.insert(key.clone(), value);
        }
        map
    }
}
