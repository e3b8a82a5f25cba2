//! Named endpoint registry
//!
//! Extra platform endpoints are added to a client as named async closures
//! receiving the client and a JSON argument. Names are checked when they are
//! registered and again when a set is merged into a client, so a collision
//! fails at startup and never silently replaces a method.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use wecom_auth::BoxFuture;

use crate::error::{Error, Result};

/// An endpoint wrapper: borrows the client for the duration of the call.
pub type EndpointFn<C> =
    Arc<dyn for<'a> Fn(&'a C, Value) -> BoxFuture<'a, Result<Value>> + Send + Sync>;

/// A set of endpoint wrappers for client type `C`.
pub struct Endpoints<C> {
    methods: BTreeMap<String, EndpointFn<C>>,
}

impl<C> Endpoints<C> {
    pub fn new() -> Self {
        Self {
            methods: BTreeMap::new(),
        }
    }

    /// Add an endpoint. Fails if the name is already registered here.
    pub fn register<F>(&mut self, name: impl Into<String>, endpoint: F) -> Result<&mut Self>
    where
        F: for<'a> Fn(&'a C, Value) -> BoxFuture<'a, Result<Value>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.methods.contains_key(&name) {
            return Err(Error::DuplicateMethod(name));
        }
        self.methods.insert(name, Arc::new(endpoint));
        Ok(self)
    }

    /// Move every endpoint of `other` into this set.
    ///
    /// All names are checked against `reserved` and the existing entries
    /// before anything is inserted; on a collision nothing changes.
    pub fn merge(&mut self, other: Endpoints<C>, reserved: &[&str]) -> Result<()> {
        if let Some(name) = other
            .methods
            .keys()
            .find(|name| reserved.contains(&name.as_str()) || self.methods.contains_key(*name))
        {
            return Err(Error::DuplicateMethod(name.clone()));
        }
        self.methods.extend(other.methods);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Invoke the endpoint registered as `name`.
    pub async fn call(&self, client: &C, name: &str, args: Value) -> Result<Value> {
        let endpoint = self
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownMethod(name.to_string()))?;
        endpoint(client, args).await
    }
}

impl<C> Default for Endpoints<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for Endpoints<C> {
    fn clone(&self) -> Self {
        Self {
            methods: self.methods.clone(),
        }
    }
}

impl<C> fmt::Debug for Endpoints<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}
