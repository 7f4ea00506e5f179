//! Handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::JobHandler;

/// Task-name keyed set of job handlers.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its task name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) -> &mut Self {
        self.handlers.insert(handler.task_name().to_string(), handler);
        self
    }

    /// Looks up the handler for a task name.
    pub fn get(&self, task_name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(task_name).cloned()
    }

    /// Returns the registered task names.
    pub fn task_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("tasks", &self.task_names())
            .finish()
    }
}
