// Process-wide registry mapping task types to their processors.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::database::models::TaskType;

use super::processors::TaskProcessor;

#[derive(Default)]
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<TaskType, Arc<dyn TaskProcessor>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, processor: Arc<dyn TaskProcessor>) {
        let task_type = processor.task_type();
        if self
            .processors
            .write()
            .insert(task_type, processor)
            .is_some()
        {
            tracing::warn!("Processor for '{}' registered twice", task_type);
        }
    }

    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskProcessor>> {
        self.processors.read().get(&task_type).cloned()
    }

    /// All processors in a stable order.
    pub fn all(&self) -> Vec<Arc<dyn TaskProcessor>> {
        let mut processors: Vec<Arc<dyn TaskProcessor>> =
            self.processors.read().values().cloned().collect();
        processors.sort_by_key(|p| p.task_type().as_str());
        processors
    }
}
