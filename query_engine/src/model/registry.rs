//! Model registry
//!
//! Explicit map from model name to descriptor, populated at definition time.
//! Builders and the relation engine look related models up here instead of
//! relying on any runtime reflection.

use crate::errors::EngineError;
use crate::model::descriptor::ModelDescriptor;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelDescriptor>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<(), EngineError> {
        if self.models.contains_key(&descriptor.name) {
            return Err(EngineError::Configuration(format!(
                "Model '{}' is already registered",
                descriptor.name
            )));
        }
        self.models
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<ModelDescriptor>, EngineError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model_names(&self) -> Vec<&String> {
        self.models.keys().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ModelRegistry::new();
        registry
            .register(ModelDescriptor::new("User", "users"))
            .unwrap();

        assert!(registry.contains("User"));
        assert_eq!(registry.get("User").unwrap().table, "users");
        assert!(matches!(
            registry.get("Ghost"),
            Err(EngineError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ModelRegistry::new();
        registry
            .register(ModelDescriptor::new("User", "users"))
            .unwrap();
        assert!(registry
            .register(ModelDescriptor::new("User", "users_v2"))
            .is_err());
    }
}
