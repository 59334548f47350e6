use std::collections::HashMap;
use std::sync::Arc;

use super::catalog::CatalogDef;
use super::error::DescriptorError;
use super::model::{ModelDescriptor, ValidationRule};

/// A public resource name bound to a descriptor, optionally scoped to a
/// parent record through `parent_key`.
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    descriptor: Arc<ModelDescriptor>,
    parent_key: Option<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>, descriptor: Arc<ModelDescriptor>, parent_key: Option<String>) -> Self {
        Self { name: name.into(), descriptor, parent_key }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    pub fn parent_key(&self) -> Option<&str> {
        self.parent_key.as_deref()
    }
}

/// Every descriptor known to the process, keyed by name, plus the resource
/// bindings exposed to callers. Built once at startup, then read-only.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<String, Arc<ModelDescriptor>>,
    resources: HashMap<String, Resource>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; it is also exposed as a resource of the same
    /// name with no parent scoping.
    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<Arc<ModelDescriptor>, DescriptorError> {
        let name = descriptor.name().to_string();
        if self.descriptors.contains_key(&name) || self.resources.contains_key(&name) {
            return Err(DescriptorError::DuplicateName(name));
        }
        let descriptor = Arc::new(descriptor);
        self.descriptors.insert(name.clone(), descriptor.clone());
        self.resources.insert(name.clone(), Resource::new(name, descriptor.clone(), None));
        Ok(descriptor)
    }

    pub fn register_resource(&mut self, name: &str, descriptor_name: &str, parent_key: Option<&str>) -> Result<(), DescriptorError> {
        if self.resources.contains_key(name) {
            return Err(DescriptorError::DuplicateName(name.to_string()));
        }
        let descriptor = self.descriptor(descriptor_name)?;
        if let Some(key) = parent_key {
            if !descriptor.has_column(key) {
                return Err(DescriptorError::UndeclaredColumn {
                    table: descriptor.table_name().to_string(),
                    column: key.to_string(),
                    usage: "parent key",
                });
            }
        }
        self.resources.insert(
            name.to_string(),
            Resource::new(name, descriptor, parent_key.map(str::to_string)),
        );
        Ok(())
    }

    pub fn descriptor(&self, name: &str) -> Result<Arc<ModelDescriptor>, DescriptorError> {
        self.descriptors
            .get(name)
            .cloned()
            .ok_or_else(|| DescriptorError::UnknownDescriptor(name.to_string()))
    }

    pub fn resource(&self, name: &str) -> Result<Resource, DescriptorError> {
        self.resources
            .get(name)
            .cloned()
            .ok_or_else(|| DescriptorError::UnknownResource(name.to_string()))
    }

    pub fn resource_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check every cross-descriptor reference.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        for descriptor in self.descriptors.values() {
            for fk in descriptor.foreign_keys() {
                self.descriptor(&fk.target)?;
            }
            for nested in descriptor.nested_tables() {
                let child = self.descriptor(&nested.target)?;
                if !child.has_column(&nested.column) {
                    return Err(DescriptorError::UndeclaredColumn {
                        table: child.table_name().to_string(),
                        column: nested.column.clone(),
                        usage: "nested table",
                    });
                }
            }
            for rule in descriptor.validation_rules() {
                if let ValidationRule::Exists { target, .. } = rule {
                    self.descriptor(target)?;
                }
            }
        }
        Ok(())
    }

    pub fn from_catalog(catalog: CatalogDef) -> Result<Self, DescriptorError> {
        let mut registry = Self::new();
        for def in catalog.descriptors {
            registry.register(def.into_descriptor()?)?;
        }
        for res in catalog.resources {
            registry.register_resource(&res.name, &res.descriptor, res.parent_key.as_deref())?;
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, DescriptorError> {
        let catalog: CatalogDef = serde_yaml::from_str(source)?;
        Self::from_catalog(catalog)
    }
}
