use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

pub type PropertyValue = Arc<dyn Any + Send + Sync>;

/// Type-keyed property bag a listener exposes to its callers and outer layers.
#[derive(Clone, Default)]
pub struct Properties {
    values: HashMap<TypeId, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.insert(value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get_any(&self, type_id: TypeId) -> Option<PropertyValue> {
        self.values.get(&type_id).cloned()
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        downcast(self.get_any(TypeId::of::<T>()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Properties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Properties").field("len", &self.len()).finish()
    }
}

pub(crate) fn downcast<T: Any + Send + Sync>(value: Option<PropertyValue>) -> Option<Arc<T>> {
    value.and_then(|v| v.downcast::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct MaxConnections(u32);

    #[test]
    fn test_typed_lookup() {
        let props = Properties::new().with(MaxConnections(8)).with(String::from("tcp"));
        assert_eq!(*props.get::<MaxConnections>().unwrap(), MaxConnections(8));
        assert_eq!(props.get::<String>().unwrap().as_str(), "tcp");
        assert!(props.get::<u64>().is_none());
    }

    #[test]
    fn test_insert_replaces_same_type() {
        let mut props = Properties::new();
        props.insert(MaxConnections(1));
        props.insert(MaxConnections(2));
        assert_eq!(props.len(), 1);
        assert_eq!(props.get::<MaxConnections>().unwrap().0, 2);
    }
}
