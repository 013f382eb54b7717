use crate::{BuildError, ILayer, LayerRegistry};
use std::rc::Rc;

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, layer: Rc<dyn ILayer>) {
        self.layers.insert(name.to_string(), layer);
    }

    pub fn get(&self, name: &str) -> Option<&Rc<dyn ILayer>> {
        self.layers.get(name)
    }

    /// Resolve a layer by name for [ParseOptions](crate::ParseOptions);
    /// an unknown name is a construction error, not a parse error.
    pub fn require(&self, name: &str) -> Result<Rc<dyn ILayer>, BuildError> {
        self.layers.get(name).cloned().ok_or_else(|| {
            BuildError::new(
                "layer".to_string(),
                format!("layer '{}' is not registered", name),
            )
        })
    }
}
