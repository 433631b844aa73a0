use super::{ActivationLibrary, ActivationRef};
use crate::random::RandomSource;
use std::sync::Arc;

/// Capability handing out activations for new or mutated nodes.
pub trait ActivationProvider: Send + Sync {
    fn get_activation(&self, random: &mut RandomSource) -> Option<ActivationRef>;
}

/// Always returns the same activation.
#[derive(Debug, Clone)]
pub struct DefaultActivationProvider {
    activation: ActivationRef,
}

impl DefaultActivationProvider {
    pub fn new(activation: ActivationRef) -> Self {
        DefaultActivationProvider { activation }
    }
}

impl ActivationProvider for DefaultActivationProvider {
    fn get_activation(&self, _: &mut RandomSource) -> Option<ActivationRef> {
        Some(Arc::clone(&self.activation))
    }
}

/// Returns a uniformly random activation from a library.
#[derive(Debug)]
pub struct RandomActivationProvider {
    library: Arc<ActivationLibrary>,
}

impl RandomActivationProvider {
    pub fn new(library: Arc<ActivationLibrary>) -> Self {
        RandomActivationProvider { library }
    }

    pub fn library(&self) -> &ActivationLibrary {
        &self.library
    }
}

impl ActivationProvider for RandomActivationProvider {
    fn get_activation(&self, random: &mut RandomSource) -> Option<ActivationRef> {
        let ids = self.library.ids();
        if ids.is_empty() {
            return None;
        }

        self.library.get(*random.choose(&ids))
    }
}
