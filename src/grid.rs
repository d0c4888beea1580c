use std::sync::{Arc, PoisonError, RwLock};

use crate::error::LookupError;
use crate::types::ForecastDataset;

#[derive(Debug, Default)]
pub struct ForecastGrid {
    current: RwLock<Option<Arc<ForecastDataset>>>,
}

impl ForecastGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, dataset: Arc<ForecastDataset>) -> Option<Arc<ForecastDataset>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.replace(dataset)
    }

    pub fn current_snapshot(&self) -> Result<Arc<ForecastDataset>, LookupError> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(LookupError::DatasetNotReady)
    }
}
