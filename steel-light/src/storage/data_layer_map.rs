use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::data_layer::DataLayer;

/// One generation of a layer's section data.
///
/// Cloning is shallow: layers are shared until one side writes to them.
#[derive(Debug, Clone, Default)]
pub struct DataLayerStorageMap<C> {
    layers: FxHashMap<i64, Arc<DataLayer>>,
    pub(crate) columns: C,
}

impl<C> DataLayerStorageMap<C> {
    #[must_use]
    pub fn layer(&self, section: i64) -> Option<&DataLayer> {
        self.layers.get(&section).map(Arc::as_ref)
    }

    #[must_use]
    pub fn has_layer(&self, section: i64) -> bool {
        self.layers.contains_key(&section)
    }

    pub(crate) fn layer_arc(&self, section: i64) -> Option<&Arc<DataLayer>> {
        self.layers.get(&section)
    }

    /// Write access, copying the layer first if another generation still shares it.
    pub(crate) fn layer_mut(&mut self, section: i64) -> Option<&mut DataLayer> {
        self.layers.get_mut(&section).map(Arc::make_mut)
    }

    pub(crate) fn set_layer(&mut self, section: i64, layer: Arc<DataLayer>) {
        self.layers.insert(section, layer);
    }

    pub(crate) fn remove_layer(&mut self, section: i64) -> Option<Arc<DataLayer>> {
        self.layers.remove(&section)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer-specific per-column data.
    #[must_use]
    pub fn columns(&self) -> &C {
        &self.columns
    }
}
