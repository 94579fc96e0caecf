/// Canvas layer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Persisted elements.
    Content,
    /// Selection box and transform handles.
    Mask,
    /// In-progress drawing gesture.
    Provisional,
}

impl LayerKind {
    /// All layers in composition order, bottom first.
    pub fn all_layers() -> &'static [LayerKind] {
        &[LayerKind::Content, LayerKind::Provisional, LayerKind::Mask]
    }
}

/// Layer queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// Canvas matches the model.
    Valid,
    /// Queue must be rebuilt and run.
    Invalid,
}

/// Tracks which layers need their task queue rebuilt.
///
/// Every layer starts invalid so the first frame paints everything.
#[derive(Debug, Clone)]
pub struct LayerInvalidation {
    content_valid: bool,
    mask_valid: bool,
    provisional_valid: bool,
}

impl Default for LayerInvalidation {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerInvalidation {
    pub fn new() -> Self {
        Self {
            content_valid: false,
            mask_valid: false,
            provisional_valid: false,
        }
    }

    fn flag_mut(&mut self, layer: LayerKind) -> &mut bool {
        match layer {
            LayerKind::Content => &mut self.content_valid,
            LayerKind::Mask => &mut self.mask_valid,
            LayerKind::Provisional => &mut self.provisional_valid,
        }
    }

    pub fn state(&self, layer: LayerKind) -> LayerState {
        let valid = match layer {
            LayerKind::Content => self.content_valid,
            LayerKind::Mask => self.mask_valid,
            LayerKind::Provisional => self.provisional_valid,
        };
        if valid {
            LayerState::Valid
        } else {
            LayerState::Invalid
        }
    }

    pub fn is_valid(&self, layer: LayerKind) -> bool {
        self.state(layer) == LayerState::Valid
    }

    pub fn invalidate(&mut self, layer: LayerKind) {
        *self.flag_mut(layer) = false;
    }

    pub fn invalidate_all(&mut self) {
        for layer in LayerKind::all_layers() {
            self.invalidate(*layer);
        }
    }

    pub fn validate(&mut self, layer: LayerKind) {
        *self.flag_mut(layer) = true;
    }

    /// Invalid layers in composition order.
    pub fn invalid_layers(&self) -> Vec<LayerKind> {
        LayerKind::all_layers()
            .iter()
            .filter(|&&layer| !self.is_valid(layer))
            .copied()
            .collect()
    }
}
