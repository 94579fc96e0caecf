/// Rotation handle angle offset in degrees.
pub const DEFAULT_ROTATION_OFFSET_DEG: f64 = 45.0;

// Handle defaults
pub fn default_rotation_enabled() -> bool {
    true
}

pub fn default_rotation_offset_deg() -> f64 {
    DEFAULT_ROTATION_OFFSET_DEG
}

pub fn default_handle_size() -> f64 {
    8.0
}

/// Pixels around an edge that still count as hitting the edge handle.
pub fn default_edge_tolerance() -> f64 {
    4.0
}

/// Pixels around a path stroke that still count as hitting the element.
pub fn default_hit_tolerance() -> f64 {
    5.0
}

// History defaults
pub fn default_history_limit() -> usize {
    100
}

// Mask defaults
pub fn default_mask_color() -> (u8, u8, u8) {
    (41, 128, 237)
}

pub fn default_log_debug() -> bool {
    false
}
