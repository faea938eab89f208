use thiserror::Error;

/// Expected, non-fatal failure kinds surfaced by the physics core's
/// configuration-time operations (layer management, body lookups).
///
/// Numerical degeneracies encountered mid-solve (zero-length tangents,
/// vanishing effective mass) are never reported here — they're handled
/// in situ with a fallback and never surface to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("layer name \"NONE\" is reserved and cannot be added")]
    ReservedLayerName,

    #[error("layer \"{0}\" already exists")]
    DuplicateLayer(String),

    #[error("layer table is full (max {max} layers)", max = super::layers::MAX_LAYERS)]
    LayerCapExceeded,

    #[error("unknown layer id {0}")]
    UnknownLayer(u8),

    #[error("unknown body handle {index}:{generation}", index = .0.index, generation = .0.generation)]
    UnknownBody(crate::physics::types::BodyHandle),

    #[error("degenerate shape: {0}")]
    DegenerateShape(&'static str),
}
