use thiserror::Error;

/// What kind of entity an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Layer,
    Sprite,
    Tile,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Layer => "layer",
            Self::Sprite => "sprite",
            Self::Tile => "tile",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the scene API.
///
/// None of them aborts composition: an entity that fails to allocate is
/// disabled and simply stops drawing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("out of memory while allocating {what}")]
    OutOfMemory { what: &'static str },

    #[error("{kind} index {index} is out of range")]
    InvalidIndex { kind: EntityKind, index: usize },

    #[error("invalid {what}: {value}")]
    InvalidSize { what: &'static str, value: u16 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) const fn layer(index: usize) -> Self {
        Self::InvalidIndex {
            kind: EntityKind::Layer,
            index,
        }
    }

    pub(crate) const fn sprite(index: usize) -> Self {
        Self::InvalidIndex {
            kind: EntityKind::Sprite,
            index,
        }
    }
}
