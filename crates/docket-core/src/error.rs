use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    Category,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Task => f.write_str("task"),
            EntityKind::Category => f.write_str("category"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("{0} cannot be blank")]
    Validation(&'static str),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("invalid date/time input: {0}")]
    Parse(String),

    #[error("month out of range: {0}")]
    InvalidMonth(u32),
}

impl CoreError {
    pub fn task_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::Task,
            id,
        }
    }

    pub fn category_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::Category,
            id,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
