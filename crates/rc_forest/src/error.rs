use thiserror::Error;

/// Domain errors surfaced by the forest facade.
///
/// Scheduling calls validate before mutating anything, so a failed call
/// leaves the current batch intact and still committable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ForestError {
    #[error("{op}: vertex {vertex} out of range for forest of {len} vertices")]
    VertexOutOfRange {
        op: &'static str,
        vertex: usize,
        len: usize,
    },

    #[error("{op}: vertex {vertex} is a root and carries no parent edge")]
    EdgeInfoOfRoot { op: &'static str, vertex: usize },

    #[error("scheduled_detach: vertex {vertex} is already a root")]
    AlreadyRoot { vertex: usize },

    #[error("scheduled_attach: child vertex {child} is not a root")]
    ChildNotRoot { child: usize },

    #[error("scheduled_attach: vertices {parent} and {child} are already connected")]
    WouldCreateCycle { parent: usize, child: usize },

    #[error("get_path: vertices {first} and {second} are in different trees")]
    Disconnected { first: usize, second: usize },
}

pub type Result<T> = std::result::Result<T, ForestError>;
