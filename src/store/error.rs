use crate::entity::Kind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no entity of kind `{kind}` with id `{id}`")]
    NotFound { kind: Kind, id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
