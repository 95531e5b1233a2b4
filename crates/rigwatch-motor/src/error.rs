use thiserror::Error;

pub type MotorResult<T> = Result<T, MotorError>;

#[derive(Debug, Error)]
pub enum MotorError {
    /// The last move did not finish cleanly; the position must be re-zeroed.
    #[error("motor position is dirty, zero the position before moving")]
    DirtyPosition,

    #[error("another move is in progress")]
    MoveInFlight,

    #[error("motor is disengaged")]
    Disengaged,

    #[error("failed to persist motor position: {0}")]
    Persist(String),
}
