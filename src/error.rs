use mongodb::bson::{de::Error as BsonDeError, ser::Error as BsonSerError};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonSer(#[from] BsonSerError),
    #[error(transparent)]
    BsonDe(#[from] BsonDeError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid OTP")]
    InvalidCredential,
    #[error("OTP expired")]
    Expired,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Face does not match. Please try again.")]
    FaceMismatch,
    #[error("Voter has already cast a vote")]
    AlreadyVoted,
    #[error("Complete OTP and Face verification first")]
    IncompleteVerification,
    #[error("Candidate not found: {0}")]
    CandidateNotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) | Self::CandidateNotFound(_) => Status::NotFound,
            Self::InvalidCredential
            | Self::Expired
            | Self::InvalidInput(_)
            | Self::FaceMismatch
            | Self::IncompleteVerification => Status::BadRequest,
            Self::AlreadyVoted => Status::Conflict,
            Self::Db(_) | Self::BsonSer(_) | Self::BsonDe(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
        }
    }
}

/// JSON body attached to every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let detail = if status.class() == StatusClass::ServerError {
            error!("{self}");
            // Storage internals stay in the log.
            "Internal server error".to_string()
        } else {
            debug!("Refused request: {self}");
            self.to_string()
        };
        Custom(status, Json(ErrorBody { detail })).respond_to(req)
    }
}
