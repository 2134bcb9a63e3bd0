use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(err) = err.find::<ApiErrorCode>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(err.clone(), err.to_string()));
        Ok(warp::reply::with_status(json, err.status()))
    } else if err.is_not_found() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::NotFound,
            ApiErrorCode::NotFound.to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InvalidInput,
            e.to_string(),
        ));
        Ok(warp::reply::with_status(json, StatusCode::BAD_REQUEST))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InvalidInput,
            "Request body too large",
        ));
        Ok(warp::reply::with_status(json, StatusCode::PAYLOAD_TOO_LARGE))
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InvalidInput,
            "Content-Length required",
        ));
        Ok(warp::reply::with_status(json, StatusCode::LENGTH_REQUIRED))
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::InvalidToken,
            "Missing bearer token",
        ));
        Ok(warp::reply::with_status(json, StatusCode::UNAUTHORIZED))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        let json = warp::reply::json(&ApiResponse::<()>::err(
            ApiErrorCode::NotFound,
            "Method not allowed",
        ));
        Ok(warp::reply::with_status(json, StatusCode::METHOD_NOT_ALLOWED))
    } else {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid login or password")]
    InvalidCredentials,
    #[error("Login already taken")]
    LoginTaken,
    #[error("Invalid input")]
    InvalidInput,
    #[error("Not found")]
    NotFound,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Session has expired or was revoked")]
    SessionExpired,
    #[error("Refresh token was already used")]
    RefreshReuseDetected,
    #[error("Service temporarily unavailable")]
    Unavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        error!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn unavailable<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Store unavailable: {}", error);
        ApiErrorCode::Unavailable
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::SessionExpired
            | ApiErrorCode::RefreshReuseDetected => StatusCode::UNAUTHORIZED,
            ApiErrorCode::LoginTaken => StatusCode::CONFLICT,
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<TokenError> for ApiErrorCode {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::InvalidSignature | TokenError::MalformedClaims(_) => {
                ApiErrorCode::InvalidToken
            }
            TokenError::Expired => ApiErrorCode::TokenExpired,
            TokenError::SessionNotFound | TokenError::RefreshExpiredOrUnknown => {
                ApiErrorCode::SessionExpired
            }
            TokenError::RefreshReuseDetected => ApiErrorCode::RefreshReuseDetected,
            TokenError::StoreWrite(e) | TokenError::StoreRead(e) => ApiErrorCode::unavailable(e),
            TokenError::Signing(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::LoginTaken => ApiErrorCode::LoginTaken,
            AuthError::UserNotFound => ApiErrorCode::NotFound,
            AuthError::InvalidInput(_) => ApiErrorCode::InvalidInput,
            AuthError::Token(e) => e.into(),
            AuthError::Store(e) => ApiErrorCode::unavailable(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<PaymentError> for ApiErrorCode {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::InvalidAmount => ApiErrorCode::InvalidInput,
            PaymentError::Store(e) => ApiErrorCode::unavailable(e),
        }
    }
}
