use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

/// Largest JSON body accepted by any route.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let signup = warp::post()
        .and(warp::path("users"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::signup);

    let list_users = warp::get()
        .and(warp::path("users"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::list_users);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::me);

    let update_me = warp::patch()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(json_body())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then(handler::update_me);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(optional_json_body())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let payments = warp::post()
        .and(warp::path("payments"))
        .and(warp::path::end())
        .and(json_body())
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.payment_service.clone()))
        .and_then(handler::create_payment);

    signup
        .or(list_users)
        .or(login)
        .or(me)
        .or(update_me)
        .or(logout)
        .or(refresh)
        .or(payments)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Like `json_body`, but a request without a body yields `T::default()`.
/// A body that is present must still be valid JSON.
fn optional_json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Default + Send + 'static,
{
    let absent = warp::header::optional::<u64>(http::header::CONTENT_LENGTH.as_str()).and_then(
        |length: Option<u64>| async move {
            match length {
                None | Some(0) => Ok(T::default()),
                Some(_) => Err(reject::not_found()),
            }
        },
    );
    json_body().or(absent).unify()
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (Principal,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |token: String| {
        let auth_service = auth_service.clone();
        async move {
            if let Some(token) = token.strip_prefix("Bearer ") {
                let principal = auth_service
                    .verify_token(token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok(principal)
            } else {
                Err(reject::custom(ApiErrorCode::InvalidToken))
            }
        }
    })
}
