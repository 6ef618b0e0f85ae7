//! HTTP routes
//!
//! Thin warp handlers over [`ApiState`]. Engine calls can wait on a pool lock,
//! so they run on tokio's blocking pool rather than on a runtime worker.

use crate::dto::*;
use crate::error::{handle_rejection, ApiError};
use crate::state::ApiState;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;
use types::{PoolId, UserAddress};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// All routes, with errors rendered as JSON.
///
/// The operator pause/resume routes answer 404 unless `enable_admin` is set.
pub fn routes(
    state: Arc<ApiState>,
    enable_admin: bool,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    let status = warp::path("status")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Arc<ApiState>| warp::reply::json(&state.status()));

    let list_pools = warp::path!("api" / "pools")
        .and(warp::get())
        .and(warp::query::<UserQuery>())
        .and(with_state(state.clone()))
        .and_then(handle_list_pools);

    let get_pool = warp::path!("api" / "pools" / PoolId)
        .and(warp::get())
        .and(warp::query::<UserQuery>())
        .and(with_state(state.clone()))
        .and_then(handle_get_pool);

    let pause = warp::path!("api" / "pools" / PoolId / "pause")
        .and(admin_only(enable_admin))
        .and(warp::post())
        .and(optional_json_body::<PauseBody>())
        .and(with_state(state.clone()))
        .and_then(handle_pause);

    let resume = warp::path!("api" / "pools" / PoolId / "resume")
        .and(admin_only(enable_admin))
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(handle_resume);

    let add_liquidity = post_json("add-liquidity", state.clone(), |state, body| {
        state.add_liquidity(body)
    });
    let remove_liquidity = post_json("remove-liquidity", state.clone(), |state, body| {
        state.remove_liquidity(body)
    });
    let stake = post_json("stake-tokens", state.clone(), |state, body| state.stake(body));
    let unstake = post_json("unstake-tokens", state.clone(), |state, body| {
        state.unstake(body)
    });
    let relock = post_json("relock", state.clone(), |state, body| state.relock(body));
    let claim = post_json("claim-rewards", state.clone(), |state, body| state.claim(body));
    let quote = post_json("quote", state.clone(), |state, body| state.quote(body));
    let swap = post_json("swap", state.clone(), |state, body| state.swap(body));

    let positions = warp::path!("api" / "positions")
        .and(warp::get())
        .and(warp::query::<UserQuery>())
        .and(with_state(state))
        .and_then(handle_positions);

    health
        .or(status)
        .or(list_pools)
        .or(get_pool)
        .or(pause)
        .or(resume)
        .or(add_liquidity)
        .or(remove_liquidity)
        .or(stake)
        .or(unstake)
        .or(relock)
        .or(claim)
        .or(quote)
        .or(swap)
        .or(positions)
        .with(warp::trace::request())
        .recover(handle_rejection)
}

fn with_state(
    state: Arc<ApiState>,
) -> impl Filter<Extract = (Arc<ApiState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn admin_only(enabled: bool) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::any()
        .and_then(move || async move {
            if enabled {
                Ok(())
            } else {
                Err(warp::reject::not_found())
            }
        })
        .untuple_one()
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn optional_json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Default + Send + 'static,
{
    warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::bytes())
        .and_then(|bytes: warp::hyper::body::Bytes| async move {
            if bytes.is_empty() {
                return Ok(T::default());
            }
            serde_json::from_slice(&bytes)
                .map_err(|e| Rejection::from(ApiError::BadRequest(e.to_string())))
        })
}

/// `POST /api/<name>` with a JSON body handled by a state method
fn post_json<B, V, F>(
    name: &'static str,
    state: Arc<ApiState>,
    handler: F,
) -> impl Filter<Extract = (warp::reply::Json,), Error = Rejection> + Clone
where
    B: serde::de::DeserializeOwned + Send + 'static,
    V: serde::Serialize + Send + 'static,
    F: Fn(&ApiState, B) -> crate::error::Result<V> + Clone + Send + Sync + 'static,
{
    warp::path("api")
        .and(warp::path(name))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<B>())
        .and(with_state(state))
        .and_then(move |body: B, state: Arc<ApiState>| {
            let handler = handler.clone();
            async move {
                debug!(route = name, "request");
                let view = run(state, move |state| handler(state, body)).await?;
                Ok::<_, Rejection>(warp::reply::json(&view))
            }
        })
}

/// Run a state call on the blocking pool
async fn run<T, F>(state: Arc<ApiState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ApiState) -> crate::error::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

async fn handle_list_pools(query: UserQuery, state: Arc<ApiState>) -> Result<impl Reply, Rejection> {
    let pools = run(state, move |state| state.list_pools(query.user.as_ref())).await?;
    Ok(warp::reply::json(&pools))
}

async fn handle_get_pool(
    pool_id: PoolId,
    query: UserQuery,
    state: Arc<ApiState>,
) -> Result<impl Reply, Rejection> {
    let pool = run(state, move |state| state.pool_view(pool_id, query.user.as_ref())).await?;
    Ok(warp::reply::json(&pool))
}

async fn handle_pause(
    pool_id: PoolId,
    body: PauseBody,
    state: Arc<ApiState>,
) -> Result<impl Reply, Rejection> {
    let view = run(state, move |state| {
        state.pause_pool(pool_id, body.reason.as_deref())
    })
    .await?;
    Ok(warp::reply::json(&view))
}

async fn handle_resume(pool_id: PoolId, state: Arc<ApiState>) -> Result<impl Reply, Rejection> {
    let view = run(state, move |state| state.resume_pool(pool_id)).await?;
    Ok(warp::reply::json(&view))
}

async fn handle_positions(query: UserQuery, state: Arc<ApiState>) -> Result<impl Reply, Rejection> {
    let user: UserAddress = query
        .user
        .ok_or_else(|| ApiError::BadRequest("missing 'user' query parameter".to_string()))?;
    let positions = run(state, move |state| state.positions(&user)).await?;
    Ok(warp::reply::json(&positions))
}
