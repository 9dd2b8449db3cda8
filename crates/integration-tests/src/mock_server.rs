//! Mock cart HTTP server.
//!
//! Serves the cart API on `127.0.0.1:<ephemeral>` with axum, keeping one
//! cart in memory. Requests must carry `Authorization: Bearer <token>`;
//! every `x-request-id` seen is recorded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tokio::net::TcpListener;
use url::Url;

use cartsync_client::remote::wire::{CartPayload, REQUEST_ID_HEADER, SetQuantityRequest};
use cartsync_core::{Cart, LineItem, ProductRef};

#[derive(Debug, Default)]
struct ServerState {
    token: String,
    cart: Mutex<Cart>,
    forced_status: Mutex<Option<StatusCode>>,
    request_ids: Mutex<Vec<String>>,
}

type SharedState = Arc<ServerState>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running mock server.
#[derive(Debug, Clone)]
pub struct MockCartServer {
    base_url: Url,
    state: SharedState,
}

impl MockCartServer {
    /// Start a server accepting `token`, mounted at `{base}/api`.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start(token: &str) -> std::io::Result<Self> {
        let state = Arc::new(ServerState {
            token: token.to_string(),
            ..ServerState::default()
        });

        let app = Router::new().nest("/api", routes()).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock cart server stopped");
            }
        });

        let base_url = Url::parse(&format!("http://{addr}/api"))
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(Self { base_url, state })
    }

    /// Root URL to configure `HttpRemoteCart` with.
    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Snapshot of the server cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        lock(&self.state.cart).clone()
    }

    /// Replace the server cart.
    pub fn set_cart(&self, cart: Cart) {
        *lock(&self.state.cart) = cart;
    }

    /// Answer every request with `status` until cleared with `None`.
    pub fn force_status(&self, status: Option<StatusCode>) {
        *lock(&self.state.forced_status) = status;
    }

    /// Request IDs received so far, in order.
    #[must_use]
    pub fn request_ids(&self) -> Vec<String> {
        lock(&self.state.request_ids).clone()
    }
}

fn routes() -> Router<SharedState> {
    Router::new()
        .route("/cart", get(fetch_cart).delete(clear_cart))
        .route("/cart/lines", post(add_line))
        .route(
            "/cart/lines/{product_ref}",
            put(set_quantity).delete(remove_line),
        )
}

/// Record the request ID, then check forced failures and the bearer token.
fn admit(state: &ServerState, headers: &HeaderMap) -> Result<(), Response> {
    if let Some(id) = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        lock(&state.request_ids).push(id.to_string());
    }

    if let Some(status) = *lock(&state.forced_status) {
        return Err((status, "forced failure").into_response());
    }

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.token);
    if authorized {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED.into_response())
    }
}

fn parse_ref(raw: &str) -> Result<ProductRef, Response> {
    ProductRef::parse(raw).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())
}

fn payload(cart: &Cart) -> Json<CartPayload> {
    Json(CartPayload {
        lines: cart.clone(),
    })
}

async fn fetch_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<CartPayload>, Response> {
    admit(&state, &headers)?;
    Ok(payload(&lock(&state.cart)))
}

async fn add_line(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(line): Json<LineItem>,
) -> Result<Json<CartPayload>, Response> {
    admit(&state, &headers)?;
    let mut cart = lock(&state.cart);
    cart.add(line)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response())?;
    Ok(payload(&cart))
}

async fn set_quantity(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(product_ref): Path<String>,
    Json(body): Json<SetQuantityRequest>,
) -> Result<Json<CartPayload>, Response> {
    admit(&state, &headers)?;
    let product_ref = parse_ref(&product_ref)?;
    let mut cart = lock(&state.cart);
    cart.set_quantity(&product_ref, body.quantity)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()).into_response())?;
    Ok(payload(&cart))
}

async fn remove_line(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(product_ref): Path<String>,
) -> Result<Json<CartPayload>, Response> {
    admit(&state, &headers)?;
    let product_ref = parse_ref(&product_ref)?;
    let mut cart = lock(&state.cart);
    if cart.remove(&product_ref).is_none() {
        return Err((StatusCode::NOT_FOUND, "line not in cart").into_response());
    }
    Ok(payload(&cart))
}

async fn clear_cart(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<StatusCode, Response> {
    admit(&state, &headers)?;
    lock(&state.cart).clear();
    Ok(StatusCode::NO_CONTENT)
}
