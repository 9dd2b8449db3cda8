//! Integration tests for the HTTP remote cart against a mock server.
//!
//! Each test starts its own axum server on an ephemeral port, so tests can
//! run in parallel.

use std::time::Duration;

use axum::http::StatusCode;

use cartsync_client::{
    CartService, Credential, HttpRemoteCart, LocalCartStore, MemoryStorage, RemoteCartStore,
    RemoteConfig, RemoteError, SyncPhase,
};
use cartsync_core::{Cart, Quantity};
use cartsync_integration_tests::fixtures::{
    catalog_item, line, local_store, product, quantities, CART_KEY, REMOTE_TIMEOUT,
};
use cartsync_integration_tests::mock_server::MockCartServer;

const TOKEN: &str = "http-customer-token";

fn pairs(expected: &[(&str, u32)]) -> Vec<(String, u32)> {
    expected.iter().map(|(r, q)| ((*r).to_string(), *q)).collect()
}

async fn setup() -> (MockCartServer, HttpRemoteCart) {
    let server = MockCartServer::start(TOKEN).await.unwrap();
    let client = HttpRemoteCart::new(&RemoteConfig {
        base_url: server.base_url(),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    (server, client)
}

fn credential() -> Credential {
    Credential::new(TOKEN)
}

// =============================================================================
// Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_returns_server_cart() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("A", 2), line("B", 1)]));

    let cart = client.fetch(&credential()).await.unwrap();

    assert_eq!(quantities(&cart), pairs(&[("A", 2), ("B", 1)]));
    assert_eq!(cart.lines()[0].unit_price, line("A", 2).unit_price);
}

#[tokio::test]
async fn test_fetch_accepts_quantity_above_customer_limit() {
    let (server, client) = setup().await;
    let mut bulk = line("A", 1);
    bulk.quantity = Quantity::try_from(20_000).unwrap();
    server.set_cart(Cart::from_lines([bulk]));

    let cart = client.fetch(&credential()).await.unwrap();

    assert_eq!(quantities(&cart), pairs(&[("A", 20_000)]));
}

#[tokio::test]
async fn test_add_line_past_limit_is_rejected() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("A", Quantity::MAX)]));

    let err = client.add_line(&credential(), &line("A", 1)).await.unwrap_err();

    assert!(matches!(err, RemoteError::Rejected { status: 422, .. }), "got {err:?}");
    assert_eq!(quantities(&server.cart()), pairs(&[("A", Quantity::MAX)]));
}

#[tokio::test]
async fn test_add_line_increments_existing() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("A", 2)]));

    client.add_line(&credential(), &line("A", 3)).await.unwrap();
    let cart = client.add_line(&credential(), &line("B", 1)).await.unwrap();
    assert_eq!(quantities(&cart), pairs(&[("A", 5), ("B", 1)]));
    assert_eq!(server.cart(), cart);
}

#[tokio::test]
async fn test_set_quantity_and_remove_line() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("A", 2), line("B", 1)]));

    let cart = client
        .set_quantity(&credential(), &product("A"), Quantity::new(7).unwrap())
        .await
        .unwrap();
    assert_eq!(quantities(&cart), pairs(&[("A", 7), ("B", 1)]));

    let cart = client
        .remove_line(&credential(), &product("A"))
        .await
        .unwrap();
    assert_eq!(quantities(&cart), pairs(&[("B", 1)]));
}

#[tokio::test]
async fn test_remove_missing_line_is_noop() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("B", 1)]));

    let cart = client
        .remove_line(&credential(), &product("Y"))
        .await
        .unwrap();

    assert_eq!(quantities(&cart), pairs(&[("B", 1)]));
}

#[tokio::test]
async fn test_set_quantity_on_missing_line_is_rejected() {
    let (_server, client) = setup().await;

    let err = client
        .set_quantity(&credential(), &product("Y"), Quantity::ONE)
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Rejected { status: 404, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_clear_empties_server_cart() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("A", 2)]));

    client.clear(&credential()).await.unwrap();
    client.clear(&credential()).await.unwrap();

    assert!(server.cart().is_empty());
}

#[tokio::test]
async fn test_product_ref_is_path_encoded() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("gift card?", 1)]));

    let cart = client
        .set_quantity(&credential(), &product("gift card?"), Quantity::new(2).unwrap())
        .await
        .unwrap();

    assert_eq!(quantities(&cart), pairs(&[("gift card?", 2)]));
}

// =============================================================================
// Status Mapping Tests
// =============================================================================

#[tokio::test]
async fn test_wrong_token_is_unauthenticated() {
    let (_server, client) = setup().await;

    let err = client
        .fetch(&Credential::new("someone-else"))
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::Unauthenticated);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_forbidden_is_unauthenticated() {
    let (server, client) = setup().await;
    server.force_status(Some(StatusCode::FORBIDDEN));

    let err = client.fetch(&credential()).await.unwrap_err();

    assert_eq!(err, RemoteError::Unauthenticated);
}

#[tokio::test]
async fn test_server_errors_are_transient() {
    let (server, client) = setup().await;

    for status in [
        StatusCode::INTERNAL_SERVER_ERROR,
        StatusCode::BAD_GATEWAY,
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::TOO_MANY_REQUESTS,
    ] {
        server.force_status(Some(status));
        let err = client.fetch(&credential()).await.unwrap_err();
        assert!(
            matches!(err, RemoteError::Server { status: s, .. } if s == status.as_u16()),
            "unexpected error for {status}: {err:?}"
        );
        assert!(err.is_transient());
    }
}

#[tokio::test]
async fn test_unprocessable_is_rejected() {
    let (server, client) = setup().await;
    server.force_status(Some(StatusCode::UNPROCESSABLE_ENTITY));

    let err = client
        .add_line(&credential(), &line("A", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Rejected { status: 422, .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = HttpRemoteCart::new(&RemoteConfig {
        base_url: url::Url::parse("http://127.0.0.1:9/api").unwrap(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let err = client.fetch(&credential()).await.unwrap_err();

    assert!(matches!(err, RemoteError::Network(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_every_call_carries_a_request_id() {
    let (server, client) = setup().await;

    client.fetch(&credential()).await.unwrap();
    client.add_line(&credential(), &line("A", 1)).await.unwrap();

    let ids = server.request_ids();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| uuid_like(id)));
}

fn uuid_like(id: &str) -> bool {
    id.len() == 36 && id.chars().filter(|c| *c == '-').count() == 4
}

// =============================================================================
// End-to-end Tests
// =============================================================================

#[tokio::test]
async fn test_guest_cart_merges_over_http() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("A", 1), line("C", 3)]));

    let storage = MemoryStorage::new();
    let mut cart = CartService::from_parts(
        LocalCartStore::new(storage.clone(), CART_KEY),
        client,
        REMOTE_TIMEOUT,
    );
    cart.add_item(catalog_item("A"), 2).await.unwrap();
    cart.add_item(catalog_item("B"), 1).await.unwrap();

    cart.login(credential()).await.unwrap();

    let expected = pairs(&[("A", 3), ("C", 3), ("B", 1)]);
    assert_eq!(quantities(cart.cart()), expected);
    assert_eq!(quantities(&server.cart()), expected);
    assert_eq!(cart.phase(), SyncPhase::Authenticated);
    assert!(local_store(&storage).read().is_empty());
}

#[tokio::test]
async fn test_outage_degrades_over_http() {
    let (server, client) = setup().await;
    server.set_cart(Cart::from_lines([line("S", 1)]));

    let storage = MemoryStorage::new();
    let mut cart = CartService::from_parts(
        LocalCartStore::new(storage.clone(), CART_KEY),
        client,
        REMOTE_TIMEOUT,
    );
    cart.login(credential()).await.unwrap();

    server.force_status(Some(StatusCode::SERVICE_UNAVAILABLE));
    cart.add_item(catalog_item("N"), 2).await.unwrap();

    assert_eq!(quantities(cart.cart()), pairs(&[("S", 1), ("N", 2)]));
    assert_eq!(quantities(&server.cart()), pairs(&[("S", 1)]));
    assert_eq!(
        quantities(&local_store(&storage).read()),
        pairs(&[("S", 1), ("N", 2)])
    );
}
