//! HTTP server for the forwarder API.
//!
//! Exposes the forwarder's read operations and `execute` under `/api` so
//! relayers can submit signed requests over HTTP.

use crate::apis;
use axum::{
	extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
	http::{HeaderValue, Method},
	response::Json,
	routing::{get, post},
	Router,
};
use forwarder_config::{ApiConfig, CorsConfig};
use forwarder_core::Forwarder;
use forwarder_types::{
	APIError, BalanceResponse, DigestRequest, DigestResponse, DomainResponse, ExecuteOptions,
	ExecutionReceipt, ExecutionResult, NonceResponse, SignedForwardRequest, VerifyResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub forwarder: Arc<Forwarder>,
}

/// Builds the router with all API routes.
pub fn router(api_config: &ApiConfig, forwarder: Arc<Forwarder>) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/domain", get(handle_domain))
				.route("/nonces/{address}", get(handle_nonce))
				.route("/digest", post(handle_digest))
				.route("/verify", post(handle_verify))
				.route("/execute", post(handle_execute))
				.route("/receipts/{address}/{nonce}", get(handle_receipt))
				.route(
					"/targets/{address}/balances/{owner}",
					get(handle_balance),
				),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { forwarder })
}

fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(%origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods([Method::GET, Method::POST])
		.allow_headers(Any)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	forwarder: Arc<Forwarder>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(&api_config, forwarder);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Forwarder API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, APIError> {
	body.map(|Json(value)| value)
		.map_err(|e| APIError::bad_request("INVALID_REQUEST", e.body_text()))
}

/// Handles GET /api/domain requests.
async fn handle_domain(State(state): State<AppState>) -> Json<DomainResponse> {
	Json(apis::forwarder::get_domain(&state.forwarder))
}

/// Handles GET /api/nonces/{address} requests.
async fn handle_nonce(
	Path(address): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<NonceResponse>, APIError> {
	apis::forwarder::get_nonce(&state.forwarder, &address)
		.await
		.map(Json)
}

/// Handles POST /api/digest requests.
async fn handle_digest(
	State(state): State<AppState>,
	body: Result<Json<DigestRequest>, JsonRejection>,
) -> Result<Json<DigestResponse>, APIError> {
	let body = json_body(body)?;
	Ok(Json(apis::forwarder::compute_digest(
		&state.forwarder,
		&body.request,
	)))
}

/// Handles POST /api/verify requests.
async fn handle_verify(
	State(state): State<AppState>,
	body: Result<Json<SignedForwardRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, APIError> {
	let signed = json_body(body)?;
	Ok(Json(
		apis::forwarder::verify_request(&state.forwarder, &signed).await,
	))
}

/// Handles POST /api/execute requests.
///
/// Over HTTP the relayer attaches no value and gas is unconstrained.
async fn handle_execute(
	State(state): State<AppState>,
	body: Result<Json<SignedForwardRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, APIError> {
	let signed = json_body(body)?;
	apis::forwarder::execute_request(&state.forwarder, &signed, ExecuteOptions::default())
		.await
		.map(Json)
}

/// Handles GET /api/receipts/{address}/{nonce} requests.
async fn handle_receipt(
	Path((address, nonce)): Path<(String, String)>,
	State(state): State<AppState>,
) -> Result<Json<ExecutionReceipt>, APIError> {
	apis::forwarder::get_receipt(&state.forwarder, &address, &nonce)
		.await
		.map(Json)
}

/// Handles GET /api/targets/{address}/balances/{owner} requests.
async fn handle_balance(
	Path((address, owner)): Path<(String, String)>,
	State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, APIError> {
	apis::targets::get_balance(&state.forwarder, &address, &owner)
		.await
		.map(Json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use axum::body::{to_bytes, Body};
	use axum::http::{Request, StatusCode};
	use forwarder_account::implementations::local::LocalWallet;
	use forwarder_account::AccountService;
	use forwarder_config::builders::config::ConfigBuilder;
	use forwarder_types::{Address, ForwardRequest, U256};
	use tower::ServiceExt;

	const KEY_1: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
	const ADDRESS_1: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
	const TOKEN: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

	fn api_config() -> ApiConfig {
		ApiConfig {
			enabled: true,
			host: "127.0.0.1".to_string(),
			port: 0,
			timeout_seconds: 30,
			max_request_size: 1024 * 1024,
			cors: None,
		}
	}

	async fn app() -> (Router, Arc<Forwarder>) {
		let config = ConfigBuilder::new().target("gasless_token", TOKEN).build();
		let forwarder = Arc::new(
			crate::factory_registry::build_forwarder_from_config(config)
				.await
				.unwrap(),
		);
		(router(&api_config(), forwarder.clone()), forwarder)
	}

	async fn signed_mint(forwarder: &Forwarder) -> SignedForwardRequest {
		let request = ForwardRequest {
			from: ADDRESS_1,
			to: TOKEN,
			value: U256::ZERO,
			gas: U256::from(100_000u64),
			nonce: U256::ZERO,
			data: vec![0x12, 0x49, 0xc5, 0x8b].into(),
		};
		let signature = AccountService::new(Box::new(LocalWallet::new(KEY_1).unwrap()))
			.sign_forward_request(&request, forwarder.domain())
			.await
			.unwrap();
		SignedForwardRequest { request, signature }
	}

	async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		(status, serde_json::from_slice(&body).unwrap())
	}

	fn post_json(uri: &str, body: &impl serde::Serialize) -> Request<Body> {
		Request::post(uri)
			.header("content-type", "application/json")
			.body(Body::from(serde_json::to_vec(body).unwrap()))
			.unwrap()
	}

	#[tokio::test]
	async fn test_domain_endpoint() {
		let (app, _) = app().await;
		let (status, body) = send(app, Request::get("/api/domain").body(Body::empty()).unwrap()).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["name"], "MinimalForwarder");
		assert_eq!(body["version"], "0.0.1");
		assert_eq!(body["chainId"], 31337);
	}

	#[tokio::test]
	async fn test_execute_then_replay() {
		let (app, forwarder) = app().await;
		let signed = signed_mint(&forwarder).await;

		let (status, body) = send(app.clone(), post_json("/api/execute", &signed)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["success"], true);
		assert_eq!(body["nonce"], "0");

		let (status, body) = send(app.clone(), post_json("/api/execute", &signed)).await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"], "NONCE_MISMATCH");

		let uri = format!("/api/targets/{}/balances/{}", TOKEN, ADDRESS_1);
		let (status, body) = send(app.clone(), Request::get(uri).body(Body::empty()).unwrap()).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["balance"], "180");

		let uri = format!("/api/receipts/{}/0", ADDRESS_1);
		let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["success"], true);
	}

	#[tokio::test]
	async fn test_verify_and_nonce() {
		let (app, forwarder) = app().await;
		let signed = signed_mint(&forwarder).await;

		let (status, body) = send(app.clone(), post_json("/api/verify", &signed)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["valid"], true);

		let uri = format!("/api/nonces/{}", ADDRESS_1);
		let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["nonce"], "0");
	}

	#[tokio::test]
	async fn test_malformed_input_is_400() {
		let (app, _) = app().await;

		let (status, body) = send(
			app.clone(),
			post_json("/api/execute", &serde_json::json!({ "request": 1 })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_REQUEST");

		let (status, _) = send(
			app,
			Request::get("/api/nonces/0x1234").body(Body::empty()).unwrap(),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_unknown_target_is_404() {
		let (app, _) = app().await;
		let uri = format!("/api/targets/{}/balances/{}", Address::repeat_byte(1), ADDRESS_1);

		let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "TARGET_NOT_FOUND");
	}
}
