/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The HTTP/JSON surface of a node.
//!
//! Three endpoints, backed entirely by [`NodeServices`]:
//! - `POST /transactions` with a transaction body: accept it into the pool.
//! - `GET /transactions/<hex hash>/status`: the integer transaction status.
//! - `POST /querystate` with `{code_addr, input}`: a read-only chaincode query.
//!
//! Validation failures map to 400, internal failures to 500. Byte fields travel as base64
//! strings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::http;
use warp::hyper::StatusCode;
use warp::Filter;

use crate::networking::Network;
use crate::state::KVStore;
use crate::types::base64_bytes;
use crate::types::basic::CryptoHash;
use crate::types::transaction::Transaction;

use super::NodeServices;

/// The body of `POST /querystate`.
#[derive(Serialize, Deserialize)]
pub struct StateQuery {
    #[serde(with = "base64_bytes")]
    pub code_addr: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub input: Vec<u8>,
}

/// The running API server. Owns its Tokio runtime; dropping the server stops it.
pub struct ApiServer {
    _runtime: tokio::runtime::Runtime,
}

impl ApiServer {
    pub fn start<K: KVStore, N: Network>(
        services: Arc<NodeServices<K, N>>,
        port: u16,
    ) -> ApiServer {
        let submit = {
            let services = services.clone();
            warp::post()
                .and(warp::path("transactions"))
                .and(warp::path::end())
                .and(warp::body::json())
                .map(move |tx: Transaction| handle_submit(&services, tx))
        };

        let status = {
            let services = services.clone();
            warp::get()
                .and(warp::path!("transactions" / String / "status"))
                .map(move |hash: String| handle_status(&services, &hash))
        };

        let query = {
            let services = services.clone();
            warp::post()
                .and(warp::path("querystate"))
                .and(warp::path::end())
                .and(warp::body::json())
                .map(move |query: StateQuery| handle_query(&services, &query))
        };

        let server = warp::serve(submit.or(status).or(query));

        let runtime = tokio::runtime::Runtime::new()
            .expect("Programming or Configuration error: fail to create Tokio runtime.");
        let _ = runtime.spawn(server.run(([0, 0, 0, 0], port)));
        log::info!("api listening on port {}", port);

        ApiServer { _runtime: runtime }
    }
}

fn handle_submit<K: KVStore, N: Network>(
    services: &NodeServices<K, N>,
    tx: Transaction,
) -> http::Response<Vec<u8>> {
    match services.submit_transaction(tx) {
        Ok(()) => reply(StatusCode::OK, Vec::new()),
        Err(err) => reply(StatusCode::BAD_REQUEST, err.to_string().into_bytes()),
    }
}

fn handle_status<K: KVStore, N: Network>(
    services: &NodeServices<K, N>,
    hash: &str,
) -> http::Response<Vec<u8>> {
    let hash = match hex::decode(hash).ok().and_then(|bytes| CryptoHash::from_slice(&bytes)) {
        Some(hash) => hash,
        None => return reply(StatusCode::BAD_REQUEST, b"malformed transaction hash".to_vec()),
    };
    let status = services.tx_status(&hash) as u8;
    match serde_json::to_vec(&status) {
        Ok(body) => reply(StatusCode::OK, body),
        Err(_) => reply(StatusCode::INTERNAL_SERVER_ERROR, Vec::new()),
    }
}

fn handle_query<K: KVStore, N: Network>(
    services: &NodeServices<K, N>,
    query: &StateQuery,
) -> http::Response<Vec<u8>> {
    match services.query_state(&query.code_addr, &query.input) {
        Ok(result) => match serde_json::to_vec(&base64_bytes::encode(&result)) {
            Ok(body) => reply(StatusCode::OK, body),
            Err(_) => reply(StatusCode::INTERNAL_SERVER_ERROR, Vec::new()),
        },
        Err(err) => reply(StatusCode::BAD_REQUEST, err.to_string().into_bytes()),
    }
}

fn reply(status: StatusCode, body: Vec<u8>) -> http::Response<Vec<u8>> {
    // Body construction is infallible for the inputs used here.
    http::Response::builder()
        .status(status)
        .body(body)
        .unwrap_or_default()
}
