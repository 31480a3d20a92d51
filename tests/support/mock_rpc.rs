use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// In-memory steemd state served by [`MockRpcServer`]. Blocks above the tip
/// come back as `null`, like a node that has not produced them yet.
#[derive(Clone)]
pub struct MockChain {
    inner: Arc<MockChainInner>,
}

struct MockChainInner {
    tip: AtomicU64,
    advance_on_miss: AtomicU64,
    dgp_failures: AtomicUsize,
    batch_failures: AtomicUsize,
    malformed_once: Mutex<HashSet<u64>>,
    block_failures: Mutex<HashMap<u64, usize>>,
    accounts: HashMap<String, Value>,
    http_requests: AtomicUsize,
    batch_requests: AtomicUsize,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockChain {
    pub fn new(tip: u64) -> Self {
        let accounts = ["alice", "bob", "carol"]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    json!({ "name": name, "balance": "1.000 STEEM", "post_count": 3 }),
                )
            })
            .collect();

        Self {
            inner: Arc::new(MockChainInner {
                tip: AtomicU64::new(tip),
                advance_on_miss: AtomicU64::new(0),
                dgp_failures: AtomicUsize::new(0),
                batch_failures: AtomicUsize::new(0),
                malformed_once: Mutex::new(HashSet::new()),
                block_failures: Mutex::new(HashMap::new()),
                accounts,
                http_requests: AtomicUsize::new(0),
                batch_requests: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn tip(&self) -> u64 {
        self.inner.tip.load(Ordering::SeqCst)
    }

    /// Every request for a block above the tip moves the tip forward by `step`.
    pub fn advance_on_miss(&self, step: u64) {
        self.inner.advance_on_miss.store(step, Ordering::SeqCst);
    }

    /// The next `count` DGP calls answer with a JSON-RPC error.
    pub fn fail_dgp(&self, count: usize) {
        self.inner.dgp_failures.store(count, Ordering::SeqCst);
    }

    /// The next `count` batch requests are rejected with HTTP 503.
    pub fn fail_batches(&self, count: usize) {
        self.inner.batch_failures.store(count, Ordering::SeqCst);
    }

    /// The first time `number` is served it comes back without `block_id`.
    pub fn malform_once(&self, number: u64) {
        self.inner
            .malformed_once
            .lock()
            .expect("mock chain poisoned")
            .insert(number);
    }

    /// The next `count` requests for `number` answer with a JSON-RPC error.
    pub fn fail_block(&self, number: u64, count: usize) {
        self.inner
            .block_failures
            .lock()
            .expect("mock chain poisoned")
            .insert(number, count);
    }

    fn take_block_failure(&self, number: u64) -> bool {
        let mut failures = self.inner.block_failures.lock().expect("mock chain poisoned");
        match failures.get_mut(&number) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn http_requests(&self) -> usize {
        self.inner.http_requests.load(Ordering::SeqCst)
    }

    pub fn batch_requests(&self) -> usize {
        self.inner.batch_requests.load(Ordering::SeqCst)
    }

    /// Block numbers requested through `get_block`, in arrival order.
    pub fn requested_blocks(&self) -> Vec<u64> {
        self.inner
            .calls
            .lock()
            .expect("mock chain poisoned")
            .iter()
            .filter(|(method, _)| method == "get_block")
            .filter_map(|(_, params)| params.get(0).and_then(Value::as_u64))
            .collect()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.inner
            .calls
            .lock()
            .expect("mock chain poisoned")
            .iter()
            .filter(|(called, _)| called == method)
            .count()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn block(&self, number: u64) -> Value {
        let tip = self.tip();
        if number > tip {
            let step = self.inner.advance_on_miss.load(Ordering::SeqCst);
            self.inner.tip.fetch_add(step, Ordering::SeqCst);
            return Value::Null;
        }

        let malformed = self
            .inner
            .malformed_once
            .lock()
            .expect("mock chain poisoned")
            .remove(&number);
        if malformed {
            return json!({ "previous": block_id(number.saturating_sub(1)), "transactions": [] });
        }

        json!({
            "block_id": block_id(number),
            "previous": block_id(number.saturating_sub(1)),
            "timestamp": "2016-03-24T16:05:00",
            "witness": "initminer",
            "transactions": [],
        })
    }

    fn dgp(&self) -> Value {
        let tip = self.tip();
        json!({
            "time": "2016-03-24T16:05:00",
            "head_block_number": tip,
            "last_irreversible_block_num": tip.saturating_sub(15),
        })
    }
}

pub fn block_id(number: u64) -> String {
    format!("{number:08x}{:032x}", number.wrapping_mul(2_654_435_761))
}

pub struct MockRpcServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockRpcServer {
    pub async fn start(chain: MockChain) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock RPC listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let chain = chain.clone();
            async move { Ok::<_, Infallible>(service_fn(move |req| serve_request(chain.clone(), req))) }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock RPC server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(chain: MockChain, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    chain.inner.http_requests.fetch_add(1, Ordering::SeqCst);

    if req.method() != Method::POST {
        return Ok(status(StatusCode::METHOD_NOT_ALLOWED, "Unsupported method"));
    }

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return Ok(status(
                StatusCode::BAD_REQUEST,
                format!("failed to read body: {err}"),
            ))
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            return Ok(status(
                StatusCode::BAD_REQUEST,
                format!("invalid JSON payload: {err}"),
            ))
        }
    };

    let response_value = match payload {
        Value::Array(calls) => {
            chain.inner.batch_requests.fetch_add(1, Ordering::SeqCst);
            if MockChain::take_failure(&chain.inner.batch_failures) {
                return Ok(status(StatusCode::SERVICE_UNAVAILABLE, "upstream shard unavailable"));
            }
            Value::Array(calls.into_iter().map(|call| handle_call(&chain, call)).collect())
        }
        call => handle_call(&chain, call),
    };

    let mut response = Response::new(Body::from(response_value.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn status(code: StatusCode, message: impl Into<String>) -> Response<Body> {
    let mut response = Response::new(Body::from(message.into()));
    *response.status_mut() = code;
    response
}

fn handle_call(chain: &MockChain, call: Value) -> Value {
    let id = call.get("id").cloned().unwrap_or(Value::Null);
    let method = call
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let params = call
        .get("params")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    chain
        .inner
        .calls
        .lock()
        .expect("mock chain poisoned")
        .push((method.clone(), params.clone()));

    match method.as_str() {
        "get_dynamic_global_properties" => {
            if MockChain::take_failure(&chain.inner.dgp_failures) {
                error(id, -32003, "Unable to acquire database lock")
            } else {
                success(id, chain.dgp())
            }
        }
        "get_block" => match params.get(0).and_then(Value::as_u64) {
            Some(number) if chain.take_block_failure(number) => {
                error(id, -32000, "Unable to acquire database lock")
            }
            Some(number) => success(id, chain.block(number)),
            None => error(id, -32602, "invalid block number"),
        },
        "get_accounts" => {
            let names = params
                .get(0)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let found: Vec<Value> = names
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|name| chain.inner.accounts.get(name).cloned())
                .collect();
            success(id, Value::Array(found))
        }
        "get_content" => {
            let author = params.get(0).and_then(Value::as_str).unwrap_or_default();
            let permlink = params.get(1).and_then(Value::as_str).unwrap_or_default();
            if chain.inner.accounts.contains_key(author) {
                success(
                    id,
                    json!({ "author": author, "permlink": permlink, "title": "", "body": "" }),
                )
            } else {
                success(
                    id,
                    json!({ "author": "", "permlink": "", "id": 0 }),
                )
            }
        }
        _ => error(id, -32601, format!("unknown method {method}")),
    }
}

fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

fn error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message.into(),
        },
        "id": id,
    })
}
