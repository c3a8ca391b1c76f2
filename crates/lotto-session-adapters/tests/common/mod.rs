#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};

pub type Calls = Arc<Mutex<Vec<Value>>>;

/// Serves JSON-RPC on localhost. `handler` gets `(method, params)` and
/// returns the HTTP status plus the full response body.
pub fn spawn_json_rpc_server<F>(requests: usize, handler: F) -> (String, Calls)
where
    F: Fn(&str, &Value) -> (u16, Value) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}", server.server_addr());
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);

    thread::spawn(move || {
        for _ in 0..requests {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut raw = String::new();
            let _ = req.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            if let Ok(mut g) = recorded.lock() {
                g.push(body.clone());
            }

            let method = body["method"].as_str().unwrap_or_default().to_owned();
            let (code, payload) = handler(&method, &body["params"]);
            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    (addr, calls)
}

pub fn ok(result: Value) -> (u16, Value) {
    (200, json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

pub fn rpc_error(code: i64, message: &str, data: Option<Value>) -> (u16, Value) {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    (200, json!({ "jsonrpc": "2.0", "id": 1, "error": error }))
}
