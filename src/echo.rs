use serde_json::{json, Value};

use crate::dispatcher::{DispatchResult, HandlerResponse, RequestContext};

/// Placeholder handler: echoes back what it was called with.
///
/// Used by the probe CLI for every manifest route so that a route table can be
/// exercised before any real handler exists.
pub async fn echo_handler(ctx: RequestContext) -> DispatchResult {
    let params: serde_json::Map<String, Value> = ctx
        .path_params()
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(v.as_str())))
        .collect();
    let query: Vec<Value> = ctx.query().iter().map(|(k, v)| json!([k, v])).collect();
    let body = if ctx.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(ctx.body())
            .unwrap_or_else(|_| Value::from(String::from_utf8_lossy(ctx.body()).into_owned()))
    };
    let principal = ctx.principal().map(|p| {
        json!({
            "subject": p.subject(),
            "roles": p.roles(),
            "permissions": p.permissions(),
        })
    });

    Ok(HandlerResponse::ok_json(json!({
        "request_id": ctx.request_id(),
        "method": ctx.method().as_str(),
        "path": ctx.path(),
        "route": ctx.route_pattern(),
        "params": params,
        "query": query,
        "body": body,
        "principal": principal,
    })))
}
