//! Action dispatcher (§4.5): turns (matched rule, counter verdict) into the
//! outgoing response, merging rate-limit headers onto every path —
//! forwarded, synthesized, or passed straight through.

use edgegate_core::model::{Action, BodyType};
use edgegate_core::window::WindowOutcome;
use fastly::http::StatusCode;
use fastly::{Request, Response};

/// Context the dispatcher needs beyond the matched action and the window
/// verdict: the client identifier for `X-Client-Identifier`, and whether
/// the caller's `Accept` header prefers HTML (for the default `rateLimit`
/// denial page).
pub struct DispatchContext<'a> {
    pub action: &'a Action,
    pub outcome: &'a WindowOutcome,
    pub rule_limit: u32,
    pub rule_period: u32,
    pub client_identifier: &'a str,
    pub accepts_html: bool,
}

/// Dispatch a matched rule. `forward` is invoked to reach the origin when
/// the action allows traffic through; it is not called for synthesized
/// denial responses.
pub fn dispatch(ctx: &DispatchContext<'_>, req: Request, forward: impl FnOnce(Request) -> Response) -> Response {
    let response = if ctx.outcome.allowed {
        dispatch_allowed(ctx, req, forward)
    } else {
        dispatch_denied(ctx, req, forward)
    };
    apply_rate_limit_headers(response, ctx)
}

fn dispatch_allowed(ctx: &DispatchContext<'_>, req: Request, forward: impl FnOnce(Request) -> Response) -> Response {
    let mut response = forward(req);
    if matches!(ctx.action, Action::Simulate) {
        response.set_header("X-Rate-Limit-Simulated", "false");
    }
    response
}

fn dispatch_denied(ctx: &DispatchContext<'_>, req: Request, forward: impl FnOnce(Request) -> Response) -> Response {
    match ctx.action {
        Action::Log => forward(req),
        Action::Simulate => {
            let mut response = forward(req);
            response.set_header("X-Rate-Limit-Simulated", "true");
            response
        }
        Action::Block => Response::from_status(StatusCode::FORBIDDEN).with_body_text_plain("Forbidden"),
        Action::CustomResponse { status_code, body, body_type } => {
            let status = StatusCode::from_u16(*status_code).unwrap_or(StatusCode::FORBIDDEN);
            Response::from_status(status)
                .with_body(body.as_str())
                .with_header("Content-Type", custom_response_content_type(*body_type))
        }
        Action::RateLimit | Action::Allow => rate_limit_response(ctx),
    }
}

fn custom_response_content_type(body_type: BodyType) -> &'static str {
    body_type.content_type()
}

fn rate_limit_response(ctx: &DispatchContext<'_>) -> Response {
    let retry_after = ctx.outcome.retry_after.unwrap_or(0);
    if ctx.accepts_html {
        Response::from_status(StatusCode::TOO_MANY_REQUESTS).with_body_text_html(&format!(
            "<html><body><h1>Rate limit exceeded</h1><p>Retry after {retry_after} seconds.</p></body></html>"
        ))
    } else {
        let body = serde_json::json!({ "error": "Rate limit exceeded", "retryAfter": retry_after });
        Response::from_status(StatusCode::TOO_MANY_REQUESTS)
            .with_body_json(&body)
            .unwrap_or_else(|_| Response::from_status(StatusCode::TOO_MANY_REQUESTS))
    }
}

fn apply_rate_limit_headers(mut response: Response, ctx: &DispatchContext<'_>) -> Response {
    response.set_header("X-Rate-Limit-Limit", ctx.rule_limit.to_string());
    response.set_header("X-Rate-Limit-Remaining", ctx.outcome.remaining.to_string());
    response.set_header("X-Rate-Limit-Period", ctx.rule_period.to_string());
    response.set_header("X-Rate-Limit-Reset", (ctx.outcome.reset_time / 1000).to_string());
    response.set_header(
        "X-Rate-Limit-Reset-Precise",
        format!("{:.3}", ctx.outcome.reset_time as f64 / 1000.0),
    );
    response.set_header("X-Client-Identifier", ctx.client_identifier);
    if !ctx.outcome.allowed {
        if let Some(retry_after) = ctx.outcome.retry_after {
            response.set_header("Retry-After", retry_after.to_string());
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(allowed: bool) -> WindowOutcome {
        WindowOutcome {
            allowed,
            remaining: if allowed { 2 } else { 0 },
            reset_time: 60_000,
            retry_after: if allowed { None } else { Some(12) },
            new_list: vec![],
        }
    }

    #[test]
    fn denied_block_action_synthesizes_403() {
        let action = Action::Block;
        let out = outcome(false);
        let ctx = DispatchContext {
            action: &action,
            outcome: &out,
            rule_limit: 5,
            rule_period: 60,
            client_identifier: "abc123",
            accepts_html: false,
        };
        let response = dispatch(&ctx, Request::get("https://example.com/"), |req| Response::from_status(StatusCode::OK).with_body("forwarded").with_header("x-forwarded", "1").with_header("ignore", req.get_method_str()));
        assert_eq!(response.get_status(), StatusCode::FORBIDDEN);
        assert_eq!(response.get_header_str("X-Rate-Limit-Limit").unwrap(), "5");
        assert_eq!(response.get_header_str("Retry-After").unwrap(), "12");
    }

    #[test]
    fn denied_custom_response_uses_rule_fields() {
        let action = Action::CustomResponse { status_code: 418, body: "tea".to_string(), body_type: BodyType::Text };
        let out = outcome(false);
        let ctx = DispatchContext {
            action: &action,
            outcome: &out,
            rule_limit: 5,
            rule_period: 60,
            client_identifier: "abc123",
            accepts_html: false,
        };
        let response = dispatch(&ctx, Request::get("https://example.com/"), |_| Response::from_status(StatusCode::OK));
        assert_eq!(response.get_status().as_u16(), 418);
        assert_eq!(response.get_header_str("Content-Type").unwrap(), "text/plain");
    }

    #[test]
    fn denied_rate_limit_negotiates_json_by_default() {
        let action = Action::RateLimit;
        let out = outcome(false);
        let ctx = DispatchContext {
            action: &action,
            outcome: &out,
            rule_limit: 5,
            rule_period: 60,
            client_identifier: "abc123",
            accepts_html: false,
        };
        let response = dispatch(&ctx, Request::get("https://example.com/"), |_| Response::from_status(StatusCode::OK));
        assert_eq!(response.get_status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.get_content_type().map(|m| m.to_string()), Some("application/json".to_string()));
    }

    #[test]
    fn denied_rate_limit_negotiates_html_when_accepted() {
        let action = Action::RateLimit;
        let out = outcome(false);
        let ctx = DispatchContext {
            action: &action,
            outcome: &out,
            rule_limit: 5,
            rule_period: 60,
            client_identifier: "abc123",
            accepts_html: true,
        };
        let response = dispatch(&ctx, Request::get("https://example.com/"), |_| Response::from_status(StatusCode::OK));
        assert_eq!(response.get_content_type().map(|m| m.to_string()), Some("text/html".to_string()));
    }

    #[test]
    fn allowed_simulate_sets_observability_marker() {
        let action = Action::Simulate;
        let out = outcome(true);
        let ctx = DispatchContext {
            action: &action,
            outcome: &out,
            rule_limit: 5,
            rule_period: 60,
            client_identifier: "abc123",
            accepts_html: false,
        };
        let response = dispatch(&ctx, Request::get("https://example.com/"), |_| Response::from_status(StatusCode::OK));
        assert_eq!(response.get_header_str("X-Rate-Limit-Simulated").unwrap(), "false");
    }
}
