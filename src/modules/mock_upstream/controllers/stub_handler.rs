use std::collections::BTreeMap;

use actix_web::{error::ResponseError, http::StatusCode, web, HttpRequest, HttpResponse};
use futures_util::StreamExt;

use crate::modules::mock_upstream::models::InboundRequest;
use crate::modules::mock_upstream::services::state::MockState;

/// Why the mock upstream refused to answer from a stub.
///
/// Every variant is journaled as an unmatched interaction first.
#[derive(thiserror::Error, Debug)]
pub enum StubError {
    #[error("No stub matched {request}")]
    Unmatched { request: String, status: StatusCode },

    #[error("Body of {request} exceeds {limit} bytes")]
    BodyTooLarge { request: String, limit: usize },

    #[error("Body of {request} could not be read: {cause}")]
    BodyUnreadable { request: String, cause: String },
}

impl ResponseError for StubError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(serde_json::json!({
            "error": {
                "message": self.to_string(),
                "code": status.as_u16(),
                "unmatched": true,
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            StubError::Unmatched { status, .. } => *status,
            StubError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            StubError::BodyUnreadable { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

/// Catch-all handler: journal the request, then answer from the first matching stub
pub async fn handle(
    state: web::Data<MockState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, StubError> {
    let limit = state.max_body_bytes();
    let body = read_body(payload, limit).await;
    let request = inbound_request(&req, body.bytes, body.received > limit);
    let description = request.to_string();

    // A body we could not take in whole is never offered to the matchers
    let rejection = if let Some(cause) = body.error {
        Some(StubError::BodyUnreadable {
            request: description.clone(),
            cause,
        })
    } else if request.body_truncated {
        Some(StubError::BodyTooLarge {
            request: description.clone(),
            limit,
        })
    } else {
        None
    };
    if let Some(rejection) = rejection {
        let sequence = state.journal().append(request, None);
        tracing::warn!(sequence, request = %description, error = %rejection, "Request body rejected");
        return Err(rejection);
    }

    let matched = state.first_match(&request);
    let sequence = state
        .journal()
        .append(request, matched.as_ref().map(|(index, _)| *index));

    match matched {
        Some((index, response)) => {
            tracing::debug!(sequence, rule = index, request = %description, "Stub matched");
            if let Some(delay) = response.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(response.to_http_response())
        }
        None => {
            tracing::warn!(sequence, request = %description, "Unmatched request");
            Err(StubError::Unmatched {
                request: description,
                status: state.unmatched_status(),
            })
        }
    }
}

struct ReadBody {
    /// At most `limit` bytes
    bytes: Vec<u8>,
    received: usize,
    error: Option<String>,
}

/// Drain the whole payload, keeping only the first `limit` bytes
async fn read_body(mut payload: web::Payload, limit: usize) -> ReadBody {
    let mut body = ReadBody {
        bytes: Vec::new(),
        received: 0,
        error: None,
    };

    while let Some(chunk) = payload.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                body.error = Some(e.to_string());
                break;
            }
        };
        body.received += chunk.len();
        let room = limit.saturating_sub(body.bytes.len());
        body.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    body
}

fn inbound_request(req: &HttpRequest, body: Vec<u8>, body_truncated: bool) -> InboundRequest {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in req.headers().iter() {
        let value = String::from_utf8_lossy(value.as_bytes());
        headers
            .entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }

    let query = req.query_string();
    InboundRequest {
        method: req.method().as_str().to_uppercase(),
        path: req.path().to_string(),
        query: (!query.is_empty()).then(|| query.to_string()),
        headers,
        body,
        body_truncated,
    }
}
