/// `POST /transactions`

use hyper::body::HttpBody;
use hyper::{Body, Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::core::{RecordOutcome, Transaction, MAX_TRANSACTION_BODY_BYTES};
use crate::window::Aggregator;
use super::empty;

/// 201 when recorded, 204 when outside the window, 418 for a body that is not
/// a transaction at all (oversized bodies included)
pub async fn create(req: Request<Body>, aggregator: &Aggregator) -> Result<Response<Body>, hyper::Error> {
    let bytes = match read_limited(req.into_body(), MAX_TRANSACTION_BODY_BYTES).await? {
        Some(bytes) => bytes,
        None => {
            warn!(limit = MAX_TRANSACTION_BODY_BYTES, "Rejected oversized transaction body");
            return Ok(empty(StatusCode::IM_A_TEAPOT));
        }
    };

    let transaction = match Transaction::from_json(&bytes) {
        Ok(transaction) => transaction,
        Err(e) => {
            warn!("Rejected transaction body: {}", e);
            return Ok(empty(StatusCode::IM_A_TEAPOT));
        }
    };

    let status = match aggregator.record(transaction) {
        RecordOutcome::Accepted => StatusCode::CREATED,
        RecordOutcome::OutOfWindow => {
            debug!(timestamp = transaction.timestamp, "Transaction older than the window");
            StatusCode::NO_CONTENT
        }
    };

    Ok(empty(status))
}

/// Collect the body, or `None` as soon as it is known to exceed `limit`.
/// A declared `Content-Length` over the limit is refused without reading.
async fn read_limited(mut body: Body, limit: usize) -> Result<Option<Vec<u8>>, hyper::Error> {
    if body.size_hint().lower() > limit as u64 {
        return Ok(None);
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if bytes.len() + chunk.len() > limit {
            return Ok(None);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(Some(bytes))
}
