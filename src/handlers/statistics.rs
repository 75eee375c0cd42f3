/// `GET /statistics/`

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use tracing::error;

use crate::window::Aggregator;
use super::empty;

pub fn show(aggregator: &Aggregator) -> Response<Body> {
    let statistics = aggregator.snapshot();

    match serde_json::to_vec(&statistics) {
        Ok(json) => {
            let mut response = Response::new(Body::from(json));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("Failed to encode statistics: {}", e);
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
