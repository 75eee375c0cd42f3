/// HTTP surface of the statistics service
///
/// Two endpoints sit in front of the aggregator: `POST /transactions` feeds
/// it and `GET /statistics/` reads it. The router below dispatches on method
/// and path; everything else is a 404 or 405.

pub mod statistics;
pub mod transactions;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::window::Aggregator;

/// A server accepting connections in a background task
pub struct RunningServer {
    pub local_addr: SocketAddr,
    pub task: JoinHandle<Result<(), hyper::Error>>,
}

/// Bind `addr` and serve until `shutdown` fires. Must be called from within
/// a tokio runtime.
pub fn spawn_server(
    addr: SocketAddr,
    aggregator: Arc<Aggregator>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<RunningServer, hyper::Error> {
    let make = make_service_fn(move |_conn| {
        let aggregator = Arc::clone(&aggregator);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| route(req, Arc::clone(&aggregator))))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make);
    let local_addr = server.local_addr();
    info!("🚀 Statistics API listening on http://{}", local_addr);

    let graceful = server.with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
        info!("🛑 Statistics API shutting down gracefully");
    });

    Ok(RunningServer {
        local_addr,
        task: tokio::spawn(graceful),
    })
}

pub async fn route(req: Request<Body>, aggregator: Arc<Aggregator>) -> Result<Response<Body>, hyper::Error> {
    debug!(method = %req.method(), path = req.uri().path(), "Incoming request");

    match (req.method(), req.uri().path()) {
        (&Method::POST, "/transactions") | (&Method::POST, "/transactions/") => {
            transactions::create(req, &aggregator).await
        }
        (&Method::GET, "/statistics") | (&Method::GET, "/statistics/") => Ok(statistics::show(&aggregator)),
        (_, "/transactions") | (_, "/transactions/") | (_, "/statistics") | (_, "/statistics/") => {
            Ok(empty(StatusCode::METHOD_NOT_ALLOWED))
        }
        _ => Ok(empty(StatusCode::NOT_FOUND)),
    }
}

pub(crate) fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
