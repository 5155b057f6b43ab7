use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Json, Response};
use chrono::Utc;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use cdx_format::{parse_ingest_line, surt_canonicalize, IngestLine};

use crate::error::{AppError, TextError};
use crate::state::AppState;

/// `POST /collections/:name` — ingests a body of CDX/`@alias` lines.
/// Every line is parsed before anything is staged; a single malformed line
/// aborts the whole request with zero records committed.
pub async fn ingest(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: String,
) -> Result<String, TextError> {
    let index = state.index(&name, true)?;

    let added = tokio::task::spawn_blocking(move || -> Result<usize, AppError> {
        let mut lines = Vec::new();
        for line in body.lines() {
            lines.push(parse_ingest_line(line)?);
        }

        let mut batch = index.begin_update();
        for line in lines {
            match line {
                IngestLine::Ignored => {}
                IngestLine::Alias { source, target } => {
                    let source = surt_canonicalize(&source);
                    let target = surt_canonicalize(&target);
                    batch.put_alias(&source, &target)?
                }
                IngestLine::Capture(mut capture) => {
                    capture.urlkey = surt_canonicalize(&capture.original);
                    batch.put_capture(&capture)?
                }
            }
        }
        Ok(batch.commit()?)
    })
    .await
    .expect("ingest worker panicked")?;

    Ok(format!("Added {added} records"))
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    url: String,
    #[serde(rename = "accessPoint", default = "default_access_point")]
    access_point: String,
}

fn default_access_point() -> String {
    "public".to_owned()
}

/// `GET /collections/:name?url=...&accessPoint=...` — streams matching
/// captures as `text/plain`, one CDX line per record, in ascending key
/// order. Never materializes the full result set: a blocking-pool task
/// feeds an `mpsc` channel that the response body streams directly from.
pub async fn query(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<QueryParams>,
) -> Result<Response, TextError> {
    let index = state.index(&name, false)?;
    let access_store = state.access_store(&name, false)?;
    let urlkey = surt_canonicalize(&params.url);

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, std::io::Error>>(32);

    tokio::task::spawn_blocking(move || {
        let access_time = Utc::now();
        let access_filter = access_store.filter(params.access_point, access_time);

        let iter = match index.query(&urlkey) {
            Ok(iter) => iter,
            Err(err) => {
                let _ = tx.blocking_send(Err(std::io::Error::other(err.to_string())));
                return;
            }
        };

        for item in iter {
            match item {
                Ok(capture) if access_filter(&capture) => {
                    let mut line = capture.to_cdx_line();
                    line.push('\n');
                    if tx.blocking_send(Ok(Bytes::from(line))).is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(err) => {
                    let _ = tx.blocking_send(Err(std::io::Error::other(err.to_string())));
                    break;
                }
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx));
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; charset=utf-8")
        .body(body)
        .expect("static response parts are always valid"))
}

/// `GET /collections` — lists known collections.
pub async fn list_collections(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.store.list_collections())
}
