use crate::domain::{
    action::Action,
    bridge::stream_bridge,
    provider::{StorageProvider, TransferArguments, DEFAULT_CONTENT_TYPE},
};
use crate::server::{error::ServerError, validation, AppState};
use crate::transfer::{
    delete, download, lifecycle::ConnectionLifecycle, session::TransferSession, upload,
    TransferError,
};
use axum::{
    body::Body,
    extract::{Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_stream::StreamExt;

/// Entry point for every verb on a resource: classify, prepare arguments,
/// then hand off to the matching transfer.
pub async fn dispatch(
    Path((provider_name, path)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ServerError> {
    // Reject unknown verbs before any provider or bridge is touched
    let action = Action::try_from(request.method())?;
    let path = validation::normalize_path(&path)?;

    let provider = state
        .providers
        .get(&provider_name)
        .ok_or_else(|| ServerError::UnknownProvider(provider_name.clone()))?;

    // Only a streamed body has a length worth forwarding to the provider
    let content_length = if action.streams_body() {
        request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
    } else {
        None
    };

    let arguments = TransferArguments {
        provider: provider_name,
        path,
        query,
        content_length,
    };

    tracing::info!(
        action = %action,
        provider = %arguments.provider,
        path = %arguments.path,
        "Handling transfer"
    );

    match action {
        Action::Download => download_file(provider, arguments, state.chunk_size).await,
        Action::Upload => upload_file(provider, arguments, request.into_body()).await,
        Action::Delete => delete_file(provider, arguments).await,
    }
}

async fn download_file(
    provider: Arc<dyn StorageProvider>,
    arguments: TransferArguments,
    chunk_size: usize,
) -> Result<Response, ServerError> {
    let disposition = HeaderValue::from_bytes(download::content_disposition(&arguments).as_bytes())
        .map_err(|_| ServerError::BadRequest)?;

    let mut lifecycle =
        ConnectionLifecycle::new(TransferSession::new(Action::Download, arguments));
    lifecycle.session_mut().begin_streaming()?;

    let result = match provider.download(lifecycle.session().arguments()).await {
        Ok(result) => result,
        Err(e) => {
            lifecycle.session_mut().abort();
            return Err(TransferError::from(e).into());
        }
    };

    let content_type = HeaderValue::from_str(&result.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    // headers go out before the first chunk; the session completes when the
    // provider stream is exhausted
    let chunks = download::stream(result.content, chunk_size);
    let body = Body::from_stream(lifecycle.guard_download(chunks));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn upload_file(
    provider: Arc<dyn StorageProvider>,
    arguments: TransferArguments,
    body: Body,
) -> Result<Response, ServerError> {
    // The provider starts consuming before the first body byte exists
    let (writer, reader) = stream_bridge();
    let pending = upload::begin(provider, reader, arguments.clone());
    let mut lifecycle = ConnectionLifecycle::new(TransferSession::upload(arguments, writer, pending));

    // convert body directly to chunks without buffering
    let mut frames = body.into_data_stream();
    while let Some(frame) = frames.next().await {
        let chunk = match frame {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!("Request body failed: {}", e);
                lifecycle.on_connection_close();
                return Err(TransferError::ConnectionAborted.into());
            }
        };

        match lifecycle.session_mut().push_chunk(chunk) {
            Ok(()) => {}
            // The provider stopped reading; its result below says why
            Err(TransferError::StreamClosed(e)) => {
                tracing::debug!("Stopped forwarding body: {}", e);
                break;
            }
            Err(e) => {
                lifecycle.session_mut().abort();
                return Err(e.into());
            }
        }
    }

    let session = lifecycle.session_mut();
    session.finish_body()?;
    let result = session.finish_upload().await?;

    if let Some(metadata) = &result.metadata {
        tracing::debug!("Upload metadata: {}", metadata);
    }

    let status = StatusCode::from_u16(result.status).map_err(|_| ServerError::InternalError)?;
    Ok(status.into_response())
}

async fn delete_file(
    provider: Arc<dyn StorageProvider>,
    arguments: TransferArguments,
) -> Result<Response, ServerError> {
    let mut lifecycle = ConnectionLifecycle::new(TransferSession::new(Action::Delete, arguments));
    lifecycle.session_mut().begin_streaming()?;

    let result = match delete::execute(provider.as_ref(), lifecycle.session().arguments()).await {
        Ok(result) => result,
        Err(e) => {
            lifecycle.session_mut().abort();
            return Err(e.into());
        }
    };

    let session = lifecycle.session_mut();
    session.finish_body()?;
    session.complete()?;

    let status = StatusCode::from_u16(result.status).map_err(|_| ServerError::InternalError)?;
    Ok(status.into_response())
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
