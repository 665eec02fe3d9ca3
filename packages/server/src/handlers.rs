//! HTTP handler functions for the geovisor server.

use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{HttpResponse, web};
use futures::StreamExt as _;
use geovisor_server_models::{ApiHealth, MapViewParams};
use uuid::Uuid;

use crate::AppState;
use crate::pipeline::{self, PipelineError};

/// Upload form served at the root route.
const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="UTF-8" />
  <title>Geovisor</title>
</head>
<body>
  <h1>Subir archivo geoespacial</h1>
  <p>Formatos soportados: KMZ, o Shapefile (.shp, .shx, .dbf y opcionalmente .prj).</p>
  <form method="post" enctype="multipart/form-data">
    <input type="file" name="file" multiple />
    <button type="submit">Subir</button>
  </form>
</body>
</html>
"#;

/// Map view page. The placeholder is substituted with the rendered map
/// document's filename.
const MAP_VIEW_PAGE: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="UTF-8" />
  <title>Geovisor - Mapa</title>
  <style>
    html, body { height: 100%; margin: 0; padding: 0; }
    iframe { height: 100%; width: 100%; border: 0; }
  </style>
</head>
<body>
  <iframe src="/static/__MAP_FILE__" title="__MAP_FILE__"></iframe>
</body>
</html>
"#;

/// `GET /`
///
/// Renders the upload form (the awaiting-submission state).
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(UPLOAD_FORM)
}

/// `POST /`
///
/// Processes one multipart submission: saves the uploaded files into a
/// request-scoped working directory, dispatches to a converter, renders
/// the map, and redirects to the map view. Every pipeline error becomes
/// a plain-text 400 response carrying the error's message.
#[allow(clippy::future_not_send)]
pub async fn upload(state: web::Data<AppState>, mut payload: Multipart) -> HttpResponse {
    let request_id = Uuid::new_v4();
    match process_submission(&state, request_id, &mut payload).await {
        Ok(Some(map_file)) => see_other(&format!("/map?map_file={map_file}")),
        Ok(None) => see_other("/"),
        Err(e) => {
            log::warn!("Conversion pipeline failed for request {request_id}: {e}");
            HttpResponse::BadRequest()
                .content_type("text/plain; charset=utf-8")
                .body(e.to_string())
        }
    }
}

/// Runs intake plus conversion for one submission. Returns the rendered
/// map filename, or `None` when no files were actually selected.
async fn process_submission(
    state: &AppState,
    request_id: Uuid,
    payload: &mut Multipart,
) -> Result<Option<String>, PipelineError> {
    let work_dir = state.upload_dir.join(request_id.to_string());
    std::fs::create_dir_all(&work_dir).map_err(|e| PipelineError::io(&work_dir, e))?;

    let saved = save_uploaded_files(payload, &work_dir).await?;
    if saved.is_empty() {
        return Ok(None);
    }

    let map_file = format!("map-{request_id}.html");
    let map_dest = state.static_dir.join(&map_file);
    pipeline::run(&saved, &work_dir, &map_dest)?;
    Ok(Some(map_file))
}

/// Drains the multipart payload, writing each part of the `file` field
/// into `dir` under its client-supplied basename.
async fn save_uploaded_files(
    payload: &mut Multipart,
    dir: &Path,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut saved = Vec::new();
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| PipelineError::Upload {
            message: e.to_string(),
        })?;
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned)
        else {
            continue;
        };
        // Browsers submit an empty part when no file was selected.
        let Some(basename) = Path::new(&filename).file_name() else {
            continue;
        };

        let dest = dir.join(basename);
        let mut bytes = web::BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| PipelineError::Upload {
                message: e.to_string(),
            })?;
            bytes.extend_from_slice(&chunk);
        }
        std::fs::write(&dest, &bytes).map_err(|e| PipelineError::io(&dest, e))?;
        saved.push(dest);
    }
    log::info!("Saved {} uploaded files to {}", saved.len(), dir.display());
    Ok(saved)
}

/// `GET /map?map_file=<name>`
///
/// Serves a page embedding the named rendered map document.
pub async fn map_view(params: web::Query<MapViewParams>) -> HttpResponse {
    let Some(map_file) = params.into_inner().map_file else {
        return see_other("/");
    };
    if map_file.contains('/') || map_file.contains('\\') || map_file.contains("..") {
        return HttpResponse::BadRequest()
            .content_type("text/plain; charset=utf-8")
            .body("Nombre de archivo inválido");
    }
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(MAP_VIEW_PAGE.replace("__MAP_FILE__", &map_file))
}

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}
