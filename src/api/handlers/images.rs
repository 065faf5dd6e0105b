//! Image asset endpoints
//!
//! Response shapes (`{message, data}`, `{url, key}`,
//! `{images, totalPages, currentPage}`, `{success}`) are wire contracts
//! consumed by existing clients.

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn, error};
use utoipa::ToSchema;

use crate::AppState;
use crate::assets::{AssetError, DirectUpload, PresignRequest};
use crate::db::models::ImageRecord;

/// Response for a successful direct upload
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub data: ImageRecord,
}

/// Request body for a presigned upload intent
#[derive(Debug, Deserialize, ToSchema)]
pub struct PresignUploadRequest {
    pub filename: Option<String>,
    pub description: Option<String>,
}

/// Response for a presigned upload intent
#[derive(Serialize, ToSchema)]
pub struct PresignResponse {
    pub url: String,
    pub key: String,
}

/// Response for the image listing
#[derive(Serialize, ToSchema)]
pub struct ListResponse {
    pub images: Vec<ImageRecord>,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
    #[serde(rename = "currentPage")]
    pub current_page: i64,
}

/// Response for a delete
#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Error response for image endpoints
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query parameters for the image listing
///
/// Kept as raw strings: non-numeric values fall back to the defaults
/// instead of failing deserialization.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

/// Query parameters for deletion
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub key: Option<String>,
}

fn parse_page_param(raw: Option<&str>, default: i64) -> i64 {
    match raw.and_then(|s| s.parse::<i64>().ok()) {
        Some(n) if n >= 1 => n,
        _ => default,
    }
}

fn asset_error_response(err: &AssetError) -> HttpResponse {
    match err {
        AssetError::InvalidInput(msg) => {
            HttpResponse::BadRequest().json(ErrorResponse { error: msg.clone() })
        }
        AssetError::Storage(_) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to upload file to storage".to_string(),
        }),
        AssetError::Repository(_) | AssetError::CompensationFailed { .. } => {
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to save image metadata".to_string(),
            })
        }
    }
}

/// A parsed `file` multipart part
struct FilePart {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

/// Read the `file` and `description` parts out of a multipart body
async fn read_multipart_parts(
    payload: &mut Multipart,
) -> Result<(Option<FilePart>, Option<String>), actix_multipart::MultipartError> {
    let mut file: Option<FilePart> = None;
    let mut description: Option<String> = None;

    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition().cloned();
        let part_name = disposition
            .as_ref()
            .and_then(|cd| cd.get_name())
            .unwrap_or("")
            .to_string();

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        match part_name.as_str() {
            "file" => {
                let filename = disposition
                    .as_ref()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or("uploaded_file")
                    .to_string();
                let content_type = field
                    .content_type()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                file = Some(FilePart { filename, content_type, data });
            }
            "description" => {
                description = Some(String::from_utf8_lossy(&data).to_string());
            }
            _ => {} // ignore unknown parts, already drained
        }
    }

    Ok((file, description))
}

/// POST /api/v1/images - Upload an image (multipart)
#[utoipa::path(
    post,
    path = "/api/v1/images",
    tag = "images",
    responses(
        (status = 200, description = "Image uploaded and recorded", body = UploadResponse),
        (status = 400, description = "Missing or invalid form data", body = ErrorResponse),
        (status = 500, description = "Storage or metadata failure", body = ErrorResponse)
    )
)]
pub async fn upload_image(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> HttpResponse {
    let (file, description) = match read_multipart_parts(&mut payload).await {
        Ok(parts) => parts,
        Err(e) => {
            warn!(error = %e, "Invalid multipart body");
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "No form data provided".to_string(),
            });
        }
    };

    let file = match file {
        Some(f) => f,
        None => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "No file uploaded.".to_string(),
            });
        }
    };

    info!(
        filename = %file.filename,
        size = file.data.len(),
        "Processing direct upload"
    );

    match state
        .coordinator
        .create_direct(DirectUpload {
            filename: file.filename,
            content_type: file.content_type,
            data: file.data,
            description,
        })
        .await
    {
        Ok(record) => HttpResponse::Ok().json(UploadResponse {
            message: "File uploaded successfully!".to_string(),
            data: record,
        }),
        Err(e) => {
            error!(error = %e, "Direct upload failed");
            asset_error_response(&e)
        }
    }
}

/// POST /api/v1/images/presign - Request a presigned upload URL
#[utoipa::path(
    post,
    path = "/api/v1/images/presign",
    tag = "images",
    request_body = PresignUploadRequest,
    responses(
        (status = 200, description = "Signed URL issued and intent recorded", body = PresignResponse),
        (status = 400, description = "Missing filename or description", body = ErrorResponse),
        (status = 500, description = "Storage or metadata failure", body = ErrorResponse)
    )
)]
pub async fn presign_upload(
    state: web::Data<AppState>,
    body: web::Json<PresignUploadRequest>,
) -> HttpResponse {
    let request = body.into_inner();

    let filename = match request.filename {
        Some(f) => f,
        None => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Filename is required".to_string(),
            });
        }
    };
    let description = match request.description {
        Some(d) => d,
        None => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Description is required".to_string(),
            });
        }
    };

    match state
        .coordinator
        .create_presigned(PresignRequest { filename, description })
        .await
    {
        Ok(presigned) => {
            info!(key = %presigned.key, "Issued presigned upload URL");
            HttpResponse::Ok().json(PresignResponse {
                url: presigned.url,
                key: presigned.key,
            })
        }
        Err(e) => {
            error!(error = %e, "Presign request failed");
            asset_error_response(&e)
        }
    }
}

/// GET /api/v1/images - List images, newest first
#[utoipa::path(
    get,
    path = "/api/v1/images",
    tag = "images",
    params(
        ("page" = Option<String>, Query, description = "Page number, defaults to 1"),
        ("pageSize" = Option<String>, Query, description = "Page size, defaults to 12")
    ),
    responses(
        (status = 200, description = "One page of image metadata", body = ListResponse),
        (status = 500, description = "Repository failure (strict mode only)", body = ErrorResponse)
    )
)]
pub async fn list_images(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let page = parse_page_param(query.page.as_deref(), 1);
    let page_size = parse_page_param(
        query.page_size.as_deref(),
        state.settings.behavior.default_page_size,
    );

    match state.coordinator.list(page, page_size).await {
        Ok(listing) => HttpResponse::Ok().json(ListResponse {
            images: listing.items,
            total_pages: listing.total_pages,
            current_page: listing.current_page,
        }),
        Err(e) => {
            error!(error = %e, "Listing failed");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to list images".to_string(),
            })
        }
    }
}

/// DELETE /api/v1/images - Delete an image by storage key
#[utoipa::path(
    delete,
    path = "/api/v1/images",
    tag = "images",
    params(
        ("key" = Option<String>, Query, description = "Storage key of the image to delete")
    ),
    responses(
        (status = 200, description = "Object and metadata removed", body = DeleteResponse),
        (status = 400, description = "Missing key", body = ErrorResponse),
        (status = 500, description = "Deletion failure (strict mode only)", body = ErrorResponse)
    )
)]
pub async fn delete_image(
    state: web::Data<AppState>,
    query: web::Query<DeleteQuery>,
) -> HttpResponse {
    // Checked before the coordinator runs: a missing key must not reach
    // either collaborator
    let key = match query.key.as_deref() {
        Some(k) if !k.is_empty() => k,
        _ => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Missing key".to_string(),
            });
        }
    };

    match state.coordinator.delete(key).await {
        Ok(()) => HttpResponse::Ok().json(DeleteResponse { success: true }),
        Err(AssetError::InvalidInput(_)) => HttpResponse::BadRequest().json(ErrorResponse {
            error: "Missing key".to_string(),
        }),
        Err(e) => {
            error!(error = %e, key = %key, "Delete failed");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to delete image".to_string(),
            })
        }
    }
}
