//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::handlers::{
    health::HealthResponse,
    images::{
        UploadResponse, PresignUploadRequest, PresignResponse,
        ListResponse, DeleteResponse, ErrorResponse,
    },
};
use crate::db::models::ImageRecord;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Image-Vault API",
        version = "1.0.0",
        description = "Image asset management service: S3 object storage with PostgreSQL metadata",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "images", description = "Image upload, listing and deletion endpoints")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::images::upload_image,
        crate::api::handlers::images::presign_upload,
        crate::api::handlers::images::list_images,
        crate::api::handlers::images::delete_image,
    ),
    components(
        schemas(
            // Health schemas
            HealthResponse,
            // Image schemas
            UploadResponse,
            PresignUploadRequest,
            PresignResponse,
            ListResponse,
            DeleteResponse,
            ErrorResponse,
            ImageRecord,
        )
    )
)]
pub struct ApiDoc;
