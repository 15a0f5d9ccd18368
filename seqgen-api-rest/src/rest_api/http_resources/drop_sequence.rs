/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! API resource for removing a sequence.

use crate::rest_api::AppState;
use crate::rest_api::common::ApiErrorMapper;
use crate::rest_api::common::identity_from_path;
use actix_web::Error;
use actix_web::HttpResponse;
use actix_web::delete;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::web::Path;

/// Remove a sequence.
#[utoipa::path(
    tag = "sequence",
    params(
        ("schema", description = "Schema of the sequence."),
        ("name", description = "Name of the sequence."),
    ),
    responses(
        (status = 204, description = "No content. Successfully dropped the sequence."),
        (status = 404, description = "No such sequence exists."),
        (status = 410, description = "The sequence has already been dropped."),
        (status = 500, description = "Internal server error."),
    ),
)]
#[delete("/sequences/{schema}/{name}")]
pub async fn drop_sequence(
    app_state: Data<AppState>,
    path: Path<(String, String)>,
) -> Result<HttpResponse, Error> {
    let identity = identity_from_path(path.into_inner());
    app_state
        .coordinator
        .drop_sequence(&identity)
        .await
        .map_err(ApiErrorMapper::from_error)?;
    Ok(HttpResponse::build(StatusCode::NO_CONTENT).finish())
}
