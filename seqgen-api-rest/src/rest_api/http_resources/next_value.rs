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

//! API resource for handing out the next value of a sequence.

use crate::rest_api::AppState;
use crate::rest_api::common::ApiErrorMapper;
use crate::rest_api::common::SequenceValueDto;
use crate::rest_api::common::identity_from_path;
use actix_web::Error;
use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::post;
use actix_web::web::Data;
use actix_web::web::Path;

/// Hand out the next value of a sequence.
///
/// Every successful call consumes a value, also when the response is lost.
#[utoipa::path(
    tag = "sequence",
    params(
        ("schema", description = "Schema of the sequence."),
        ("name", description = "Name of the sequence."),
    ),
    responses(
        (status = 200, description = "The next value.", body = SequenceValueDto),
        (status = 404, description = "No such sequence exists."),
        (status = 409, description = "The sequence has no more values and does not cycle."),
        (status = 410, description = "The sequence has been dropped."),
        (status = 503, description = "Storage is busy. Try again later."),
        (status = 500, description = "Internal server error."),
    ),
)]
#[post("/sequences/{schema}/{name}/next")]
pub async fn next_value(
    app_state: Data<AppState>,
    path: Path<(String, String)>,
) -> Result<HttpResponse, Error> {
    let identity = identity_from_path(path.into_inner());
    let value = app_state
        .coordinator
        .next_value_for(&identity)
        .await
        .inspect_err(|e| log::info!("Request for next value of {identity} failed: {e}"))
        .map_err(ApiErrorMapper::from_error)?;
    Ok(HttpResponse::build(StatusCode::OK).json(SequenceValueDto { value: Some(value) }))
}
