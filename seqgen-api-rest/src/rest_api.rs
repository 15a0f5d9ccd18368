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

//! REST API server and resources.

mod http_resources {
    //! API resources

    pub mod create_sequence;
    pub mod drop_sequence;
    pub mod invalidate_cache;
    pub mod next_value;
    pub mod peek_value;
}
mod common {
    //! Common RESP API resources and utils.

    mod api_error_mapper;
    mod sequence_dtos;

    pub use api_error_mapper::*;
    pub use sequence_dtos::*;
}

use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::get;
use actix_web::http::header::ContentType;
use actix_web::web;
use seqgen::SequenceCoordinator;
use std::sync::Arc;
use tyst_api_rest_health::AppHealth;
use tyst_api_rest_health::health_resources;
use utoipa::OpenApi;

/// Number of parallel requests the can be served for each assigned CPU core.
const WORKERS_PER_CORE: usize = 1024;

/// Shared state between requests.
#[derive(Clone)]
struct AppState {
    coordinator: Arc<SequenceCoordinator>,
}

/// Simple health check that holds on to the coordinator instance.
pub struct AppHealthImpl {
    _app: Arc<SequenceCoordinator>,
}
impl AppHealthImpl {
    fn with_app(app: &Arc<SequenceCoordinator>) -> Arc<dyn AppHealth> {
        Arc::new(Self {
            _app: Arc::clone(app),
        })
    }
}
impl AppHealth for AppHealthImpl {
    fn is_health_started(&self) -> bool {
        true
    }
    fn is_health_ready(&self) -> bool {
        true
    }
    fn is_health_live(&self) -> bool {
        true
    }
}

/// Register the sequence resources.
fn sequence_scope() -> actix_web::Scope {
    web::scope("/api/v1")
        .service(get_openapi)
        .service(http_resources::create_sequence::create_sequence)
        .service(http_resources::drop_sequence::drop_sequence)
        .service(http_resources::next_value::next_value)
        .service(http_resources::peek_value::peek_value)
        .service(http_resources::invalidate_cache::invalidate_cache)
}

/// Run HTTP server until it fails or the returned future is dropped.
pub async fn run_http_server(
    coordinator: &Arc<SequenceCoordinator>,
    bind_address: &str,
    bind_port: u16,
) -> Result<(), Box<dyn core::error::Error>> {
    let workers = std::thread::available_parallelism()
        .map(|non_zero| non_zero.get())
        .unwrap_or(1);
    let max_connections = WORKERS_PER_CORE * workers;
    log::info!(
        "API described by http://{bind_address}:{bind_port}/openapi.json allows {max_connections} concurrent connections."
    );
    let app_state = AppState {
        coordinator: Arc::clone(coordinator),
    };
    let app_data = web::Data::<AppState>::new(app_state);
    let app_health = web::Data::<Arc<dyn AppHealth>>::new(AppHealthImpl::with_app(coordinator));

    HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .app_data(app_health.clone())
            .service(web::redirect("/openapi", "/api/v1/openapi.json"))
            .service(web::redirect("/openapi.json", "/api/v1/openapi.json"))
            .service(sequence_scope())
            .service(health_resources::health)
            .service(health_resources::health_live)
            .service(health_resources::health_ready)
            .service(health_resources::health_started)
    })
    .workers(workers)
    .backlog(u32::try_from(max_connections / 2).unwrap_or(2048))
    .worker_max_blocking_threads(max_connections)
    .max_connections(max_connections)
    .bind_auto_h2c((bind_address, bind_port))?
    .disable_signals()
    .shutdown_timeout(5) // Default 30
    .run()
    .await?;
    Ok(())
}

/// Serve Open API documentation.
#[get("/openapi.json")]
async fn get_openapi() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(openapi_as_string())
}

/// Get the OpenAPI definition as a pretty JSON String.
pub fn openapi_as_string() -> String {
    #[derive(OpenApi)]
    #[openapi(
        // Use Cargo.toml as source for the "info" section
        paths(
            http_resources::create_sequence::create_sequence,
            http_resources::drop_sequence::drop_sequence,
            http_resources::next_value::next_value,
            http_resources::peek_value::peek_value,
            http_resources::invalidate_cache::invalidate_cache,
            health_resources::health,
            health_resources::health_live,
            health_resources::health_ready,
            health_resources::health_started,
        )
    )]
    struct ApiDoc;
    ApiDoc::openapi()
        .to_pretty_json()
        .inspect_err(|e| log::error!("Unable to serialize API description: {e}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest_api::common::SequenceValueDto;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use seqgen::CoordinatorConfig;
    use seqgen::LocalSequenceStore;
    use seqgen::PolicyRegistry;

    fn coordinator() -> Arc<SequenceCoordinator> {
        SequenceCoordinator::new(
            LocalSequenceStore::in_memory(1_000),
            PolicyRegistry::default(),
            CoordinatorConfig::default(),
        )
    }

    #[actix_web::test]
    async fn sequence_lifecycle() {
        let app_state = AppState {
            coordinator: coordinator(),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .service(sequence_scope()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/sequences/app/orders")
            .set_payload(r#"{"dataType":"smallint","startValue":5,"increment":5}"#)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NO_CONTENT
        );

        let req = test::TestRequest::get()
            .uri("/api/v1/sequences/app/orders/peek")
            .to_request();
        let peeked: SequenceValueDto = test::call_and_read_body_json(&app, req).await;
        assert_eq!(peeked.value, Some(5));

        for expected in [5, 10] {
            let req = test::TestRequest::post()
                .uri("/api/v1/sequences/app/orders/next")
                .to_request();
            let next: SequenceValueDto = test::call_and_read_body_json(&app, req).await;
            assert_eq!(next.value, Some(expected));
        }

        let req = test::TestRequest::delete()
            .uri("/api/v1/sequences/app/orders/cache")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NO_CONTENT
        );

        let req = test::TestRequest::delete()
            .uri("/api/v1/sequences/app/orders")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NO_CONTENT
        );
        let req = test::TestRequest::post()
            .uri("/api/v1/sequences/app/orders/next")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::GONE);
    }

    #[actix_web::test]
    async fn rejects_bad_requests() {
        let app_state = AppState {
            coordinator: coordinator(),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .service(sequence_scope()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/sequences/app/unknown/next")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        for body in ["not json", r#"{"increment":0}"#] {
            let req = test::TestRequest::post()
                .uri("/api/v1/sequences/app/broken")
                .set_payload(body)
                .to_request();
            assert_eq!(
                test::call_service(&app, req).await.status(),
                StatusCode::BAD_REQUEST
            );
        }
    }

    #[actix_web::test]
    async fn exhausted_sequence_is_a_conflict() {
        let app_state = AppState {
            coordinator: coordinator(),
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state))
                .service(sequence_scope()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/sequences/app/tiny")
            .set_payload(r#"{"minValue":1,"maxValue":2}"#)
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NO_CONTENT
        );
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/v1/sequences/app/tiny/next")
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }
        let req = test::TestRequest::post()
            .uri("/api/v1/sequences/app/tiny/next")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CONFLICT
        );
        let req = test::TestRequest::get()
            .uri("/api/v1/sequences/app/tiny/peek")
            .to_request();
        let peeked: SequenceValueDto = test::call_and_read_body_json(&app, req).await;
        assert_eq!(peeked.value, None);
    }
}
