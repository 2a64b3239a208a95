mod actix_middleware;
mod context;
mod repository;
mod schema;
mod subscription;

use std::sync::Arc;

use actix_web::middleware::from_fn;
use actix_web::web;
use actix_web::{guard, App, HttpMessage, HttpRequest, HttpResponse, HttpServer, Result};
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::{Data, Schema};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse, GraphQLSubscription};
use service_core::pg::Adapter;
use service_core::telemetry::logging::{init_subscriber, make_subscriber};
use tracing_actix_web::{RequestId, TracingLogger};

use crate::actix_middleware::request_id::{echo_request_id, tag_errors};
use crate::context::Context;
use crate::repository::{MessageRepository, PgMessageRepository};
use crate::schema::authorization::{Authorization, TokenDecoder};
use crate::schema::{build_schema, AppSchema};
use crate::subscription::feed::{ChangeFeed, PgChangeFeed};
use crate::subscription::topic::default_authorizer;

const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

#[actix_web::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_subscriber(make_subscriber("frontend", "info", std::io::stdout))?;

    let ctx = Context::from_env()?;
    let adapter = Adapter::connect(ctx.database_url.as_str())?;
    adapter.batch_execute(SCHEMA_SQL).await?;
    tracing::info!("Database schema is up to date.");

    let repository: Arc<dyn MessageRepository> = Arc::new(PgMessageRepository::new(adapter.clone()));
    let feed: Arc<dyn ChangeFeed> = Arc::new(PgChangeFeed::new(adapter));
    let schema = build_schema(repository, feed, default_authorizer());
    let decoder = web::Data::new(TokenDecoder::new(&ctx.jwt_secret));

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(echo_request_id))
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(schema.clone()))
            .app_data(decoder.clone())
            .configure(configure_service)
    })
    .bind(ctx.bind_address.as_str())?
    .run()
    .await?;

    Ok(())
}

/// Serves GraphQL on `/` and `/graphql`: queries and mutations over POST, subscriptions over a
/// WebSocket upgrade, and the playground on plain GET.
pub fn configure_service(cfg: &mut web::ServiceConfig) {
    for path in ["/", "/graphql"] {
        cfg.service(
            web::resource(path)
                .route(web::post().to(index))
                .route(
                    web::get()
                        .guard(guard::Header("upgrade", "websocket"))
                        .to(index_ws),
                )
                .route(web::get().to(index_playground)),
        );
    }
}

async fn index(
    schema: web::Data<AppSchema>,
    decoder: web::Data<TokenDecoder>,
    http_req: HttpRequest,
    req: GraphQLRequest,
) -> Result<GraphQLResponse> {
    let mut request = req.into_inner();
    if let Some(authorization) = Authorization::try_from_req(&http_req, &decoder)? {
        request = request.data(authorization);
    }

    let mut response = schema.execute(request).await;
    let request_id = http_req.extensions().get::<RequestId>().map(ToString::to_string);
    if let Some(request_id) = request_id {
        response = tag_errors(response, &request_id);
    }
    Ok(response.into())
}

async fn index_ws(
    schema: web::Data<AppSchema>,
    decoder: web::Data<TokenDecoder>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse> {
    let decoder = decoder.into_inner();

    GraphQLSubscription::new(Schema::clone(&*schema))
        .on_connection_init(move |params| async move {
            let mut data = Data::default();
            if let Some(authorization) = Authorization::try_from_connection_params(&params, &decoder)? {
                data.insert(authorization);
            }
            Ok::<_, async_graphql::Error>(data)
        })
        .start(&req, payload)
}

async fn index_playground() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(playground_source(
            GraphQLPlaygroundConfig::new("/graphql").subscription_endpoint("/graphql"),
        ))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;

    use super::*;
    use crate::actix_middleware::request_id::{REQUEST_ID_EXTENSION, REQUEST_ID_HEADER};
    use crate::repository::MockMessageRepository;
    use crate::subscription::feed::memory::StaticChangeFeed;
    use crate::subscription::topic::ClaimsTopicAuthorizer;

    #[actix_web::test]
    async fn invalid_token_is_answered_with_401() {
        let schema = build_schema(
            Arc::new(MockMessageRepository::new()),
            Arc::new(StaticChangeFeed::default()),
            Arc::new(ClaimsTopicAuthorizer),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(schema))
                .app_data(web::Data::new(TokenDecoder::new("secret")))
                .configure(configure_service),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/graphql")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .set_json(serde_json::json!({ "query": "{ apiVersion }" }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn anonymous_query_is_served() {
        let schema = build_schema(
            Arc::new(MockMessageRepository::new()),
            Arc::new(StaticChangeFeed::default()),
            Arc::new(ClaimsTopicAuthorizer),
        );
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(schema))
                .app_data(web::Data::new(TokenDecoder::new("secret")))
                .configure(configure_service),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/")
            .set_json(serde_json::json!({ "query": "{ apiVersion }" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"]["apiVersion"], 1);
    }

    #[actix_web::test]
    async fn errors_carry_the_echoed_request_id() {
        let schema = build_schema(
            Arc::new(MockMessageRepository::new()),
            Arc::new(StaticChangeFeed::default()),
            Arc::new(ClaimsTopicAuthorizer),
        );
        let app = test::init_service(
            App::new()
                .wrap(from_fn(echo_request_id))
                .wrap(TracingLogger::default())
                .app_data(web::Data::new(schema))
                .app_data(web::Data::new(TokenDecoder::new("secret")))
                .configure(configure_service),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/graphql")
            .set_json(serde_json::json!({ "query": r#"{ messages(channelId: "42", first: 0) { id } }"# }))
            .to_request();
        let res = test::call_service(&app, req).await;

        let header = res
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("header should be set")
            .to_str()
            .unwrap()
            .to_string();
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["errors"][0]["extensions"][REQUEST_ID_EXTENSION], header.as_str());
        assert_eq!(body["errors"][0]["extensions"]["code"], "INVALID_ARGUMENT");
    }

    #[::core::prelude::v1::test]
    fn oversized_notifications_fall_back_to_row_ids() {
        assert!(SCHEMA_SQL.contains("IF octet_length(payload) >= 8000 THEN"));
        assert!(SCHEMA_SQL.contains("json_build_object('id', NEW.id)"));
    }
}
