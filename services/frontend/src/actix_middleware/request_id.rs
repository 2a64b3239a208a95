use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{Error, HttpMessage};
use tracing_actix_web::RequestId;

/// The header carrying the request ID back to the caller.
pub const REQUEST_ID_HEADER: &str = "x-demo-request-id";

/// GraphQL error extension carrying the same ID.
pub const REQUEST_ID_EXTENSION: &str = "requestId";

/// Echoes the request ID assigned by `TracingLogger` in a response header. Must be registered
/// inside `TracingLogger`.
pub async fn echo_request_id(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .and_then(|id| HeaderValue::from_str(&id.to_string()).ok());
    if request_id.is_none() {
        tracing::warn!("No request ID to echo; is TracingLogger registered?");
    }

    let mut res = next.call(req).await?;
    if let Some(request_id) = request_id {
        res.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), request_id);
    }
    Ok(res)
}

/// Stamps every error of a GraphQL response with the request ID, so a client that only keeps the
/// error body can still be matched with the server logs.
pub fn tag_errors(mut response: async_graphql::Response, request_id: &str) -> async_graphql::Response {
    for error in &mut response.errors {
        error
            .extensions
            .get_or_insert_with(Default::default)
            .set(REQUEST_ID_EXTENSION, request_id);
    }
    response
}

#[cfg(test)]
mod tests {
    use actix_web::middleware::from_fn;
    use actix_web::{test, web, App, HttpResponse};
    use async_graphql::{ServerError, Value};
    use tracing_actix_web::TracingLogger;

    use super::*;

    #[actix_web::test]
    async fn response_carries_request_id() {
        let app = test::init_service(
            App::new()
                .wrap(from_fn(echo_request_id))
                .wrap(TracingLogger::default())
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        let header = res.headers().get(REQUEST_ID_HEADER).expect("header should be set");
        assert!(!header.is_empty());
    }

    #[::core::prelude::v1::test]
    fn every_error_is_tagged() {
        let response = async_graphql::Response::from_errors(vec![
            ServerError::new("first", None),
            ServerError::new("second", None),
        ]);

        let tagged = tag_errors(response, "req-1");

        for error in &tagged.errors {
            let extensions = error.extensions.as_ref().expect("extensions should be set");
            assert_eq!(extensions.get(REQUEST_ID_EXTENSION), Some(&Value::from("req-1")));
        }
    }

    #[::core::prelude::v1::test]
    fn successful_responses_are_untouched() {
        let response = async_graphql::Response::new(Value::from(1));

        let tagged = tag_errors(response, "req-1");

        assert!(tagged.errors.is_empty());
        assert_eq!(tagged.data, Value::from(1));
    }
}
