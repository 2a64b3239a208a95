use actix_web::http::StatusCode;
use actix_web::{HttpRequest, ResponseError};
use jsonwebtoken::{Algorithm, DecodingKey, TokenData, Validation};
use service_core::auth::jwt::Claims;
use thiserror::Error;

/// Identity of the caller of a request or a subscription connection.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub claims: Claims,
}

#[derive(Debug, Error)]
pub enum ExtractAuthorizationError {
    #[error("Unauthorized: invalid token.")]
    InvalidToken,
}

/// Verifies access tokens signed with the shared HS256 secret.
pub struct TokenDecoder {
    key: DecodingKey,
    validation: Validation,
}

impl TokenDecoder {
    pub fn new(secret: &str) -> Self {
        TokenDecoder {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    fn decode(&self, token: &str) -> Result<Claims, ExtractAuthorizationError> {
        let token_data: TokenData<Claims> = jsonwebtoken::decode(token, &self.key, &self.validation).map_err(|e| {
            log::error!("Failed decoding token: {:?}", e);
            ExtractAuthorizationError::InvalidToken
        })?;
        Ok(token_data.claims)
    }
}

impl Authorization {
    pub fn try_from_req(req: &HttpRequest, decoder: &TokenDecoder) -> Result<Option<Self>, ExtractAuthorizationError> {
        match req.headers().get("Authorization") {
            Some(value) => {
                let value = value.to_str().map_err(|_| ExtractAuthorizationError::InvalidToken)?;
                Self::from_header_value(value, decoder)
            }
            None => Ok(None),
        }
    }

    /// Reads the token from a WebSocket `connection_init` payload, where clients put it under
    /// `Authorization` (or `authorization`).
    pub fn try_from_connection_params(
        params: &serde_json::Value,
        decoder: &TokenDecoder,
    ) -> Result<Option<Self>, ExtractAuthorizationError> {
        let value = params
            .get("Authorization")
            .or_else(|| params.get("authorization"))
            .and_then(serde_json::Value::as_str);
        match value {
            Some(value) => Self::from_header_value(value, decoder),
            None => Ok(None),
        }
    }

    fn from_header_value(value: &str, decoder: &TokenDecoder) -> Result<Option<Self>, ExtractAuthorizationError> {
        // Clients without a stored token send an empty header.
        if value.is_empty() {
            return Ok(None);
        }
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(ExtractAuthorizationError::InvalidToken)?;

        Ok(Some(Self {
            claims: decoder.decode(token)?,
        }))
    }
}

impl ResponseError for ExtractAuthorizationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::json;
    use service_core::auth::jwt::UserId;

    use super::*;

    const SECRET: &str = "demo-secret";

    fn token(secret: &str) -> String {
        let claims = Claims {
            user_id: Some(UserId::Int(7)),
            role: Some("demo_user".to_string()),
            exp: Some(get_current_timestamp() + 600),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn bearer_header_yields_claims() {
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token(SECRET))))
            .to_http_request();

        let auth = Authorization::try_from_req(&req, &TokenDecoder::new(SECRET))
            .unwrap()
            .expect("authorization should be present");
        assert_eq!(auth.claims.user_id(), Some(&UserId::Int(7)));
    }

    #[test]
    fn missing_or_empty_header_is_anonymous() {
        let decoder = TokenDecoder::new(SECRET);
        let req = TestRequest::default().to_http_request();
        assert!(Authorization::try_from_req(&req, &decoder).unwrap().is_none());

        let req = TestRequest::default().insert_header(("Authorization", "")).to_http_request();
        assert!(Authorization::try_from_req(&req, &decoder).unwrap().is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let req = TestRequest::default()
            .insert_header(("Authorization", format!("Bearer {}", token("other-secret"))))
            .to_http_request();

        let err = Authorization::try_from_req(&req, &TokenDecoder::new(SECRET)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic Zm9vOmJhcg=="))
            .to_http_request();
        assert!(Authorization::try_from_req(&req, &TokenDecoder::new(SECRET)).is_err());
    }

    #[test]
    fn connection_params_accept_either_casing() {
        let decoder = TokenDecoder::new(SECRET);
        let upper = json!({ "Authorization": format!("Bearer {}", token(SECRET)) });
        let lower = json!({ "authorization": format!("Bearer {}", token(SECRET)) });

        assert!(Authorization::try_from_connection_params(&upper, &decoder).unwrap().is_some());
        assert!(Authorization::try_from_connection_params(&lower, &decoder).unwrap().is_some());
        assert!(Authorization::try_from_connection_params(&json!({}), &decoder).unwrap().is_none());
    }
}
