//! Declarative request validation
//!
//! A [`RequestSchema`] names one type per request part. [`Validated`] reads
//! each declared part, trims and coerces it, runs its `validator` rules, and
//! reports every problem found across all parts in a single 400.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, HeaderMap, StatusCode},
    Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

use super::types::ApiError;

/// One part of a request (body, query, params or headers)
pub trait SchemaPart: DeserializeOwned + Validate + Send {
    /// `false` for parts the route does not declare; those are never read
    const DECLARED: bool = true;

    /// Normalize after parsing, before rules run
    fn sanitize(&mut self) {}
}

/// Placeholder for an undeclared part
#[derive(Debug, Default, Deserialize)]
pub struct Skip {}

impl Validate for Skip {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

impl SchemaPart for Skip {
    const DECLARED: bool = false;
}

/// Per-route schema
pub trait RequestSchema: Send + 'static {
    type Body: SchemaPart;
    type Query: SchemaPart;
    type Params: SchemaPart;
    type Headers: SchemaPart;
}

/// Request parts that passed their schema
pub struct Validated<S: RequestSchema> {
    pub body: S::Body,
    pub query: S::Query,
    pub params: S::Params,
    pub headers: S::Headers,
}

pub fn trim(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

pub fn trim_opt(value: &mut Option<String>) {
    if let Some(inner) = value.as_mut() {
        trim(inner);
    }
}

/// Rule messages, ordered by field name
fn rule_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<(String, Vec<String>)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let field = field.to_string();
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid ({})", field, e.code),
                })
                .collect();
            (field, messages)
        })
        .collect();

    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields.into_iter().flat_map(|(_, messages)| messages).collect()
}

/// Sanitize and validate a parsed part, collecting failures into `messages`
fn check<T: SchemaPart>(parsed: Result<T, String>, messages: &mut Vec<String>) -> Option<T> {
    match parsed {
        Ok(mut part) => {
            part.sanitize();
            match part.validate() {
                Ok(()) => Some(part),
                Err(errors) => {
                    messages.extend(rule_messages(&errors));
                    None
                }
            }
        }
        Err(message) => {
            messages.push(message);
            None
        }
    }
}

fn undeclared<T: SchemaPart>() -> Result<T, String> {
    serde_json::from_value(Value::Object(Map::new())).map_err(|e| e.to_string())
}

fn headers_to_json(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();

    Value::Object(map)
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Parse the body as a form or JSON. An oversized body aborts the whole
/// request instead of counting as a validation message.
async fn read_body<T, S>(request: Request, state: &S) -> Result<Result<T, String>, ApiError>
where
    T: SchemaPart,
    S: Send + Sync,
{
    let rejection = if is_form(&request) {
        match Form::<T>::from_request(request, state).await {
            Ok(Form(value)) => return Ok(Ok(value)),
            Err(rejection) => ApiError::from(rejection),
        }
    } else {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => return Ok(Ok(value)),
            Err(rejection) => ApiError::from(rejection),
        }
    };

    if rejection.status == StatusCode::PAYLOAD_TOO_LARGE {
        return Err(rejection);
    }

    Ok(Err(rejection.message))
}

impl<Sc, S> FromRequest<S> for Validated<Sc>
where
    Sc: RequestSchema,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = request.into_parts();

        let query = if Sc::Query::DECLARED {
            Query::<Sc::Query>::try_from_uri(&parts.uri)
                .map(|Query(value)| value)
                .map_err(|rejection| ApiError::from(rejection).message)
        } else {
            undeclared()
        };

        let params = if Sc::Params::DECLARED {
            Path::<Sc::Params>::from_request_parts(&mut parts, state)
                .await
                .map(|Path(value)| value)
                .map_err(|rejection| ApiError::from(rejection).message)
        } else {
            undeclared()
        };

        let headers = if Sc::Headers::DECLARED {
            serde_json::from_value(headers_to_json(&parts.headers))
                .map_err(|e| format!("Invalid headers: {}", e))
        } else {
            undeclared()
        };

        let body = if Sc::Body::DECLARED {
            read_body::<Sc::Body, S>(Request::from_parts(parts, body), state).await?
        } else {
            undeclared()
        };

        let mut messages = Vec::new();
        let body = check(body, &mut messages);
        let query = check(query, &mut messages);
        let params = check(params, &mut messages);
        let headers = check(headers, &mut messages);

        match (body, query, params, headers) {
            (Some(body), Some(query), Some(params), Some(headers)) if messages.is_empty() => {
                Ok(Self {
                    body,
                    query,
                    params,
                    headers,
                })
            }
            _ => Err(
                ApiError::bad_request(format!("Validation failed: {}", messages.join(", ")))
                    .with_errors(messages),
            ),
        }
    }
}
