use super::{
    error::ErrorBody,
    handlers::{auth, health, me},
};
use axum::Json;
use utoipa::{
    openapi::{Contact, InfoBuilder, License, Tag},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::status,
        me::me,
        auth::callback::callback,
        auth::callback::success,
        auth::callback::logout,
    ),
    components(schemas(ErrorBody, auth::AuthenticatedUser))
)]
struct ApiDoc;

/// The `OpenAPI` document for the routes this service answers itself.
///
/// Proxied node routes are not described here.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    doc.info = info;

    let mut status_tag = Tag::new("status");
    status_tag.description = Some("Liveness".to_string());
    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("OpenID Connect login and session".to_string());
    doc.tags = Some(vec![status_tag, auth_tag]);

    doc
}

pub(super) async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match (author.find('<'), author.rfind('>')) {
        (Some(start), Some(end)) if start < end => {
            let name = optional_str(author[..start].trim());
            let email = optional_str(author[start + 1..end].trim());
            (name, email)
        }
        _ => (optional_str(author), None),
    }
}

fn optional_str(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
