use super::session::Session;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The session identity, attached to requests that passed the gateway.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&Session> for AuthenticatedUser {
    fn from(session: &Session) -> Self {
        Self {
            subject: session.subject.clone(),
            issuer: session.issuer.clone(),
            email: session.email.clone(),
            name: session.name.clone(),
        }
    }
}
