use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for signup.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// Request body for the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

/// Response from the token endpoint.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public part of the user returned after signup.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Profile as seen by its owner.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub email: String,
    pub name: String,
}

/// Partial profile update; omitted fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_has_no_password_field() {
        let user = PublicUser {
            id: Uuid::new_v4(),
            email: "atman@druk.com".into(),
            name: "Atman".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("atman@druk.com"));
    }

    #[test]
    fn profile_response_shape() {
        let profile = ProfileResponse {
            email: "test@druk.com".into(),
            name: "Test".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&profile).unwrap();
        assert_eq!(json, serde_json::json!({"email": "test@druk.com", "name": "Test"}));
    }

    #[test]
    fn update_profile_fields_default_to_none() {
        let req: UpdateProfileRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_none());
        assert!(req.name.is_none());
        assert!(req.password.is_none());
    }

    #[test]
    fn create_user_name_defaults_to_empty() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"email":"a@b.com","password":"testpass"}"#).unwrap();
        assert_eq!(req.name, "");
    }
}
