//! Password handling for collections that carry credentials.
//!
//! The schema compiler knows nothing about passwords. [`Accounts`] sits in
//! front of the users and stores models: it replaces a plaintext `password`
//! with an argon2 PHC string before the write and strips it from anything
//! leaving the server.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use serde_json::{Map, Value};
use shelf_engine::{Document, Model, WriteReport};
use std::collections::HashSet;

/// Field holding the password hash.
pub const PASSWORD_FIELD: &str = "password";

/// Account errors.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Engine(#[from] shelf_engine::Error),
}

/// Credential handling for a fixed set of collections.
#[derive(Debug, Clone, Default)]
pub struct Accounts {
    guarded: HashSet<String>,
}

impl Accounts {
    pub fn new<S: Into<String>>(collections: impl IntoIterator<Item = S>) -> Self {
        Self {
            guarded: collections.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether documents of `collection` carry a password.
    pub fn guards(&self, collection: &str) -> bool {
        self.guarded.contains(collection)
    }

    pub fn hash_password(&self, plain: &str) -> Result<String, AccountError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccountError::Hash(e.to_string()))
    }

    /// Replace a plaintext password in `fields` with its hash.
    ///
    /// Non-string values are left for schema validation to reject.
    pub fn protect(&self, collection: &str, fields: &mut Map<String, Value>) -> Result<(), AccountError> {
        if !self.guards(collection) {
            return Ok(());
        }
        if let Some(Value::String(plain)) = fields.get(PASSWORD_FIELD) {
            let hashed = self.hash_password(plain)?;
            fields.insert(PASSWORD_FIELD.to_string(), Value::String(hashed));
        }
        Ok(())
    }

    /// Hash the password, then create the document.
    pub async fn register(&self, model: &Model, input: Value) -> Result<WriteReport, AccountError> {
        let input = match input {
            Value::Object(mut fields) => {
                self.protect(model.name(), &mut fields)?;
                Value::Object(fields)
            }
            // Let validation report the shape error.
            other => other,
        };
        Ok(model.create_reported(input).await?)
    }

    /// Hash a password carried by a patch, then apply it.
    pub async fn update(&self, model: &Model, id: &str, patch: Value) -> Result<WriteReport, AccountError> {
        let patch = match patch {
            Value::Object(mut fields) => {
                self.protect(model.name(), &mut fields)?;
                Value::Object(fields)
            }
            other => other,
        };
        Ok(model.update_reported(id, patch).await?)
    }

    /// Check a candidate password against the stored hash.
    pub fn verify_password(&self, document: &Document, candidate: &str) -> bool {
        let Some(stored) = document.get(PASSWORD_FIELD).and_then(Value::as_str) else {
            return false;
        };
        match PasswordHash::new(stored) {
            Ok(hash) => Argon2::default()
                .verify_password(candidate.as_bytes(), &hash)
                .is_ok(),
            Err(e) => {
                tracing::warn!(id = %document.id, error = %e, "stored password is not a valid hash");
                false
            }
        }
    }

    /// Outgoing JSON for a document, without credentials.
    pub fn redact(&self, collection: &str, document: Document) -> Value {
        let mut value = document.into_value();
        if self.guards(collection) {
            if let Value::Object(fields) = &mut value {
                fields.remove(PASSWORD_FIELD);
            }
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shelf_engine::{FieldDef, FieldType, MemoryStore};
    use std::sync::Arc;

    fn users() -> Model {
        Model::define(
            "users",
            vec![
                FieldDef::required("email", FieldType::String),
                FieldDef::required(PASSWORD_FIELD, FieldType::String),
            ],
            Arc::new(MemoryStore::new()),
        )
        .unwrap()
        .build()
    }

    #[tokio::test]
    async fn register_hashes_and_verifies() {
        let accounts = Accounts::new(["users"]);
        let model = users();

        let report = accounts
            .register(&model, json!({"email": "a@example.com", "password": "hunter2"}))
            .await
            .unwrap();
        let document = report.document;

        let stored = document.get(PASSWORD_FIELD).and_then(Value::as_str).unwrap();
        assert_ne!(stored, "hunter2");
        assert!(stored.starts_with("$argon2"));
        assert!(accounts.verify_password(&document, "hunter2"));
        assert!(!accounts.verify_password(&document, "hunter3"));
    }

    #[tokio::test]
    async fn missing_password_is_still_a_validation_error() {
        let accounts = Accounts::new(["users"]);
        let err = accounts
            .register(&users(), json!({"email": "a@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccountError::Engine(shelf_engine::Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn update_rehashes() {
        let accounts = Accounts::new(["users"]);
        let model = users();
        let created = accounts
            .register(&model, json!({"email": "a@example.com", "password": "old"}))
            .await
            .unwrap()
            .document;

        let updated = accounts
            .update(&model, &created.id, json!({"password": "new"}))
            .await
            .unwrap()
            .document;
        assert!(accounts.verify_password(&updated, "new"));
        assert!(!accounts.verify_password(&updated, "old"));
    }

    #[test]
    fn redact_only_guarded_collections() {
        let accounts = Accounts::new(["users"]);
        let mut fields = Map::new();
        fields.insert(PASSWORD_FIELD.into(), json!("$argon2id$..."));
        fields.insert("email".into(), json!("a@example.com"));
        let document = Document::new("u-1", fields);

        let redacted = accounts.redact("users", document.clone());
        assert_eq!(redacted, json!({"id": "u-1", "email": "a@example.com"}));

        let kept = accounts.redact("products", document);
        assert!(kept.get(PASSWORD_FIELD).is_some());
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let accounts = Accounts::new(["users"]);
        let mut fields = Map::new();
        fields.insert(PASSWORD_FIELD.into(), json!("plaintext"));
        assert!(!accounts.verify_password(&Document::new("u-1", fields), "plaintext"));
    }
}
