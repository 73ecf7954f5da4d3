use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "crux".to_string()),
            database: env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "auth".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    // Use the specified namespace and database
    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    // The record key of the `user` table is the account identifier itself
    // (UUID for local signups, federated subject for auto-provisioned
    // accounts). Key uniqueness is what makes concurrent first-use
    // provisioning race-free; email/username uniqueness is enforced by the
    // store's pre-checks because a unique index over an option<> field
    // collides on absent values.
    let schema_queries = vec![
        "DEFINE TABLE user SCHEMAFULL;
         DEFINE FIELD user_id ON TABLE user TYPE string;
         DEFINE FIELD email ON TABLE user TYPE option<string>;
         DEFINE FIELD username ON TABLE user TYPE option<string>;
         DEFINE FIELD first_name ON TABLE user TYPE option<string>;
         DEFINE FIELD last_name ON TABLE user TYPE option<string>;
         DEFINE FIELD provider ON TABLE user TYPE string;
         DEFINE FIELD provider_id ON TABLE user TYPE option<string>;
         DEFINE FIELD password_hash ON TABLE user TYPE option<string>;
         DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
         DEFINE FIELD is_verified ON TABLE user TYPE bool DEFAULT false;
         DEFINE FIELD created_at ON TABLE user TYPE datetime DEFAULT time::now();
         DEFINE FIELD updated_at ON TABLE user TYPE datetime VALUE time::now();
         DEFINE FIELD last_login ON TABLE user TYPE option<datetime>;",
        "DEFINE INDEX user_email ON TABLE user COLUMNS email;
         DEFINE INDEX user_username ON TABLE user COLUMNS username;
         DEFINE INDEX user_user_id ON TABLE user COLUMNS user_id UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?;
    }

    Ok(())
}
