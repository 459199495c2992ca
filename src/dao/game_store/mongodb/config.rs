use mongodb::options::ClientOptions;

use super::{
    connection::ConnectPolicy,
    error::{MongoDaoError, MongoResult},
};

const DEFAULT_DATABASE: &str = "trivia_show";
/// Reported to the server so operators can tell our connections apart.
const APP_NAME: &str = "trivia-show-back";

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    pub connect_policy: ConnectPolicy,
}

impl MongoConfig {
    /// Parse `uri`; `db_name` falls back to the database named in the URI, then to `trivia_show`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        if options.app_name.is_none() {
            options.app_name = Some(APP_NAME.to_owned());
        }
        let database_name = db_name
            .map(str::to_owned)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        Ok(Self {
            options,
            database_name,
            connect_policy: ConnectPolicy::default(),
        })
    }
}
