use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::debug;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// How long a fresh connection may take to answer its first ping.
#[derive(Debug, Clone, Copy)]
pub struct ConnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Round-trip a `ping` command.
pub async fn ping(database: &Database) -> Result<(), mongodb::error::Error> {
    database.run_command(doc! { "ping": 1 }).await.map(|_| ())
}

/// Build a client and wait until the configured database answers a ping.
pub async fn connect(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::Client { source })?;
    let database = client.database(&config.database_name);
    let policy = config.connect_policy;

    let mut attempts = 0;
    let mut delay = policy.initial_delay;
    loop {
        attempts += 1;
        match ping(&database).await {
            Ok(()) => {
                debug!(attempts, database = %config.database_name, "MongoDB answered");
                return Ok((client, database));
            }
            Err(source) if attempts >= policy.max_attempts => {
                return Err(MongoDaoError::Unreachable { attempts, source });
            }
            Err(err) => {
                debug!(attempts, error = %err, "MongoDB ping failed; retrying");
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}
