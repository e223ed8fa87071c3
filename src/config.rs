use std::sync::Arc;

use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    otp::OtpPolicy,
    store::{MemoryStore, MongoStore, StoreHandle},
};
use crate::seed::ensure_seed_data;

/// `db_uri` value selecting the in-process store instead of MongoDB.
pub const MEMORY_DB_URI: &str = "memory";

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_otp_ttl")]
    otp_ttl: u32,
    #[serde(default)]
    otp_policy: OtpPolicy,
    #[serde(default = "default_seed_demo_data")]
    seed_demo_data: bool,
}

fn default_otp_ttl() -> u32 {
    300
}

fn default_seed_demo_data() -> bool {
    true
}

impl Config {
    /// Valid lifetime of OTP in seconds.
    pub fn otp_ttl(&self) -> Duration {
        Duration::seconds(self.otp_ttl.into())
    }

    /// How OTP codes are generated.
    pub fn otp_policy(&self) -> &OtpPolicy {
        &self.otp_policy
    }

    /// Whether to insert demo candidates and voters into an empty store.
    pub fn seed_demo_data(&self) -> bool {
        self.seed_demo_data
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.otp_policy == OtpPolicy::Clock {
            warn!("OTP codes are derived from the clock and are guessable; demo use only");
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the record store.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "votesim".to_string()
}

/// A fairing that loads the store config, opens the store, performs any
/// setup necessary, and places a [`StoreHandle`] into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "Record store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: StoreHandle = if config.db_uri == MEMORY_DB_URI {
            warn!("Using the in-memory store; nothing will be persisted");
            Arc::new(MemoryStore::new())
        } else {
            info!("Loaded database config, connecting...");
            match MongoStore::connect(&config.db_uri, &config.db_name).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!("Failed to connect to database: {e}");
                    return Err(rocket);
                }
            }
        };
        info!("...record store online!");

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// A fairing that seeds demo data, if configured to. Must be attached after
/// both [`ConfigFairing`] and [`DatabaseFairing`].
pub struct SeedFairing;

#[rocket::async_trait]
impl Fairing for SeedFairing {
    fn info(&self) -> Info {
        Info {
            name: "Demo data",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let enabled = rocket.state::<Config>().map(Config::seed_demo_data);
        let store = rocket.state::<StoreHandle>().cloned();
        let (Some(enabled), Some(store)) = (enabled, store) else {
            error!("Demo data needs the config and record store to be loaded first");
            return Err(rocket);
        };
        if !enabled {
            return Ok(rocket);
        }

        if let Err(e) = ensure_seed_data(&store).await {
            error!("Failed to seed demo data: {e}");
            return Err(rocket);
        }
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::figment::Figment;

    use super::*;
    use crate::model::{candidate::Candidate, store::Coll};

    fn figment() -> Figment {
        Figment::from(rocket::Config::default()).merge(("db_uri", MEMORY_DB_URI))
    }

    async fn ignite(figment: Figment) -> Option<Rocket<rocket::Ignite>> {
        rocket::custom(figment)
            .attach(ConfigFairing)
            .attach(DatabaseFairing)
            .attach(SeedFairing)
            .ignite()
            .await
            .map_err(|e| error!("Ignition failed: {:?}", e.kind()))
            .ok()
    }

    #[test]
    fn defaults_apply() {
        let config = figment().extract::<Config>().unwrap();
        assert_eq!(Duration::seconds(300), config.otp_ttl());
        assert_eq!(OtpPolicy::Clock, *config.otp_policy());
        assert!(config.seed_demo_data());
    }

    #[test]
    fn policy_is_configurable() {
        let config = figment()
            .merge(("otp_policy", "random"))
            .merge(("otp_ttl", 60))
            .extract::<Config>()
            .unwrap();
        assert_eq!(OtpPolicy::Random, *config.otp_policy());
        assert_eq!(Duration::seconds(60), config.otp_ttl());

        assert!(figment()
            .merge(("otp_policy", "dice"))
            .extract::<Config>()
            .is_err());
    }

    #[rocket::async_test]
    async fn memory_store_is_seeded() {
        let rocket = ignite(figment()).await.unwrap();
        let store = rocket.state::<StoreHandle>().unwrap();

        let candidates = Coll::<Candidate>::from_store(store);
        assert_eq!(3, candidates.count(doc! {}).await.unwrap());
    }

    #[rocket::async_test]
    async fn seeding_can_be_disabled() {
        let rocket = ignite(figment().merge(("seed_demo_data", false)))
            .await
            .unwrap();
        let store = rocket.state::<StoreHandle>().unwrap();

        let candidates = Coll::<Candidate>::from_store(store);
        assert_eq!(0, candidates.count(doc! {}).await.unwrap());
    }

    #[rocket::async_test]
    async fn missing_db_uri_aborts_ignition() {
        let figment = Figment::from(rocket::Config::default());
        assert!(ignite(figment).await.is_none());
    }
}
