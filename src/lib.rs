//! Backend for a simulated voting service: voters prove who they are with a
//! one-time password and a face image, cast a single ballot, and anyone can
//! read the running tally.

#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod model;
pub mod seed;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing, SeedFairing};
use logging::LoggerFairing;

/// The server, configured from `Rocket.toml` and `ROCKET_*` variables.
/// Config, store and demo data are loaded on ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(SeedFairing)
}

/// The server over an existing store, which is used as-is.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: model::store::StoreHandle) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .manage(store)
}

/// A MongoDB-backed store over a database of its own, named uniquely so
/// tests can run in parallel. The caller drops the database when done.
#[cfg(test)]
pub(crate) async fn mongo_test_store() -> (model::store::StoreHandle, mongodb::Database) {
    let uri = std::env::var("VOTESIM_TEST_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let db_name = format!("votesim_test_{}", mongodb::bson::oid::ObjectId::new());
    let store = model::store::MongoStore::connect(&uri, &db_name)
        .await
        .unwrap();
    let db = store.database().clone();
    (std::sync::Arc::new(store), db)
}
