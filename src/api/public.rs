use std::collections::BTreeMap;

use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::gate::TallyEngine;
use crate::model::{
    api::{
        public::{CandidateList, Health, ResultList},
        Message,
    },
    candidate::Candidate,
    store::{Coll, StoreHandle},
};

pub fn routes() -> Vec<Route> {
    routes![index, health, candidates, results]
}

#[get("/")]
async fn index() -> Json<Message> {
    Json(Message::new("Voting Simulation API running"))
}

/// Never fails: a broken store is reported in the body.
#[get("/health")]
async fn health(store: &State<StoreHandle>) -> Json<Health> {
    let mut health = Health {
        backend: "running".to_string(),
        database: "connected".to_string(),
        collections: BTreeMap::new(),
    };

    let check = async {
        let mut counts = BTreeMap::new();
        for name in store.collection_names().await? {
            let count = store.count(&name, doc! {}).await?;
            counts.insert(name, count);
        }
        Result::Ok(counts)
    };
    match check.await {
        Ok(counts) => health.collections = counts,
        Err(err) => {
            error!("Health check failed: {err}");
            health.database = "unavailable".to_string();
        }
    }

    Json(health)
}

#[get("/candidates")]
async fn candidates(candidates: Coll<Candidate>) -> Result<Json<CandidateList>> {
    let candidates = candidates
        .find(doc! {})
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(CandidateList { candidates }))
}

#[get("/results")]
async fn results(store: &State<StoreHandle>) -> Result<Json<ResultList>> {
    let results = TallyEngine::new(store).results().await?;
    Ok(Json(ResultList { results }))
}
