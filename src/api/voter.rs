use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::gate::VotingGate;
use crate::logging::RequestId;
use crate::model::{
    aadhaar::Aadhaar,
    api::{
        voter::{CastVoteRequest, VoterStatus},
        Message,
    },
    store::StoreHandle,
};

pub fn routes() -> Vec<Route> {
    routes![status, vote]
}

#[get("/status/<aadhaar>")]
async fn status(aadhaar: &str, store: &State<StoreHandle>) -> Result<Json<VoterStatus>> {
    let status = VotingGate::new(store).status(&aadhaar.into()).await?;
    Ok(Json(status))
}

#[post("/vote", data = "<ballot>", format = "json")]
async fn vote(
    id: &RequestId,
    ballot: Json<CastVoteRequest>,
    store: &State<StoreHandle>,
) -> Result<Json<Message>> {
    let CastVoteRequest {
        aadhaar,
        candidate_id,
    } = ballot.into_inner();
    let aadhaar = Aadhaar::new(aadhaar);

    let vote_id = VotingGate::new(store)
        .cast_vote(&aadhaar, &candidate_id)
        .await?;
    debug!("{id} recorded as vote {vote_id}");
    Ok(Json(Message::new("Vote recorded")))
}
