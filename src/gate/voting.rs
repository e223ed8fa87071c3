use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    aadhaar::Aadhaar,
    api::voter::VoterStatus,
    candidate::Candidate,
    store::{Coll, Id, StoreHandle},
    verification::Verification,
    vote::NewVote,
    voter::Voter,
};

/// Reports voter progress and records ballots.
pub struct VotingGate<'a> {
    store: &'a StoreHandle,
}

impl<'a> VotingGate<'a> {
    pub fn new(store: &'a StoreHandle) -> Self {
        Self { store }
    }

    pub async fn status(&self, aadhaar: &Aadhaar) -> Result<VoterStatus> {
        let voter = self.voter(aadhaar).await?;
        let verification = Coll::<Verification>::from_store(self.store)
            .find_one(aadhaar.as_doc())
            .await?;
        let (otp_verified, face_verified) = verification
            .map(|v| (v.otp_verified(), v.face_verified()))
            .unwrap_or_default();

        Ok(VoterStatus {
            aadhaar: aadhaar.to_string(),
            name: voter.voter.name,
            has_voted: voter.voter.has_voted,
            otp_verified,
            face_verified,
        })
    }

    /// Record `aadhaar`'s vote for `candidate_id`, returning the new vote's ID.
    ///
    /// At most one vote is ever recorded per voter, however many calls race.
    pub async fn cast_vote(&self, aadhaar: &Aadhaar, candidate_id: &str) -> Result<Id> {
        let voter = self.voter(aadhaar).await?;
        if voter.has_voted {
            debug!("Voter {aadhaar} tried to vote again");
            return Err(Error::AlreadyVoted);
        }

        let verified = Coll::<Verification>::from_store(self.store)
            .find_one(aadhaar.as_doc())
            .await?
            .map_or(false, |v| v.is_complete());
        if !verified {
            debug!("Voter {aadhaar} tried to vote before completing verification");
            return Err(Error::IncompleteVerification);
        }

        let candidate = self.candidate(candidate_id).await?;

        // Claim the vote. Only one caller can flip the flag.
        let voters = Coll::<Voter>::from_store(self.store);
        let claim = doc! {
            "_id": voter.id,
            "has_voted": false,
        };
        if voters.update_one(claim, doc! { "has_voted": true }).await? == 0 {
            debug!("Voter {aadhaar} lost a race to vote");
            return Err(Error::AlreadyVoted);
        }

        let vote = NewVote::new(aadhaar.clone(), candidate.id);
        match Coll::<NewVote>::from_store(self.store).insert_one(&vote).await {
            Ok(id) => {
                info!("Voter {aadhaar} cast vote {id}");
                Ok(id)
            }
            Err(err) => {
                error!("Failed to record vote for {aadhaar}, releasing claim: {err}");
                if let Err(release_err) = voters
                    .update_by_id(voter.id, doc! { "has_voted": false })
                    .await
                {
                    error!("Failed to release vote claim for {aadhaar}, voter is left marked as voted: {release_err}");
                }
                Err(err)
            }
        }
    }

    async fn voter(&self, aadhaar: &Aadhaar) -> Result<Voter> {
        Coll::<Voter>::from_store(self.store)
            .find_one(aadhaar.as_doc())
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with aadhaar '{aadhaar}'")))
    }

    async fn candidate(&self, candidate_id: &str) -> Result<Candidate> {
        let not_found = || Error::CandidateNotFound(candidate_id.to_string());
        let id = candidate_id.parse::<Id>().map_err(|_| not_found())?;
        Coll::<Candidate>::from_store(self.store)
            .find_one(id.as_doc())
            .await?
            .ok_or_else(not_found)
    }
}
