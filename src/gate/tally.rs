use std::collections::HashMap;

use mongodb::bson::{doc, Bson};

use crate::error::Result;
use crate::model::{
    api::public::TallyRow,
    candidate::Candidate,
    store::{Coll, Id, StoreHandle},
    vote::Vote,
};

/// Placeholder name for votes whose candidate no longer exists.
pub const UNKNOWN_CANDIDATE: &str = "Unknown";

/// Counts the votes.
pub struct TallyEngine<'a> {
    store: &'a StoreHandle,
}

impl<'a> TallyEngine<'a> {
    pub fn new(store: &'a StoreHandle) -> Self {
        Self { store }
    }

    /// Every candidate with its vote count, most votes first.
    pub async fn results(&self) -> Result<Vec<TallyRow>> {
        let candidates = Coll::<Candidate>::from_store(self.store)
            .find(doc! {})
            .await?;
        let groups = Coll::<Vote>::from_store(self.store)
            .group_count("candidate_id")
            .await?;
        Ok(merge(candidates, groups))
    }
}

/// Combine candidates (in enumeration order) with per-candidate vote counts.
///
/// Each candidate gets exactly one row, zero if it has no votes. Counts for
/// IDs that match no candidate get an [`UNKNOWN_CANDIDATE`] row each, after
/// the candidates. The rows are then sorted by descending votes; the sort is
/// stable, so ties keep the order above.
pub fn merge(candidates: Vec<Candidate>, groups: Vec<(Bson, u64)>) -> Vec<TallyRow> {
    let position = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| (candidate.id, i))
        .collect::<HashMap<Id, usize>>();

    let mut counts = vec![0; candidates.len()];
    let mut unknown = Vec::new();
    for (key, votes) in groups {
        let known = match &key {
            Bson::ObjectId(id) => position.get(&Id::from(*id)),
            _ => None,
        };
        match known {
            Some(&i) => counts[i] += votes,
            None => {
                warn!("{votes} vote(s) for unknown candidate {key}");
                unknown.push(TallyRow {
                    candidate_id: key_to_string(key),
                    name: UNKNOWN_CANDIDATE.to_string(),
                    party: None,
                    votes,
                });
            }
        }
    }

    let mut rows = candidates
        .into_iter()
        .zip(counts)
        .map(|(candidate, votes)| TallyRow {
            candidate_id: candidate.id.to_string(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            votes,
        })
        .chain(unknown)
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.votes.cmp(&a.votes));
    rows
}

fn key_to_string(key: Bson) -> String {
    match key {
        Bson::ObjectId(id) => id.to_hex(),
        Bson::String(s) => s,
        other => other.to_string(),
    }
}
