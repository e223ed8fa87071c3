//! Demo records, so a fresh deployment has something to vote on.

use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    candidate::NewCandidate,
    sms::Sms,
    store::{Coll, StoreHandle},
    voter::NewVoter,
};

const CANDIDATES: [(&str, &str); 3] = [
    ("Alice Johnson", "Unity Party"),
    ("Bob Singh", "Progress Alliance"),
    ("Carla Gomez", "Green Front"),
];

const VOTERS: [(&str, &str, &str); 3] = [
    ("111122223333", "Ravi Kumar", "+919876543210"),
    ("444455556666", "Anita Sharma", "+919812345678"),
    ("777788889999", "Mohit Patel", "+919900112233"),
];

/// Insert the demo candidates and voters into whichever of the two
/// collections is still empty. Running this again is a no-op.
pub async fn ensure_seed_data(store: &StoreHandle) -> Result<()> {
    let candidates = Coll::<NewCandidate>::from_store(store);
    if candidates.count(doc! {}).await? == 0 {
        for (name, party) in CANDIDATES {
            candidates
                .insert_one(&NewCandidate::new(name, Some(party)))
                .await?;
        }
        info!("Seeded {} demo candidates", CANDIDATES.len());
    }

    let voters = Coll::<NewVoter>::from_store(store);
    if voters.count(doc! {}).await? == 0 {
        for (aadhaar, name, phone) in VOTERS {
            let phone = phone
                .parse::<Sms>()
                .map_err(|err| Error::Internal(format!("Bad demo phone {phone}: {err}")))?;
            voters
                .insert_one(&NewVoter::new(aadhaar.into(), name, phone))
                .await?;
        }
        info!("Seeded {} demo voters", VOTERS.len());
    }

    Ok(())
}
