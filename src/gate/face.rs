use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson};

use crate::error::{Error, Result};
use crate::model::{
    aadhaar::Aadhaar,
    face::FaceDigest,
    store::{Coll, StoreHandle},
    verification::{mark_verified, Verification, VerificationStep},
    voter::Voter,
};

/// Result of a successful face check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceOutcome {
    /// This check enrolled the voter's face, rather than matching an
    /// existing enrollment.
    pub enrolled: bool,
}

/// Enrolls face digests on first sight and matches them afterwards.
pub struct FaceGate<'a> {
    store: &'a StoreHandle,
}

impl<'a> FaceGate<'a> {
    pub fn new(store: &'a StoreHandle) -> Self {
        Self { store }
    }

    pub async fn verify_face(&self, aadhaar: &Aadhaar, image_base64: &str) -> Result<FaceOutcome> {
        self.verify_face_at(aadhaar, image_base64, Utc::now()).await
    }

    pub async fn verify_face_at(
        &self,
        aadhaar: &Aadhaar,
        image_base64: &str,
        now: DateTime<Utc>,
    ) -> Result<FaceOutcome> {
        let voters = Coll::<Voter>::from_store(self.store);
        let voter = voters
            .find_one(aadhaar.as_doc())
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with aadhaar '{aadhaar}'")))?;
        let digest = FaceDigest::from_image_payload(image_base64)?;

        let enrolled = match &voter.face_hash {
            Some(stored) => {
                check_match(aadhaar, stored, &digest)?;
                false
            }
            None => {
                // Only the first enrollment may write; a concurrent one that
                // got there first is matched against instead.
                let filter = doc! {
                    "_id": voter.id,
                    "face_hash": Bson::Null,
                };
                let claimed = voters
                    .update_one(filter, doc! { "face_hash": digest.as_str() })
                    .await?;
                if claimed == 0 {
                    let stored = voters
                        .find_one(voter.id.as_doc())
                        .await?
                        .and_then(|voter| voter.voter.face_hash)
                        .ok_or_else(|| {
                            Error::Internal(format!("Face enrollment for {aadhaar} vanished"))
                        })?;
                    check_match(aadhaar, &stored, &digest)?;
                    false
                } else {
                    info!("Enrolled face for voter {aadhaar}");
                    true
                }
            }
        };

        mark_verified(
            &Coll::<Verification>::from_store(self.store),
            aadhaar,
            VerificationStep::Face,
            now,
        )
        .await?;

        Ok(FaceOutcome { enrolled })
    }
}

fn check_match(aadhaar: &Aadhaar, stored: &FaceDigest, presented: &FaceDigest) -> Result<()> {
    if stored == presented {
        Ok(())
    } else {
        warn!("Face mismatch for voter {aadhaar}");
        Err(Error::FaceMismatch)
    }
}

#[cfg(test)]
mod tests {
    use data_encoding::BASE64;

    use super::*;
    use crate::model::voter::NewVoter;

    fn image(bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    async fn face_hash(voters: &Coll<Voter>, aadhaar: &Aadhaar) -> Option<FaceDigest> {
        voters
            .find_one(aadhaar.as_doc())
            .await
            .unwrap()
            .unwrap()
            .voter
            .face_hash
    }

    #[backend_test]
    async fn unknown_voter(store: StoreHandle) {
        let gate = FaceGate::new(&store);
        let result = gate.verify_face(&"000000000000".into(), &image(b"face")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[backend_test]
    async fn first_image_enrolls(
        store: StoreHandle,
        new_voters: Coll<NewVoter>,
        voters: Coll<Voter>,
    ) {
        new_voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let gate = FaceGate::new(&store);

        let outcome = gate
            .verify_face(&aadhaar, &format!("data:image/png;base64,{}", image(b"face-a")))
            .await
            .unwrap();
        assert!(outcome.enrolled);
        assert_eq!(Some(FaceDigest::of(b"face-a")), face_hash(&voters, &aadhaar).await);

        let verification = Coll::<Verification>::from_store(&store)
            .find_one(aadhaar.as_doc())
            .await
            .unwrap()
            .unwrap();
        assert!(verification.face_verified());
        assert!(!verification.otp_verified());
    }

    #[backend_test]
    async fn same_image_matches(store: StoreHandle, new_voters: Coll<NewVoter>) {
        new_voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let gate = FaceGate::new(&store);

        assert!(gate.verify_face(&aadhaar, &image(b"face-a")).await.unwrap().enrolled);
        // The header is not part of the image.
        let again = gate
            .verify_face(&aadhaar, &format!("data:image/jpeg;base64,{}", image(b"face-a")))
            .await
            .unwrap();
        assert!(!again.enrolled);
    }

    #[backend_test]
    async fn different_image_mismatches(
        store: StoreHandle,
        new_voters: Coll<NewVoter>,
        voters: Coll<Voter>,
    ) {
        new_voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let gate = FaceGate::new(&store);
        gate.verify_face(&aadhaar, &image(b"face-a")).await.unwrap();

        let result = gate.verify_face(&aadhaar, &image(b"face-b")).await;
        assert!(matches!(result, Err(Error::FaceMismatch)));
        // Enrollment is never overwritten.
        assert_eq!(Some(FaceDigest::of(b"face-a")), face_hash(&voters, &aadhaar).await);
    }

    #[backend_test]
    async fn malformed_image_changes_nothing(
        store: StoreHandle,
        new_voters: Coll<NewVoter>,
        voters: Coll<Voter>,
    ) {
        new_voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let gate = FaceGate::new(&store);

        let result = gate.verify_face(&aadhaar, "not base64 at all!").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(None, face_hash(&voters, &aadhaar).await);
        let verifications = Coll::<Verification>::from_store(&store);
        assert_eq!(0, verifications.count(aadhaar.as_doc()).await.unwrap());
    }

    async fn one_of_many_concurrent_enrollments_wins(store: StoreHandle) {
        let voters = Coll::<NewVoter>::from_store(&store);
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;

        let tasks = (0..8)
            .map(|_| {
                let store = store.clone();
                let aadhaar = aadhaar.clone();
                rocket::tokio::spawn(async move {
                    FaceGate::new(&store)
                        .verify_face(&aadhaar, &image(b"face-a"))
                        .await
                })
            })
            .collect::<Vec<_>>();
        let mut enrolled = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().enrolled {
                enrolled += 1;
            }
        }
        assert_eq!(1, enrolled);
        let voters = Coll::<Voter>::from_store(&store);
        assert_eq!(Some(FaceDigest::of(b"face-a")), face_hash(&voters, &aadhaar).await);
    }

    #[backend_test]
    async fn concurrent_enrollments_agree(store: StoreHandle) {
        one_of_many_concurrent_enrollments_wins(store).await;
    }

    #[backend_test(mongo)]
    async fn concurrent_enrollments_agree_in_mongo(store: StoreHandle) {
        one_of_many_concurrent_enrollments_wins(store).await;
    }
}
