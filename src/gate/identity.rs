use chrono::{DateTime, Duration, Utc};
use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    aadhaar::Aadhaar,
    otp::{Code, CodeSource, NewOtpRequest, OtpRequest},
    store::{Coll, StoreHandle},
    verification::{mark_verified, Verification, VerificationStep},
    voter::Voter,
};
use crate::Config;

/// A freshly issued OTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedOtp {
    pub code: Code,
    pub expires_at: DateTime<Utc>,
    pub voter_name: String,
}

/// Issues one-time passcodes and confirms them.
pub struct IdentityGate<'a> {
    store: &'a StoreHandle,
    codes: &'a dyn CodeSource,
    otp_ttl: Duration,
}

impl<'a> IdentityGate<'a> {
    pub fn new(store: &'a StoreHandle, codes: &'a dyn CodeSource, otp_ttl: Duration) -> Self {
        Self {
            store,
            codes,
            otp_ttl,
        }
    }

    /// A gate using the configured code policy and lifetime.
    pub fn from_config(store: &'a StoreHandle, config: &'a Config) -> Self {
        Self::new(store, config.otp_policy(), config.otp_ttl())
    }

    pub async fn send_otp(&self, aadhaar: &Aadhaar) -> Result<IssuedOtp> {
        self.send_otp_at(aadhaar, Utc::now()).await
    }

    /// Issue a new code for a registered voter. Earlier codes stay valid
    /// until they expire.
    pub async fn send_otp_at(&self, aadhaar: &Aadhaar, now: DateTime<Utc>) -> Result<IssuedOtp> {
        let voter = Coll::<Voter>::from_store(self.store)
            .find_one(aadhaar.as_doc())
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with aadhaar '{aadhaar}'")))?;

        let code = self.codes.generate(now);
        let request = NewOtpRequest::new(aadhaar.clone(), code, now, self.otp_ttl);
        let expires_at = request.expires_at;
        Coll::<NewOtpRequest>::from_store(self.store)
            .insert_one(&request)
            .await?;

        // No SMS gateway: the code goes back to the caller instead.
        info!(
            "Issued OTP {} for voter {aadhaar} ({}), expires {expires_at}",
            code.masked(),
            voter.phone.masked()
        );

        Ok(IssuedOtp {
            code,
            expires_at,
            voter_name: voter.voter.name,
        })
    }

    pub async fn verify_otp(&self, aadhaar: &Aadhaar, code: &str) -> Result<()> {
        self.verify_otp_at(aadhaar, code, Utc::now()).await
    }

    /// Confirm a code against the newest matching request for `aadhaar`.
    pub async fn verify_otp_at(
        &self,
        aadhaar: &Aadhaar,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // Anything that is not a well-formed code cannot match an issued one.
        let code = code.parse::<Code>().map_err(|_| Error::InvalidCredential)?;

        let otp_requests = Coll::<OtpRequest>::from_store(self.store);
        let filter = doc! {
            "aadhaar": aadhaar.as_str(),
            "otp": code.to_string(),
        };
        let request = otp_requests
            .find_one_sorted(filter, OtpRequest::newest_first())
            .await?
            .ok_or(Error::InvalidCredential)?;

        if request.is_expired_at(now) {
            debug!("OTP {} for voter {aadhaar} has expired", code.masked());
            return Err(Error::Expired);
        }

        otp_requests
            .update_by_id(request.id, doc! { "verified": true })
            .await?;
        mark_verified(
            &Coll::<Verification>::from_store(self.store),
            aadhaar,
            VerificationStep::Otp,
            now,
        )
        .await?;

        info!("Voter {aadhaar} passed OTP verification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{otp::FixedCode, voter::NewVoter};

    fn fixed() -> FixedCode {
        FixedCode("482913".parse().unwrap())
    }

    fn ttl() -> Duration {
        Duration::seconds(300)
    }

    #[backend_test]
    async fn send_otp_to_unknown_voter(store: StoreHandle) {
        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());

        let result = gate.send_otp(&"000000000000".into()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[backend_test]
    async fn send_otp_records_request(store: StoreHandle, voters: Coll<NewVoter>) {
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());
        let now = Utc::now();

        let issued = gate
            .send_otp_at(&NewVoter::example().aadhaar, now)
            .await
            .unwrap();
        assert_eq!("482913", issued.code.to_string());
        assert_eq!(now + ttl(), issued.expires_at);
        assert_eq!("Ravi Kumar", issued.voter_name);

        let requests = Coll::<OtpRequest>::from_store(&store)
            .find(doc! {})
            .await
            .unwrap();
        assert_eq!(1, requests.len());
        assert!(!requests[0].verified);
        assert_eq!(issued.code, requests[0].otp);
    }

    #[backend_test]
    async fn verify_within_ttl(store: StoreHandle, voters: Coll<NewVoter>) {
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());
        let issued_at = Utc::now() - Duration::seconds(120);

        gate.send_otp_at(&aadhaar, issued_at).await.unwrap();
        gate.verify_otp(&aadhaar, "482913").await.unwrap();

        let request = Coll::<OtpRequest>::from_store(&store)
            .find_one(aadhaar.as_doc())
            .await
            .unwrap()
            .unwrap();
        assert!(request.verified);

        let verification = Coll::<Verification>::from_store(&store)
            .find_one(aadhaar.as_doc())
            .await
            .unwrap()
            .unwrap();
        assert!(verification.otp_verified());
        assert!(!verification.face_verified());
    }

    #[backend_test]
    async fn expired_code_is_rejected(store: StoreHandle, voters: Coll<NewVoter>) {
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());
        let issued_at = Utc::now() - Duration::seconds(301);

        gate.send_otp_at(&aadhaar, issued_at).await.unwrap();
        let result = gate.verify_otp(&aadhaar, "482913").await;
        assert!(matches!(result, Err(Error::Expired)));

        // Nothing was marked.
        let verifications = Coll::<Verification>::from_store(&store);
        assert_eq!(0, verifications.count(aadhaar.as_doc()).await.unwrap());
    }

    #[backend_test]
    async fn expiry_instant_is_still_valid(store: StoreHandle, voters: Coll<NewVoter>) {
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());
        // Whole seconds, so the stored timestamps survive millisecond precision.
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let issued = gate.send_otp_at(&aadhaar, issued_at).await.unwrap();

        gate.verify_otp_at(&aadhaar, "482913", issued.expires_at)
            .await
            .unwrap();
        let result = gate
            .verify_otp_at(&aadhaar, "482913", issued.expires_at + Duration::seconds(1))
            .await;
        assert!(matches!(result, Err(Error::Expired)));
    }

    #[backend_test]
    async fn wrong_or_malformed_code(store: StoreHandle, voters: Coll<NewVoter>) {
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());
        gate.send_otp(&aadhaar).await.unwrap();

        for attempt in ["111111", "48291", "48291x", "", " 482913 ", "482913\n"] {
            let result = gate.verify_otp(&aadhaar, attempt).await;
            assert!(matches!(result, Err(Error::InvalidCredential)), "{attempt}");
        }

        // The right code for the wrong voter does not match either.
        let result = gate.verify_otp(&"444455556666".into(), "482913").await;
        assert!(matches!(result, Err(Error::InvalidCredential)));
    }

    #[backend_test]
    async fn newest_matching_request_wins(store: StoreHandle, voters: Coll<NewVoter>) {
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());

        // An old, expired issue of the same code followed by a fresh one.
        gate.send_otp_at(&aadhaar, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        gate.send_otp(&aadhaar).await.unwrap();

        gate.verify_otp(&aadhaar, "482913").await.unwrap();

        let requests = Coll::<OtpRequest>::from_store(&store)
            .find(aadhaar.as_doc())
            .await
            .unwrap();
        assert_eq!(2, requests.len());
        assert!(!requests[0].verified);
        assert!(requests[1].verified);
    }

    #[backend_test]
    async fn otp_does_not_clear_face_verification(store: StoreHandle, voters: Coll<NewVoter>) {
        voters.insert_one(&NewVoter::example()).await.unwrap();
        let aadhaar = NewVoter::example().aadhaar;
        let verifications = Coll::<Verification>::from_store(&store);
        mark_verified(&verifications, &aadhaar, VerificationStep::Face, Utc::now())
            .await
            .unwrap();

        let codes = fixed();
        let gate = IdentityGate::new(&store, &codes, ttl());
        gate.send_otp(&aadhaar).await.unwrap();
        gate.verify_otp(&aadhaar, "482913").await.unwrap();

        let verification = verifications
            .find_one(aadhaar.as_doc())
            .await
            .unwrap()
            .unwrap();
        assert!(verification.is_complete());
        assert_eq!(1, verifications.count(aadhaar.as_doc()).await.unwrap());
    }
}
