use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::gate::{FaceGate, IdentityGate};
use crate::logging::RequestId;
use crate::model::{
    aadhaar::Aadhaar,
    api::{
        auth::{
            SendOtpRequest, SendOtpResponse, VerifyFaceRequest, VerifyFaceResponse,
            VerifyOtpRequest,
        },
        Message,
    },
    store::StoreHandle,
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![send_otp, verify_otp, verify_face]
}

#[post("/auth/send-otp", data = "<request>", format = "json")]
pub async fn send_otp(
    id: &RequestId,
    request: Json<SendOtpRequest>,
    store: &State<StoreHandle>,
    config: &State<Config>,
) -> Result<Json<SendOtpResponse>> {
    let aadhaar = Aadhaar::new(request.into_inner().aadhaar);
    debug!("{id} OTP requested for {aadhaar}");

    let issued = IdentityGate::from_config(store, config)
        .send_otp(&aadhaar)
        .await?;
    Ok(Json(issued.into()))
}

#[post("/auth/verify-otp", data = "<request>", format = "json")]
pub async fn verify_otp(
    request: Json<VerifyOtpRequest>,
    store: &State<StoreHandle>,
    config: &State<Config>,
) -> Result<Json<Message>> {
    let aadhaar = Aadhaar::new(request.aadhaar.clone());
    IdentityGate::from_config(store, config)
        .verify_otp(&aadhaar, &request.otp)
        .await?;
    Ok(Json(Message::new("OTP verified")))
}

#[post("/auth/verify-face", data = "<request>", format = "json")]
pub async fn verify_face(
    id: &RequestId,
    request: Json<VerifyFaceRequest>,
    store: &State<StoreHandle>,
) -> Result<Json<VerifyFaceResponse>> {
    let aadhaar = Aadhaar::new(request.aadhaar.clone());
    debug!(
        "{id} Face check for {aadhaar} ({} bytes of payload)",
        request.image_base64.len()
    );

    let outcome = FaceGate::new(store)
        .verify_face(&aadhaar, &request.image_base64)
        .await?;
    Ok(Json(VerifyFaceResponse {
        message: "Face verified".to_string(),
        enrolled: outcome.enrolled,
    }))
}
