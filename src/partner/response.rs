use serde::Deserialize;
use serde_json::Value;

use crate::partner::PartnerError;

pub const PARTNER_SUCCESS_STATUS: i64 = 200;

/// Envelope every partner merchant endpoint answers with.
///
/// ```json
/// {"statusCode": 200, "message": "...", "errors": {...}, "result": {...}}
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerResponse<T> {
    pub status_code: i64,
    #[serde(default)]
    pub message: String,
    pub errors: Option<Value>,
    pub result: Option<T>,
}

impl<T> PartnerResponse<T> {
    pub fn is_error(&self) -> bool {
        self.status_code != PARTNER_SUCCESS_STATUS
    }

    pub fn into_result(self) -> Result<T, PartnerError> {
        if self.is_error() {
            return Err(PartnerError::Rejected {
                status_code: self.status_code,
                message: self.message,
                errors: self
                    .errors
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            });
        }
        self.result
            .ok_or_else(|| PartnerError::MalformedResponse("missing 'result'".to_owned()))
    }
}

/// `result.data` of the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResult {
    pub data: LoginData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub merchant_id: Option<i64>,
    pub access_token: String,
    pub expire_at: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejected_envelope_carries_message_and_errors() {
        let raw = json!({
            "statusCode": 422,
            "message": "The given data was invalid.",
            "errors": {"mobileNumber": [{"code": 4001, "message": "already taken"}]}
        });
        let resp: PartnerResponse<Value> = serde_json::from_value(raw).unwrap();
        assert!(resp.is_error());
        match resp.into_result() {
            Err(PartnerError::Rejected { status_code, message, errors }) => {
                assert_eq!(status_code, 422);
                assert_eq!(message, "The given data was invalid.");
                assert!(errors.contains("already taken"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn login_envelope_decodes_typed_data() {
        let raw = json!({
            "statusCode": 200,
            "message": "Logged in",
            "result": {"data": {"merchantId": 7, "accessToken": "tok", "expireAt": "2030-01-01 10:00:00"}}
        });
        let resp: PartnerResponse<LoginResult> = serde_json::from_value(raw).unwrap();
        let data = resp.into_result().unwrap().data;
        assert_eq!(data.merchant_id, Some(7));
        assert_eq!(data.access_token, "tok");
        assert_eq!(data.expire_at, "2030-01-01 10:00:00");
    }

    #[test]
    fn success_without_result_is_malformed() {
        let resp: PartnerResponse<Value> =
            serde_json::from_value(json!({"statusCode": 200, "message": "ok"})).unwrap();
        assert!(matches!(resp.into_result(), Err(PartnerError::MalformedResponse(_))));
    }
}
