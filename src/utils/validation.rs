use validator::Validate;

use crate::errors::AppError;

pub fn validate_payload<T: Validate>(payload: &T, context: &str) -> Result<(), AppError> {
    payload.validate()
        .map_err(|err| AppError::BadRequest(format!("{}: {}", context, err)))
}
