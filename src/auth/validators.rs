use super::models::{CredentialsRequest, SignupRequest};
use crate::common::validation::validate_credentials;
use crate::common::{ValidationResult, Validator};

impl Validator<SignupRequest> for SignupRequest {
    fn validate(&self, data: &SignupRequest) -> ValidationResult {
        validate_credentials(&data.email, &data.password)
    }
}

impl Validator<CredentialsRequest> for CredentialsRequest {
    fn validate(&self, data: &CredentialsRequest) -> ValidationResult {
        validate_credentials(&data.email, &data.password)
    }
}
