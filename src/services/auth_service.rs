use crate::{error::ServiceError, state::SharedState};

/// Check the token an operator or host request presented.
pub fn verify_admin_token(state: &SharedState, provided: Option<&str>) -> Result<(), ServiceError> {
    match provided {
        None => Err(ServiceError::Unauthorized(
            "missing admin token header `X-Admin-Token`".into(),
        )),
        Some(token) if token == state.admin_token() => Ok(()),
        Some(_) => Err(ServiceError::Unauthorized("invalid admin token".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{TEST_TOKEN, test_state};

    #[test]
    fn only_the_configured_token_passes() {
        let state = test_state();
        assert!(verify_admin_token(&state, Some(TEST_TOKEN)).is_ok());
        assert!(matches!(
            verify_admin_token(&state, Some("guess")),
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            verify_admin_token(&state, None),
            Err(ServiceError::Unauthorized(_))
        ));
    }
}
