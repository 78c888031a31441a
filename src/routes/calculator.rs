//! Calculator Endpoint
//!
//! DB 없이 동작하는 순수 계산 엔드포인트

use axum::Json;

use crate::{
    error::ApiError,
    services::{calculate_heat_pump_savings, lead_validation::validate_property, PropertyInput, SavingsResult},
};

/// POST /calculator/heat-pump
///
/// # Request
///
/// ```json
/// {
///   "square_meters": 120,
///   "ceiling_height": 2.4,
///   "residents": 3,
///   "current_heating_type": "oil",
///   "annual_heating_cost": 24000
/// }
/// ```
pub async fn calculate(Json(input): Json<PropertyInput>) -> Result<Json<SavingsResult>, ApiError> {
    let errors = validate_property(&input);
    if !errors.is_empty() {
        return Err(ApiError::ValidationError(errors));
    }

    let result = calculate_heat_pump_savings(&input);
    tracing::debug!(
        heating = %input.current_heating_type,
        annual_savings = result.annual_savings,
        "Savings calculated"
    );

    Ok(Json(result))
}
