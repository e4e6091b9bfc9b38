use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MyRating {
    pub recipe_id: Uuid,
    pub rating: Option<i16>,
}
