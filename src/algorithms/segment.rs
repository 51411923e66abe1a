use crate::models::UserProfile;
use serde::{Deserialize, Serialize};

pub const SEGMENT_HEADER: &str = "x-bs-user-segment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    NewVisitor,
    HighValue,
    ReturningCustomer,
    BudgetConscious,
    ReturningVisitor,
}

impl Segment {
    pub fn classify(profile: Option<&UserProfile>) -> Self {
        let Some(profile) = profile else {
            return Segment::NewVisitor;
        };

        let average = profile.average_price();
        let conversions = profile.behavior.conversion_events;

        if profile.sessions <= 1 {
            Segment::NewVisitor
        } else if profile.sessions > 5 && average > 500.0 {
            Segment::HighValue
        } else if profile.sessions > 3 && conversions > 0 {
            Segment::ReturningCustomer
        } else if average < 100.0 {
            Segment::BudgetConscious
        } else {
            Segment::ReturningVisitor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::NewVisitor => "new_visitor",
            Segment::HighValue => "high_value",
            Segment::ReturningCustomer => "returning_customer",
            Segment::BudgetConscious => "budget_conscious",
            Segment::ReturningVisitor => "returning_visitor",
        }
    }
}
