// Domain layer - Timeline data model and business rules

pub mod errors;
pub mod model;
pub mod rules;
