pub mod audit;
pub mod conflict;
pub mod lifecycle;
pub mod presenter;
pub mod rules;
pub mod scheduling;
