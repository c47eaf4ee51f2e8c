pub mod provisioning;
pub mod validation;
