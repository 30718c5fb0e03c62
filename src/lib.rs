pub mod crd;
pub mod defaulter;
pub mod errors;
pub mod gateway;
pub mod gitops;
pub mod health;
pub mod lease;
pub mod managers;
pub mod phase;
pub mod teardown;
