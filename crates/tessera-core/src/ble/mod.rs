pub mod aci;
pub mod driver;
pub mod setup;

pub use driver::{Nrf8001, TestPhase};
