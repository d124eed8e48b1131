//! Wizard flow: step navigation and the pricing sub-form.

pub mod controller;
pub mod pricing;

pub use controller::{STEP_ERROR_KEY, Transition, WizardController};
pub use pricing::{PriceField, Pricing};
