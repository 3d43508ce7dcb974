//! bundled checks
//!
//! One module per provider, one file per service. Every check is a plain `fn` with the [Check]
//! signature so it can be registered without boxing a closure.
//!
//! [Check]: crate::rule::Check
use crate::registry::{RegistrationError, RegistryBuilder};

mod aws;
mod google;

/// Register every bundled rule
pub fn register_all(registry: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    aws::register(registry)?;
    google::register(registry)?;
    Ok(())
}
