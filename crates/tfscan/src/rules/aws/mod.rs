use crate::registry::{RegistrationError, RegistryBuilder};

mod documentdb;
mod mq;

pub(crate) fn register(registry: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    registry.register(mq::no_public_access())?;
    registry.register(documentdb::enable_log_export())?;
    Ok(())
}
