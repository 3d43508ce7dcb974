use crate::registry::{RegistrationError, RegistryBuilder};

mod compute;

pub(crate) fn register(registry: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    registry.register(compute::disk_encryption_customer_key())?;
    registry.register(compute::no_plaintext_vm_disk_keys())?;
    Ok(())
}
