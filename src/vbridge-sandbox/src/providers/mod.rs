pub mod embedded;
#[cfg(feature = "native-vm")]
pub mod native_vm;
pub mod none;
pub mod worker;
