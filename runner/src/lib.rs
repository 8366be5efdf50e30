//! Library half of the `runner` binary: the sample peripheral, split out so
//! integration tests can assemble and run programs the same way `main`
//! does without spawning the binary.

pub mod peripheral;

pub use peripheral::SamplePeripheral;
