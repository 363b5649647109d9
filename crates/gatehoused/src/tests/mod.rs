//! Test suites for the Gatehouse daemon.

mod socket_behaviour;
pub(crate) mod support;
