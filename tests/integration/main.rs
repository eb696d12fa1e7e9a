//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises the bridge service against the recording
//! mocks in `mock_hw`. All tests run on the host with no hardware.

mod bridge_service_tests;
mod mock_hw;
mod rtu_stack_tests;
mod update_flow_tests;
