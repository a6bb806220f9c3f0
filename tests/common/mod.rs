// Each test binary uses a different slice of the fixture.
#![allow(dead_code)]

pub mod fake_transport;
