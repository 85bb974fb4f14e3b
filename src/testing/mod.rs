//! Test doubles shared by unit tests across modules.

mod mocks;

pub use mocks::{CountingSource, FakeTools};
