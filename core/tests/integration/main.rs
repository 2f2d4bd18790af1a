//! Integration tests for the dispatcher, run against a recording mock board.
//!
//! Everything runs on the host; the event queue's critical section comes
//! from the `std` implementation enabled in dev-dependencies.

mod dispatcher_tests;
mod mock_board;
