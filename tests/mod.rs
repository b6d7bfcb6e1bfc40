mod common;
mod dispatch_tests;
mod idempotency_tests;
mod message_tests;
