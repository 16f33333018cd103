//! Pipeline integration tests.
//!
//! Builds handler chains through the command processor and checks how
//! declared steps wrap the handler body:
//! - step ordering and short-circuits
//! - the built-in steps (validation, retry, breaker, fallback, switches, timeout)
//! - the processor-wide inbox

mod ordering;
