//! duorpc server side.
//!
//! [`Server`] accepts connections on a well-known port and runs, per
//! connection, one reader task plus a fixed-size worker pool that parses
//! commands, invokes the registered [`Calculator`], and serializes replies
//! back onto the connection.

pub mod calc;
pub mod dispatcher;

pub use calc::{CalcError, Calculator, SlowCalculator};
pub use dispatcher::Server;
