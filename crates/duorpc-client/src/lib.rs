//! duorpc client side.
//!
//! [`CalculatorProxy`] keeps one persistent connection to the server and
//! offers two access patterns for the same operation: a push-style callback
//! ([`increment_async`](CalculatorProxy::increment_async)) and a pull-style
//! deferred-result handle ([`increment`](CalculatorProxy::increment)). Both
//! are adapters over the one-shot result cell in [`bridge`].
//!
//! If the connection is lost the proxy cannot be reused; create a new one.

pub mod bridge;
pub mod proxy;

pub use bridge::{Callback, ResultHandle};
pub use proxy::CalculatorProxy;
