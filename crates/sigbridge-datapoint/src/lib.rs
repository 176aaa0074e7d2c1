//! `sigbridge-datapoint` – access to the vehicle data broker.
//!
//! The broker owns every signal; this crate only defines how the rest of
//! the system reads them.
//!
//! - [`source`] – the [`DataPointSource`] seam: point-in-time reads and
//!   change subscriptions.
//! - [`sim`] – an in-process [`SimDataPointSource`] for headless tests and
//!   local runs without a real broker.

pub mod sim;
pub mod source;

pub use sim::SimDataPointSource;
pub use source::DataPointSource;
