//! In-process simulated data broker for CI and local runs.
//!
//! [`SimDataPointSource`] holds a current-value map and broadcasts a
//! [`SignalChange`] on every mutation, so the full stack can run headless
//! without a real vehicle data broker.
//!
//! # Example
//!
//! ```rust
//! use sigbridge_datapoint::SimDataPointSource;
//! use sigbridge_types::SignalValue;
//!
//! let source = SimDataPointSource::new()
//!     .with_signal("Vehicle.Speed", SignalValue::Float(0.0));
//!
//! source
//!     .set_value("Vehicle.Speed", SignalValue::Float(42.0))
//!     .expect("sim set must succeed");
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use sigbridge_types::{BridgeError, SignalChange, SignalValue};
use tokio::sync::broadcast;
use tracing::warn;

use crate::source::DataPointSource;

/// Buffered change notifications per subscriber before old ones are dropped.
const CHANGE_CAPACITY: usize = 256;

/// Simulated data broker. The test or demo driving it plays the vehicle:
/// call [`set_value`][Self::set_value] to mutate a signal and every change
/// subscriber is notified.
pub struct SimDataPointSource {
    values: RwLock<HashMap<String, SignalValue>>,
    changes: broadcast::Sender<SignalChange>,
}

impl SimDataPointSource {
    /// Create an empty simulated source.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Seed a signal with an initial value (builder-style).
    pub fn with_signal(self, signal_path: impl Into<String>, initial: SignalValue) -> Self {
        let path = signal_path.into();
        if let Err(e) = self.set_value(&path, initial) {
            warn!(signal = %path, error = %e, "failed to seed sim signal");
        }
        self
    }

    /// Mutate a signal and notify every change subscriber. Signals not
    /// seeded up front spring into existence on first write, like data
    /// points appearing on a live broker.
    pub fn set_value(&self, signal_path: &str, value: SignalValue) -> Result<(), BridgeError> {
        {
            let mut values = self
                .values
                .write()
                .map_err(|_| BridgeError::Channel("sim value store poisoned".to_string()))?;
            values.insert(signal_path.to_string(), value.clone());
        }
        // No subscribers is a normal condition during startup.
        let _ = self.changes.send(SignalChange {
            signal: signal_path.to_string(),
            value,
        });
        Ok(())
    }
}

impl Default for SimDataPointSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataPointSource for SimDataPointSource {
    async fn get_current(&self, signal_path: &str) -> Result<SignalValue, BridgeError> {
        let values = self
            .values
            .read()
            .map_err(|_| BridgeError::Channel("sim value store poisoned".to_string()))?;
        values
            .get(signal_path)
            .cloned()
            .ok_or_else(|| BridgeError::SignalFetch {
                signal: signal_path.to_string(),
                reason: "unknown data point".to_string(),
            })
    }

    async fn subscribe_changes(
        &self,
        signal_path: &str,
    ) -> Result<BoxStream<'static, SignalChange>, BridgeError> {
        let signal = signal_path.to_string();
        let rx = self.changes.subscribe();
        Ok(Box::pin(stream::unfold(rx, move |mut rx| {
            let signal = signal.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(change) if change.signal == signal => return Some((change, rx)),
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(signal = %signal, lagged_by = n, "change subscriber lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        })))
    }
}
