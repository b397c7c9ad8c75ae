//! Audit trail and operator alerts for orderhook
//!
//! Two separate failure records live here:
//!
//! - **Audit records** - one per rejected inbound webhook (bad signature,
//!   replay, unconfigured verifier). Append-only.
//! - **Alert records** - raised by the [`AlertSink`] when outbound delivery
//!   keeps failing, rate limited by an [`AlertPolicy`].
//!
//! # Quick Start
//!
//! ```no_run
//! use orderhook_audit::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let audit = MemoryAuditStore::new();
//! audit.create(&AuditRecord::new("invalid_signature", "9f86d081")).await?;
//!
//! let sink = AlertSink::new(Arc::new(MemoryAlertStore::new()), AlertPolicy::default());
//! sink.notify(&FailureNotice::new("evt_1", "delivery_failed", "status 503", 2)).await;
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod error;
pub mod record;
pub mod sink;
pub mod store;

pub use alert::*;
pub use error::{AuditError, Result};
pub use record::*;
pub use sink::*;
pub use store::*;
