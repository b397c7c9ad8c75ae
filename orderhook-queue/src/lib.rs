//! Outbound delivery queue for orderhook.
//!
//! Accepted webhook events become [`QueueJob`]s. A [`Processor`] pulls due
//! jobs in batches, hands each to a [`Deliverer`], and reschedules failures
//! with capped exponential backoff until the attempt budget runs out.
//!
//! ## Processing a batch
//!
//! ```
//! use orderhook_queue::*;
//! use std::sync::Arc;
//!
//! struct Print;
//!
//! #[async_trait::async_trait]
//! impl Deliverer for Print {
//!     async fn deliver(&self, job: &QueueJob) -> QueueResult<()> {
//!         println!("delivering {}", job.event_id);
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let store = MemoryQueueStore::new();
//! store.create(&QueueJob::new("evt_1", r#"{"event_id":"evt_1"}"#)).await.unwrap();
//!
//! let processor = Processor::new(Arc::new(store.clone()), ProcessorConfig::default());
//! assert_eq!(processor.process_once(&Print).await.unwrap(), 1);
//! # });
//! # }
//! ```
//!
//! ## Backoff
//!
//! ```
//! use orderhook_queue::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new(Duration::from_secs(60), 5);
//! assert_eq!(policy.delay(1), Duration::from_secs(60));
//! assert_eq!(policy.delay(4), Duration::from_secs(480));
//! assert_eq!(policy.delay(9), Duration::from_secs(960));
//! ```

pub mod backoff;
pub mod dead_letter;
pub mod error;
pub mod job;
pub mod processor;
pub mod store;
pub mod worker;

pub use backoff::BackoffPolicy;
pub use dead_letter::{DeadLetterEntry, DeadLetterQueue, DeadLetterStore, MemoryDeadLetterStore};
pub use error::{QueueError, QueueResult};
pub use job::{JobId, JobStatus, QueueJob};
pub use processor::{DELIVERY_FAILED, Deliverer, FailureObserver, Processor, ProcessorConfig};
pub use store::{MemoryQueueStore, QueueStore};
pub use worker::{Worker, WorkerConfig, WorkerHandle};
