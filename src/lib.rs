// orderhook - webhook reliability pipeline for order events
//
// Verifies signed inbound webhooks against a remote key set, suppresses
// duplicates and replays, and delivers accepted payloads through a retry
// queue that raises operator alerts on repeated failure.

mod app;
mod error;

pub use app::App;
pub use error::{AppError, AppResult};

// Re-export member crates
pub use orderhook_audit as audit;
pub use orderhook_config as config;
pub use orderhook_log as log;
pub use orderhook_queue as queue;
pub use orderhook_webhooks as webhooks;

// Prelude for common imports
pub mod prelude {
    pub use crate::{App, AppError, AppResult};
    pub use orderhook_audit::{
        AlertPolicy, AlertRecord, AlertSink, AlertStore, AuditRecord, AuditStore,
    };
    pub use orderhook_config::Settings;
    pub use orderhook_queue::{
        BackoffPolicy, Deliverer, JobStatus, Processor, ProcessorConfig, QueueJob, QueueStore,
        Worker,
    };
    pub use orderhook_webhooks::{
        DeliverySender, ReceiveError, ReceiveOutcome, SignatureHeaders, SignatureVerifier,
        VerificationError, WebhookReceiver, WebhookServer,
    };
}
