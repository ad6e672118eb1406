// [apps/control-plane/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: SERVICE REGISTRY (V7.0 - SINGULARITY)
 * CLASIFICACIÓN: SERVICE LAYER (ESTRATO L2/L4)
 * RESPONSABILIDAD: MATRIZ DE SERVICIOS Y DAEMONS DEL PLANO DE CONTROL
 * =================================================================
 */

pub mod authz;
pub mod tokens;
pub mod vault;
pub mod alert_manager;
pub mod health_scheduler;
pub mod event_poller;
pub mod live_orchestrator;
pub mod cache_sweeper;

pub use alert_manager::AlertManager;
pub use cache_sweeper::spawn_cache_sweeper;
pub use event_poller::EventPollerService;
pub use health_scheduler::HealthSchedulerService;
pub use live_orchestrator::LiveSessionOrchestrator;
pub use tokens::TokenForge;
pub use vault::{CredentialVaultService, VaultReadOutcome};
