// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY (V6.0 - SINGULARITY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: MATRIZ DE ACCESO A LOS REPOSITORIOS TÁCTICOS
 * =================================================================
 */

pub mod cameras;
pub mod media;
pub mod nvrs;
pub mod channels;
pub mod credentials;
pub mod health;
pub mod alerts;
pub mod poll_state;
pub mod rbac;
pub mod refresh_tokens;
pub mod discovery;

pub use cameras::CameraRepository;
pub use media::MediaRepository;
pub use nvrs::NvrRepository;
pub use channels::ChannelRepository;
pub use credentials::{CredentialRepository, StoredCredentialRow};
pub use health::{HealthRepository, ProbeOutcomeRecord};
pub use alerts::{AlertRepository, AlertOpenOutcome};
pub use poll_state::PollStateRepository;
pub use rbac::{RbacRepository, UserAccountRow};
pub use refresh_tokens::{RefreshTokenRepository, RotationOutcome};
pub use discovery::DiscoveryRepository;
