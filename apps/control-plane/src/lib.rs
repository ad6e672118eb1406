// [apps/control-plane/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CONTROL PLANE LIBRARY ROOT (V8.0 - SINGULARITY)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE MÓDULOS DEL PLANO DE CONTROL
 * =================================================================
 */

pub mod config;
pub mod errors;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod services;
pub mod handlers;

pub mod prelude {
    pub use crate::config::ControlPlaneConfig;
    pub use crate::errors::ApiError;
    pub use crate::kernel::ControlPlaneKernel;
    pub use crate::middleware::OperatorIdentity;
    pub use crate::routes::create_control_plane_router;
    pub use crate::state::AppState;
}
