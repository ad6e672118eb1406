// [apps/control-plane/src/handlers/mod.rs]
/*!
 * =================================================================
 * APARATO: HANDLER REGISTRY (V8.0 - SINGULARITY)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: MATRIZ DE HANDLERS DEL PLANO DE CONTROL
 * =================================================================
 */

pub mod auth;
pub mod cameras;
pub mod credentials;
pub mod live;
pub mod nvrs;
pub mod detections;
pub mod internal;
pub mod discovery;
