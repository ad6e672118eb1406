// [apps/control-plane/src/services/alert_manager.rs]
/*!
 * =================================================================
 * APARATO: ALERT HYSTERESIS MANAGER (V6.0 - GOLD MASTER)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: APERTURA/CIERRE DE 'offline_over_5m' POR CÁMARA
 *
 * # Mathematical Proof (Hysteresis):
 * La apertura exige offline sostenido: sin éxito previo registrado se
 * requieren >= 5 fallos consecutivos; con éxito previo, una distancia
 * mayor a 5 minutos. El cierre solo ocurre con un online observado.
 * Entre ambos umbrales el gestor es un no-op, evitando el aleteo.
 * =================================================================
 */

use crate::state::AppState;
use chrono::{Duration, Utc};
use sentinela_domain_models::{HealthSnapshot, HealthStatus, ALERT_TYPE_OFFLINE_OVER_5M};
use sentinela_infra_db::repositories::AlertOpenOutcome;
use tracing::{error, instrument};

/// Umbral de fallos consecutivos cuando jamás hubo un éxito registrado.
const OFFLINE_FAILURE_THRESHOLD: i64 = 5;
/// Distancia mínima al último éxito para declarar el offline sostenido.
const OFFLINE_SUSTAIN_MINUTES: i64 = 5;

pub struct AlertManager {
    application_state: AppState,
}

impl AlertManager {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /**
     * Evalúa el resultado de un sondeo de cámara contra la histéresis.
     * Los fallos de persistencia se loggean y se tragan: el gestor jamás
     * propaga errores hacia el dispatcher del scheduler.
     */
    #[instrument(skip(self, snapshot))]
    pub async fn evaluate_camera_probe(&self, snapshot: &HealthSnapshot) {
        let alert_repository = &self.application_state.alert_repository;

        let open_alert = match alert_repository
            .fetch_open(snapshot.target_id, ALERT_TYPE_OFFLINE_OVER_5M)
            .await
        {
            Ok(open_alert) => open_alert,
            Err(repo_fault) => {
                error!("❌ [ALERT_MANAGER]: Open-alert lookup failed: {}", repo_fault);
                return;
            }
        };

        match (open_alert, snapshot.status) {
            // CIERRE: alerta abierta + online observado.
            (Some(_), HealthStatus::Online) => {
                if let Err(repo_fault) = alert_repository
                    .close_open(snapshot.target_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
                    .await
                {
                    error!("❌ [ALERT_MANAGER]: Alert close failed: {}", repo_fault);
                }
            }

            // APERTURA: sin alerta + offline sostenido.
            (None, HealthStatus::Offline) => {
                if !Self::is_sustained_offline(snapshot) {
                    return;
                }

                match alert_repository
                    .open_if_absent(snapshot.tenant_id, snapshot.target_id, ALERT_TYPE_OFFLINE_OVER_5M, Utc::now())
                    .await
                {
                    Ok(AlertOpenOutcome::Opened(_)) | Ok(AlertOpenOutcome::AlreadyOpen(_)) => {}
                    Err(repo_fault) => {
                        error!("❌ [ALERT_MANAGER]: Alert open failed: {}", repo_fault);
                    }
                }
            }

            // Resto del plano: no-op (histéresis).
            _ => {}
        }
    }

    /// Condición de offline sostenido de la histéresis.
    fn is_sustained_offline(snapshot: &HealthSnapshot) -> bool {
        match snapshot.last_success_at {
            None => snapshot.consecutive_failures >= OFFLINE_FAILURE_THRESHOLD,
            Some(last_success_stamp) => {
                Utc::now() - last_success_stamp > Duration::minutes(OFFLINE_SUSTAIN_MINUTES)
            }
        }
    }
}
