// [apps/control-plane/src/services/live_orchestrator.rs]
/*!
 * =================================================================
 * APARATO: LIVE SESSION ORCHESTRATOR (V14.0 - SINGULARITY GOLD)
 * CLASIFICACIÓN: CORE SERVICE (ESTRATO L2/L4)
 * RESPONSABILIDAD: PROTOCOLO DE ARRANQUE WEBRTC CON FALLBACK HLS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ORDERED PROTOCOL: autorizar -> compuerta de códec -> ingesta ->
 *    sala SFU -> allocación RTP -> egreso -> ensure HLS -> ensamblado.
 *    Cada paso es idempotente respecto del mismo viewer-session.
 * 2. DETERMINISTIC FALLBACK: Todo colapso elegible degrada a HLS y queda
 *    contado; la sala llena es TERMINAL (429, sin fallback).
 * 3. GLOBAL DEADLINE: La secuencia completa dispone de 10s; el vencido
 *    renderiza ERR_TIMEOUT.
 * 4. RE-ENTRY SAFE: Un arranque nuevo sobre la misma (tenant, cámara) no
 *    cancela al previo: los arranques del plano de datos pliegan.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::services::authz::authorize_camera;
use crate::services::vault::CredentialVaultService;
use crate::state::AppState;
use chrono::{Duration as ChronoDuration, Utc};
use sentinela_domain_models::{
    permissions, Camera, CodecKind, CredentialOwnerKind, FallbackPolicy, HlsDescriptor,
    LiveStartResponse, LiveViewMode, LiveViewSession, OrchestrationFault, WebRtcDescriptor,
};
use sentinela_infra_dataplane::DataplaneError;
use sentinela_infra_db::TenantScope;
use sentinela_infra_probe::inject_rtsp_credentials;
use std::sync::atomic::Ordering;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct LiveSessionOrchestrator {
    application_state: AppState,
}

/// Resultado interno de la rama WebRTC del protocolo.
enum WebRtcBranchOutcome {
    /// Rama completa: sala unida, egreso RTP activo.
    Primary(WebRtcDescriptor),
    /// Colapso elegible para degradar a HLS.
    Degraded,
}

impl LiveSessionOrchestrator {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /**
     * Protocolo de arranque completo para `(tenant, user, camera)`.
     */
    #[instrument(skip(self, scope), fields(camera = %camera_id))]
    pub async fn start_live_session(
        &self,
        scope: &TenantScope,
        user_id: Uuid,
        camera_id: Uuid,
    ) -> Result<LiveStartResponse, ApiError> {
        // PASO 1: AUTORIZACIÓN (no-enumeración en el deny).
        let camera = authorize_camera(&self.application_state, scope, user_id, camera_id, permissions::CAMERA_VIEW).await?;

        let viewer_session_id = Uuid::new_v4();

        // PASOS 2-8 BAJO EL DEADLINE GLOBAL DE LA SECUENCIA.
        let sequence_verdict = tokio::time::timeout(
            self.application_state.config.live_start_deadline,
            self.execute_start_sequence(scope, user_id, &camera, viewer_session_id),
        ).await;

        match sequence_verdict {
            Ok(protocol_result) => protocol_result,
            Err(_) => Err(ApiError::Timeout),
        }
    }

    async fn execute_start_sequence(
        &self,
        scope: &TenantScope,
        user_id: Uuid,
        camera: &Camera,
        viewer_session_id: Uuid,
    ) -> Result<LiveStartResponse, ApiError> {
        let config = self.application_state.config.clone();

        // PASO 2: COMPUERTA DE CÓDEC (lectura bajo el alcance del tenant).
        let selected_main_profile = self.application_state.media_repository
            .fetch_selected_main_profile(scope, camera.id)
            .await?;

        let main_codec = selected_main_profile
            .as_ref()
            .map(|profile| profile.codec)
            .unwrap_or(CodecKind::Unknown);

        let is_webrtc_eligible = main_codec.is_webrtc_eligible();

        // PASO 3: INGESTA ASEGURADA (idempotente; running == éxito).
        let resolved_rtsp_url = self.resolve_ingest_url(camera, selected_main_profile.as_ref().map(|p| p.sanitized_rtsp_url.as_str())).await;
        let ingest_started = self.application_state.media_plane
            .start_ingest(camera.id, &resolved_rtsp_url, true)
            .await;

        let ingest_available = match ingest_started {
            Ok(_) => true,
            Err(ingest_fault) => {
                warn!("⚠️ [LIVE_ORCHESTRATOR]: Ingest start degraded: {}", ingest_fault);
                false
            }
        };

        // PASOS 4-6: RAMA WEBRTC (solo con códec elegible e ingesta viva).
        let webrtc_outcome = if is_webrtc_eligible && ingest_available {
            self.execute_webrtc_branch(scope, camera, viewer_session_id).await?
        } else {
            WebRtcBranchOutcome::Degraded
        };

        // PASO 7: ENSURE HLS (primario degradado o respaldo del primario).
        let hls_descriptor = self.ensure_hls_descriptor(scope, user_id, camera, viewer_session_id).await;

        // PASO 8: ENSAMBLADO DE LA RESPUESTA.
        let now = Utc::now();
        let expires_at = now + ChronoDuration::from_std(config.viewer_session_lifetime)
            .unwrap_or(ChronoDuration::seconds(300));

        let (primary_mode, fallback_mode, webrtc_descriptor) = match webrtc_outcome {
            WebRtcBranchOutcome::Primary(descriptor) => {
                (LiveViewMode::Webrtc, Some(LiveViewMode::Hls), Some(descriptor))
            }
            WebRtcBranchOutcome::Degraded => {
                self.application_state.fallback_counter.fetch_add(1, Ordering::Relaxed);
                (LiveViewMode::Hls, None, None)
            }
        };

        // Degradación total: sin WebRTC y sin playlist no hay sesión viable.
        if primary_mode == LiveViewMode::Hls && hls_descriptor.is_none() {
            return Err(ApiError::Orchestration(OrchestrationFault {
                step: "hls_ensure".into(),
                error_code: "ERR_MEDIA_UNAVAILABLE".into(),
                safe_message: "Live media pipeline is unavailable for this camera.".into(),
                required_action: Some("retry_later".into()),
                fallback_hint: None,
                fallback_url: None,
            }));
        }

        // Rastro efímero de la sesión del visor.
        let viewer_session = LiveViewSession {
            id: viewer_session_id,
            tenant_id: scope.tenant_id(),
            user_id,
            camera_id: camera.id,
            mode: primary_mode,
            created_at: now,
            last_seen_at: now,
            fallback_count: 0,
        };
        self.application_state.live_sessions.insert(viewer_session_id, viewer_session);

        info!(
            "🎬 [LIVE_ORCHESTRATOR]: Session {} assembled (primary={}).",
            viewer_session_id,
            primary_mode.as_str()
        );

        Ok(LiveStartResponse {
            viewer_session_id,
            expires_at,
            primary: primary_mode,
            fallback: fallback_mode,
            webrtc: webrtc_descriptor,
            hls: hls_descriptor,
            fallback_policy: FallbackPolicy::default(),
        })
    }

    /// PASOS 4-6: sala, allocación RTP y egreso del Media Plane.
    async fn execute_webrtc_branch(
        &self,
        scope: &TenantScope,
        camera: &Camera,
        viewer_session_id: Uuid,
    ) -> Result<WebRtcBranchOutcome, ApiError> {
        let room_id = format!("{}:{}", scope.tenant_id(), camera.id);

        // PASO 4: SALA SFU. La sala llena es terminal (sin fallback).
        let join_grant = match self.application_state.sfu.join_room(&room_id, viewer_session_id).await {
            Ok(join_grant) => join_grant,
            Err(DataplaneError::RoomAtCapacity { limit }) => {
                return Err(ApiError::RoomFull { limit });
            }
            Err(join_fault) => {
                warn!("⚠️ [LIVE_ORCHESTRATOR]: SFU join degraded: {}", join_fault);
                return Ok(WebRtcBranchOutcome::Degraded);
            }
        };

        // PASO 5: ALLOCACIÓN RTP PARA EL MEDIA PLANE.
        let rtp_allocation = match self.application_state.sfu.prepare_ingest(&room_id).await {
            Ok(rtp_allocation) => rtp_allocation,
            Err(prepare_fault) => {
                warn!("⚠️ [LIVE_ORCHESTRATOR]: RTP allocation degraded: {}", prepare_fault);
                return Ok(WebRtcBranchOutcome::Degraded);
            }
        };

        // PASO 6: EGRESO RTP (idempotente por cámara+sala).
        let egress_verdict = self.application_state.media_plane
            .start_sfu_rtp_egress(
                camera.id,
                &room_id,
                rtp_allocation.ssrc,
                rtp_allocation.payload_type,
                &rtp_allocation.ip,
                rtp_allocation.port,
            )
            .await;

        if let Err(egress_fault) = egress_verdict {
            warn!("⚠️ [LIVE_ORCHESTRATOR]: RTP egress degraded: {}", egress_fault);
            return Ok(WebRtcBranchOutcome::Degraded);
        }

        Ok(WebRtcBranchOutcome::Primary(WebRtcDescriptor {
            sfu_url: self.application_state.sfu.public_url().to_string(),
            room: room_id,
            rtp_caps: join_grant.rtp_caps,
            connect_timeout_ms: 5_000,
        }))
    }

    /**
     * PASO 7: asegura la ingesta y deriva la playlist HLS, sondeando el
     * estado cada 500ms hasta 5s si el worker aún calienta.
     */
    async fn ensure_hls_descriptor(
        &self,
        scope: &TenantScope,
        user_id: Uuid,
        camera: &Camera,
        viewer_session_id: Uuid,
    ) -> Option<HlsDescriptor> {
        let config = &self.application_state.config;

        // Consulta directa: la ingesta pudo quedar viva en el paso 3.
        if let Ok(ingest_status) = self.application_state.media_plane.get_ingest_status(camera.id).await {
            if ingest_status.running {
                if let Some(ingest_session_id) = ingest_status.session_id {
                    return Some(self.assemble_hls_descriptor(scope, user_id, camera, viewer_session_id, &ingest_session_id));
                }
            }
        }

        // Arranque idempotente + sondeo del calentamiento.
        let resolved_rtsp_url = self.resolve_ingest_url(camera, None).await;
        let _ = self.application_state.media_plane.start_ingest(camera.id, &resolved_rtsp_url, true).await;

        let poll_deadline = tokio::time::Instant::now() + config.hls_ensure_poll_budget;
        while tokio::time::Instant::now() < poll_deadline {
            tokio::time::sleep(config.hls_ensure_poll_interval).await;

            if let Ok(ingest_status) = self.application_state.media_plane.get_ingest_status(camera.id).await {
                if ingest_status.running {
                    if let Some(ingest_session_id) = ingest_status.session_id {
                        return Some(self.assemble_hls_descriptor(scope, user_id, camera, viewer_session_id, &ingest_session_id));
                    }
                }
            }
        }

        None
    }

    fn assemble_hls_descriptor(
        &self,
        scope: &TenantScope,
        user_id: Uuid,
        camera: &Camera,
        viewer_session_id: Uuid,
        ingest_session_id: &str,
    ) -> HlsDescriptor {
        let playlist_url = format!(
            "/hls/live/{}/{}/{}/playlist.m3u8",
            scope.tenant_id(),
            camera.id,
            ingest_session_id
        );

        // Firma de segmentos para el servidor HLS (canon hls|cam|sid|exp).
        let expires_epoch = (Utc::now() + ChronoDuration::minutes(10)).timestamp();
        let signature_query = self.application_state.token_forge
            .sign_hls_query(user_id, camera.id, viewer_session_id, expires_epoch);

        HlsDescriptor {
            playlist_url,
            target_latency_ms: self.application_state.config.hls_target_latency_ms,
            signature_query: Some(signature_query),
        }
    }

    /**
     * Resolución de la URL de ingesta: loopback -> mock; selección ->
     * canon saneado con credenciales reinyectadas de la bóveda; sin
     * selección -> ruta de fábrica.
     */
    async fn resolve_ingest_url(&self, camera: &Camera, selected_sanitized_url: Option<&str>) -> String {
        if camera.ip_address == "127.0.0.1" {
            return format!("mock://{}", camera.id);
        }

        let sanitized_url = match selected_sanitized_url {
            Some(selection_url) => selection_url.to_string(),
            None => format!("rtsp://{}:{}/live", camera.ip_address, camera.rtsp_port),
        };

        // Reinyección en el instante de la llamada, jamás persistida.
        let vault = CredentialVaultService::new(self.application_state.clone());
        match vault.reveal_for_system(CredentialOwnerKind::Camera, camera.id).await {
            Some(credential) => {
                inject_rtsp_credentials(&sanitized_url, &credential.username, &credential.password)
                    .unwrap_or(sanitized_url)
            }
            None => sanitized_url,
        }
    }

    /**
     * Abandono de la sesión: detiene el egreso (fallo loggeado y tragado
     * para que la limpieza continúe) y abandona la sala del SFU.
     */
    #[instrument(skip(self, scope))]
    pub async fn leave(
        &self,
        scope: &TenantScope,
        camera_id: Uuid,
        viewer_session_id: Uuid,
    ) -> Result<(), ApiError> {
        if let Err(egress_stop_fault) = self.application_state.media_plane.stop_sfu_rtp_egress(camera_id).await {
            warn!("⚠️ [LIVE_ORCHESTRATOR]: Egress stop swallowed during leave: {}", egress_stop_fault);
        }

        let room_id = format!("{}:{}", scope.tenant_id(), camera_id);
        self.application_state.sfu
            .leave_room(&room_id, viewer_session_id)
            .await
            .map_err(|leave_fault| ApiError::ExternalUnavailable(leave_fault.to_string()))?;

        Ok(())
    }
}
