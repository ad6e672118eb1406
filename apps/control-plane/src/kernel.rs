// [apps/control-plane/src/kernel.rs]
/**
 * =================================================================
 * APARATO: CONTROL PLANE SOVEREIGN KERNEL (V15.0 - GUARD ACTIVE)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios: DB,
 * keyring, bus, daemons de salud/eventos/barrido y el transporte Axum.
 * El canal de apagado (watch) gobierna la cancelación: los bucles de
 * despacho sellan dentro de un tick; los sondeos en vuelo agotan su
 * deadline propio y expiran.
 * =================================================================
 */

use crate::config::ControlPlaneConfig;
use crate::routes::create_control_plane_router;
use crate::services::{spawn_cache_sweeper, EventPollerService, HealthSchedulerService};
use crate::state::AppState;
use sentinela_core_keyring::MasterKeyring;
use sentinela_infra_db::VmsDbClient;
use sentinela_infra_event_bus::{EventBusPublisher, HttpBusPublisher};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

pub struct ControlPlaneKernel {
    pub application_state: AppState,
    shutdown_transmitter: watch::Sender<bool>,
}

impl ControlPlaneKernel {
    /**
     * Realiza la ignición del cliente táctico, el keyring y el estado.
     * Establece la conexión a la base ANTES de levantar servicios.
     */
    pub async fn ignite(config: ControlPlaneConfig) -> Self {
        let database_client = VmsDbClient::connect(&config.database_url, config.database_token.clone())
            .await
            .expect("FATAL: Database link collapse. Ignition aborted.");

        let keyring = MasterKeyring::from_env()
            .expect("FATAL: Master keyring material unreadable. Ignition aborted.");

        let bus_publisher: Arc<dyn EventBusPublisher> = Arc::new(HttpBusPublisher::new(
            config.bus_gateway_url.clone(),
            config.bus_gateway_token.clone(),
        ));

        let (shutdown_transmitter, _) = watch::channel(false);

        Self {
            application_state: AppState::new(config, database_client, keyring, bus_publisher),
            shutdown_transmitter,
        }
    }

    /**
     * Lanza los daemons autónomos y el servidor HTTP principal. Bloquea
     * hasta el apagado del transporte.
     */
    pub async fn launch_sovereign_operations(self) {
        let shared_application_state = self.application_state.clone();
        let shutdown_receiver = self.shutdown_transmitter.subscribe();

        // --- 1. SCHEDULER DE SALUD (3 POOLS ACOTADOS) ---
        HealthSchedulerService::new(shared_application_state.clone())
            .spawn(shutdown_receiver.clone());

        // --- 2. POLLER DE EVENTOS DE FABRICANTE ---
        EventPollerService::new(shared_application_state.clone())
            .spawn(shutdown_receiver.clone());

        // --- 3. HIGIENE DE CACHES TTL ---
        spawn_cache_sweeper(shared_application_state.clone(), shutdown_receiver);

        // --- 4. APAGADO ORDENADO (SIGINT) ---
        let signal_transmitter = self.shutdown_transmitter.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 [KERNEL]: Interrupt received; broadcasting shutdown.");
                let _ = signal_transmitter.send(true);
            }
        });

        // --- 5. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let control_plane_router = create_control_plane_router(shared_application_state.clone());

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("FATAL: Bind address literal."),
            shared_application_state.config.listening_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Sentinela Control Plane listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        let mut serve_shutdown = self.shutdown_transmitter.subscribe();
        let serve_verdict = axum::serve(tcp_listener, control_plane_router)
            .with_graceful_shutdown(async move {
                let _ = serve_shutdown.changed().await;
            })
            .await;

        if let Err(server_error) = serve_verdict {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }
    }
}
