// [apps/control-plane/src/main.rs]
/*!
 * =================================================================
 * APARATO: CONTROL PLANE MAIN ENTRY POINT (V9.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que el keyring y el enlace de base de datos
 * estén vivos ANTES de la apertura del socket TCP, previniendo estados
 * de carrera donde un operador arranque una sesión sobre una bóveda
 * aún no cristalizada.
 * =================================================================
 */

use sentinela_control_plane::prelude::*;

use dotenvy::dotenv;
use sentinela_shared_panopticon::init_tracing;
use tracing::info;

/**
 * Punto de ignición supremo del binario del plano de control.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (PANÓPTICO)
    init_tracing("sentinela_control_plane");

    // 3. RUNTIME MULTI-HILO DE TOKIO
    let runtime_control_plane = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime_control_plane.block_on(async {
        info!("🛰️  [CONTROL_PLANE]: Global ignition sequence starting...");

        // 4. CONFIGURACIÓN TIPADA (captura única del entorno)
        let config = ControlPlaneConfig::from_env();
        let listening_port = config.listening_port;

        // 5. KERNEL SOBERANO: DB + keyring + estado + daemons + HTTP
        let kernel_instance = ControlPlaneKernel::ignite(config).await;

        info!("🚀 [SENTINELA_ONLINE]: Control plane operational on port {}.", listening_port);
        kernel_instance.launch_sovereign_operations().await;

        Ok(())
    })
}
