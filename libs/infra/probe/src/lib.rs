// [libs/infra/probe/src/lib.rs]

pub mod errors;
pub mod sanitize;
pub mod rtsp;
pub mod discovery;
pub mod onvif;

pub use errors::ProbeError;
pub use sanitize::{sanitize_rtsp_url, inject_rtsp_credentials, RtspEndpoint};
pub use rtsp::{probe_rtsp_options, RtspProbeReport, ProbeVerdict};
pub use discovery::{sweep_ws_discovery, DiscoveredOnvifDevice};
pub use onvif::{fetch_media_profiles, OnvifMediaProfile};
