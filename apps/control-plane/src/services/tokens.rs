// [apps/control-plane/src/services/tokens.rs]
/*!
 * =================================================================
 * APARATO: TOKEN FORGE (V9.0 - SINGULARITY)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: ACUÑACIÓN/VERIFICACIÓN HS256 Y FIRMA DE HLS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SYMMETRIC MINT: El access token es un JWT HS256 acuñado a mano
 *    (header.payload.sig en base64url); la verificación re-firma y
 *    compara en tiempo constante.
 * 2. OPAQUE REFRESH: El refresh token es aleatorio opaco; solo su
 *    SHA-256 persiste (ver repositorio de rotación).
 * 3. HLS CANON: La firma de segmentos cubre 'hls|<camera>|<session>|<exp>'
 *    y viaja en los params 'sub, sid, exp, scope, kid, sig'.
 * =================================================================
 */

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Claims soberanos del access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub tenant_id: Uuid,
    /// Identificador del usuario (subject).
    pub sub: Uuid,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    pub kid: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
    kid: String,
}

pub struct TokenForge {
    jwt_signing_secret: Vec<u8>,
    jwt_kid: String,
    hls_signing_secret: Vec<u8>,
    hls_kid: String,
    access_token_lifetime: Duration,
}

impl TokenForge {
    pub fn new(
        jwt_secret: &str,
        jwt_kid: &str,
        hls_secret: &str,
        hls_kid: &str,
        access_token_lifetime: Duration,
    ) -> Self {
        Self {
            jwt_signing_secret: jwt_secret.as_bytes().to_vec(),
            jwt_kid: jwt_kid.to_string(),
            hls_signing_secret: hls_secret.as_bytes().to_vec(),
            hls_kid: hls_kid.to_string(),
            access_token_lifetime,
        }
    }

    fn hmac_sign(secret: &[u8], message: &[u8]) -> Vec<u8> {
        let mut mac_engine = HmacSha256::new_from_slice(secret)
            .expect("FATAL: HMAC accepts any key length.");
        mac_engine.update(message);
        mac_engine.finalize().into_bytes().to_vec()
    }

    // --- ACCESS TOKENS (JWT HS256) ---

    /// Acuña un access token para el (tenant, usuario) autenticado.
    pub fn mint_access_token(&self, tenant_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> String {
        let claims = AccessTokenClaims {
            tenant_id,
            sub: user_id,
            token_type: "access".into(),
            exp: (now + ChronoDuration::from_std(self.access_token_lifetime).unwrap_or(ChronoDuration::seconds(900))).timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            kid: self.jwt_kid.clone(),
        };

        let header = JwtHeader {
            alg: "HS256".into(),
            typ: "JWT".into(),
            kid: self.jwt_kid.clone(),
        };

        let header_segment = BASE64_URL.encode(serde_json::to_vec(&header).expect("FATAL: Header marshal."));
        let claims_segment = BASE64_URL.encode(serde_json::to_vec(&claims).expect("FATAL: Claims marshal."));
        let signing_input = format!("{}.{}", header_segment, claims_segment);

        let signature = Self::hmac_sign(&self.jwt_signing_secret, signing_input.as_bytes());
        format!("{}.{}", signing_input, BASE64_URL.encode(signature))
    }

    /**
     * Verifica firma y ventana temporal de un access token.
     * Todo fallo colapsa a 'None': el guardia renderiza un 401 genérico.
     */
    pub fn verify_access_token(&self, raw_token: &str, now: DateTime<Utc>) -> Option<AccessTokenClaims> {
        let token_segments: Vec<&str> = raw_token.split('.').collect();
        if token_segments.len() != 3 {
            return None;
        }

        let signing_input = format!("{}.{}", token_segments[0], token_segments[1]);
        let presented_signature = BASE64_URL.decode(token_segments[2]).ok()?;

        let mut mac_engine = HmacSha256::new_from_slice(&self.jwt_signing_secret).ok()?;
        mac_engine.update(signing_input.as_bytes());
        mac_engine.verify_slice(&presented_signature).ok()?;

        let claims: AccessTokenClaims =
            serde_json::from_slice(&BASE64_URL.decode(token_segments[1]).ok()?).ok()?;

        if claims.token_type != "access" {
            return None;
        }
        if claims.exp < now.timestamp() || claims.nbf > now.timestamp() {
            return None;
        }

        Some(claims)
    }

    // --- REFRESH TOKENS (OPACOS) ---

    /// Acuña un refresh token opaco de 32 bytes de entropía del SO.
    pub fn mint_refresh_token() -> String {
        let mut entropy_buffer = [0u8; 32];
        OsRng.fill_bytes(&mut entropy_buffer);
        hex::encode(entropy_buffer)
    }

    // --- FIRMA DE SEGMENTOS HLS ---

    /// Cadena canónica de la firma HLS.
    fn hls_canonical_string(camera_id: Uuid, viewer_session_id: Uuid, expires_epoch: i64) -> String {
        format!("hls|{}|{}|{}", camera_id, viewer_session_id, expires_epoch)
    }

    /**
     * Emite la query de firma de segmentos:
     * `sub, sid, exp, scope=hls, kid, sig`.
     */
    pub fn sign_hls_query(
        &self,
        user_id: Uuid,
        camera_id: Uuid,
        viewer_session_id: Uuid,
        expires_epoch: i64,
    ) -> String {
        let canonical_string = Self::hls_canonical_string(camera_id, viewer_session_id, expires_epoch);
        let signature = Self::hmac_sign(&self.hls_signing_secret, canonical_string.as_bytes());

        format!(
            "sub={}&sid={}&exp={}&scope=hls&kid={}&sig={}",
            user_id,
            viewer_session_id,
            expires_epoch,
            self.hls_kid,
            hex::encode(signature)
        )
    }

    /// Verificación de una firma presentada por el servidor de segmentos.
    pub fn verify_hls_signature(
        &self,
        camera_id: Uuid,
        viewer_session_id: Uuid,
        expires_epoch: i64,
        presented_signature_hex: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if expires_epoch < now.timestamp() {
            return false;
        }

        let canonical_string = Self::hls_canonical_string(camera_id, viewer_session_id, expires_epoch);
        let Ok(presented_signature) = hex::decode(presented_signature_hex) else { return false };

        let mut mac_engine = match HmacSha256::new_from_slice(&self.hls_signing_secret) {
            Ok(engine) => engine,
            Err(_) => return false,
        };
        mac_engine.update(canonical_string.as_bytes());
        mac_engine.verify_slice(&presented_signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge() -> TokenForge {
        TokenForge::new("test-jwt-secret", "jwt-k1", "test-hls-secret", "hls-k1", Duration::from_secs(900))
    }

    #[test]
    fn certify_access_token_round_trip() {
        let token_forge = forge();
        let tenant_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let minted_token = token_forge.mint_access_token(tenant_id, user_id, now);
        let claims = token_forge.verify_access_token(&minted_token, now).expect("token must verify");

        assert_eq!(claims.tenant_id, tenant_id);
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.kid, "jwt-k1");
    }

    #[test]
    fn certify_tampered_token_is_rejected() {
        let token_forge = forge();
        let now = Utc::now();
        let minted_token = token_forge.mint_access_token(Uuid::new_v4(), Uuid::new_v4(), now);

        let mut tampered_token = minted_token.clone();
        tampered_token.pop();
        tampered_token.push('A');
        assert!(token_forge.verify_access_token(&tampered_token, now).is_none());
    }

    #[test]
    fn certify_expired_token_is_rejected() {
        let token_forge = forge();
        let minted_at = Utc::now() - ChronoDuration::hours(2);
        let minted_token = token_forge.mint_access_token(Uuid::new_v4(), Uuid::new_v4(), minted_at);
        assert!(token_forge.verify_access_token(&minted_token, Utc::now()).is_none());
    }

    #[test]
    fn certify_hls_signature_round_trip() {
        let token_forge = forge();
        let camera_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_epoch = (now + ChronoDuration::minutes(5)).timestamp();

        let signed_query = token_forge.sign_hls_query(Uuid::new_v4(), camera_id, session_id, expires_epoch);
        assert!(signed_query.contains("scope=hls"));
        assert!(signed_query.contains("kid=hls-k1"));

        let signature_hex = signed_query.rsplit("sig=").next().unwrap();
        assert!(token_forge.verify_hls_signature(camera_id, session_id, expires_epoch, signature_hex, now));

        // Otra cámara invalida la firma (el canon la incluye).
        assert!(!token_forge.verify_hls_signature(Uuid::new_v4(), session_id, expires_epoch, signature_hex, now));
    }

    #[test]
    fn certify_refresh_tokens_are_high_entropy_and_unique() {
        let first_token = TokenForge::mint_refresh_token();
        let second_token = TokenForge::mint_refresh_token();
        assert_eq!(first_token.len(), 64);
        assert_ne!(first_token, second_token);
    }
}
