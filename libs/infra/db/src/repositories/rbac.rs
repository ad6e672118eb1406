// [libs/infra/db/src/repositories/rbac.rs]
/*!
 * =================================================================
 * APARATO: RBAC RESOLUTION REPOSITORY (V6.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: JOIN USER -> ROLES -> PERMISSIONS Y CUENTAS
 *
 * # Mathematical Proof (Tenant-Filtered Join):
 * La join ancla 'roles.tenant_id' al tenant del llamador: un rol de otro
 * tenant jamás aporta grants aunque comparta identificador de usuario.
 * =================================================================
 */

use crate::errors::DbError;
use crate::tenant::TenantScope;
use crate::{format_timestamp, parse_uuid_column, VmsDbClient};
use chrono::{DateTime, Utc};
use libsql::params;
use sentinela_domain_models::PermissionGrant;
use tracing::instrument;
use uuid::Uuid;

/// Cuenta mínima para el handshake de login y la rotación de tokens.
#[derive(Debug, Clone)]
pub struct UserAccountRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_salt: String,
    pub password_hash: String,
}

pub struct RbacRepository {
    database_client: VmsDbClient,
}

impl RbacRepository {
    pub fn new(client: VmsDbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Resuelve los grants de un (tenant, user, permission): cada fila de
     * 'user_roles' porta el alcance (site nulo = tenant-wide).
     */
    #[instrument(skip(self))]
    pub async fn resolve_grants(
        &self,
        scope: &TenantScope,
        user_id: Uuid,
        permission: &str,
    ) -> Result<Vec<PermissionGrant>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT ur.site_id
             FROM user_roles ur
             INNER JOIN roles r ON r.id = ur.role_id AND r.tenant_id = ?1
             INNER JOIN role_permissions rp ON rp.role_id = r.id
             INNER JOIN permissions p ON p.id = rp.permission_id
             WHERE ur.user_id = ?2 AND p.code = ?3",
            params![scope.tenant_param(), user_id.to_string(), permission.to_string()],
        ).await?;

        let mut resolved_grants = Vec::new();
        while let Some(data_row) = query_results.next().await? {
            let site_id = match crate::opt_text_column(&data_row, 0, "user_roles.site_id")? {
                Some(raw_site) if !raw_site.is_empty() => {
                    Some(parse_uuid_column(&raw_site, "user_roles.site_id")?)
                }
                _ => None,
            };

            resolved_grants.push(PermissionGrant {
                tenant_id: scope.tenant_id(),
                user_id,
                permission: permission.to_string(),
                site_id,
            });
        }

        Ok(resolved_grants)
    }

    /// Techo de licencia (MaxCameras) del tenant del llamador.
    pub async fn fetch_tenant_camera_limit(&self, scope: &TenantScope) -> Result<i64, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT max_cameras FROM tenants WHERE id = ?1",
            params![scope.tenant_param()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)?),
            None => Err(DbError::RecordNotFound),
        }
    }

    /// Búsqueda de cuenta por email para el handshake de login.
    pub async fn fetch_user_by_email(&self, email: &str) -> Result<Option<UserAccountRow>, DbError> {
        let database_connection = self.database_client.get_connection()?;

        let mut query_results = database_connection.query(
            "SELECT id, tenant_id, email, password_salt, password_hash FROM users WHERE email = ?1",
            params![email.to_string()],
        ).await?;

        match query_results.next().await? {
            Some(data_row) => Ok(Some(UserAccountRow {
                id: parse_uuid_column(&data_row.get::<String>(0)?, "users.id")?,
                tenant_id: parse_uuid_column(&data_row.get::<String>(1)?, "users.tenant_id")?,
                email: data_row.get::<String>(2)?,
                password_salt: data_row.get::<String>(3)?,
                password_hash: data_row.get::<String>(4)?,
            })),
            None => Ok(None),
        }
    }

    // --- APROVISIONAMIENTO DE FIXTURES (Proving Grounds y seed) ---

    /// Alta directa de tenant (bootstrap/seed; no expuesta por la API).
    pub async fn provision_tenant(&self, tenant_id: Uuid, name: &str, max_cameras: i64) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "INSERT OR IGNORE INTO tenants (id, name, max_cameras, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![tenant_id.to_string(), name.to_string(), max_cameras, format_timestamp(Utc::now())],
        ).await?;
        Ok(())
    }

    pub async fn provision_site(&self, tenant_id: Uuid, site_id: Uuid, name: &str) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        database_connection.execute(
            "INSERT OR IGNORE INTO sites (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![site_id.to_string(), tenant_id.to_string(), name.to_string(), format_timestamp(Utc::now())],
        ).await?;
        Ok(())
    }

    pub async fn provision_user(
        &self,
        user: &UserAccountRow,
        created_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;

        let inserted = database_connection.execute(
            "INSERT OR IGNORE INTO users (id, tenant_id, email, password_salt, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id.to_string(),
                user.tenant_id.to_string(),
                user.email.clone(),
                user.password_salt.clone(),
                user.password_hash.clone(),
                format_timestamp(created_at),
            ],
        ).await?;

        if inserted == 0 {
            return Err(DbError::Conflict(format!("EMAIL_TAKEN: {}", user.email)));
        }
        Ok(())
    }

    /**
     * Alta de un rol con un permiso y su asignación al usuario, con el
     * alcance indicado (site nulo = tenant-wide).
     */
    pub async fn provision_grant(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        permission_code: &str,
        site_id: Option<Uuid>,
    ) -> Result<(), DbError> {
        let database_connection = self.database_client.get_connection()?;
        let grant_transaction = database_connection.transaction().await?;

        let role_id = Uuid::new_v4();
        let permission_id = Uuid::new_v4();

        grant_transaction.execute(
            "INSERT INTO roles (id, tenant_id, name) VALUES (?1, ?2, ?3)",
            params![role_id.to_string(), tenant_id.to_string(), format!("role_{}", permission_code)],
        ).await?;

        grant_transaction.execute(
            "INSERT OR IGNORE INTO permissions (id, code) VALUES (?1, ?2)",
            params![permission_id.to_string(), permission_code.to_string()],
        ).await?;

        grant_transaction.execute(
            "INSERT INTO role_permissions (role_id, permission_id)
             SELECT ?1, id FROM permissions WHERE code = ?2",
            params![role_id.to_string(), permission_code.to_string()],
        ).await?;

        grant_transaction.execute(
            "INSERT INTO user_roles (user_id, role_id, site_id) VALUES (?1, ?2, ?3)",
            params![user_id.to_string(), role_id.to_string(), site_id.map(|id| libsql::Value::from(id.to_string())).unwrap_or(libsql::Value::Null)],
        ).await?;

        grant_transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(())
    }
}
