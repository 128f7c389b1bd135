use sqlx::{pool::PoolConnection, PgPool, Postgres};

use crate::{common::error::AppError, middleware::tenancy::TenantContext};

// ---
// Helper RLS: a "chave" para o banco de dados
// ---
/// Adquire uma conexão da pool e grava o escopo do request nas variáveis
/// `app.tenant_id` / `app.is_privileged`, lidas pelas policies de RLS.
/// `set_config(..., false)` vale para a sessão, por isso sempre regravamos
/// as duas variáveis: a conexão volta para a pool e é reutilizada.
pub(crate) async fn scoped_connection(
    pool: &PgPool,
    ctx: &TenantContext,
) -> Result<PoolConnection<Postgres>, AppError> {
    // 1. Adquire conexão
    let mut conn = pool.acquire().await?;

    // 2. Define Tenant ID (string vazia = nenhum tenant)
    let tenant = ctx.get_tenant().map(|id| id.to_string()).unwrap_or_default();
    sqlx::query("SELECT set_config('app.tenant_id', $1, false)")
        .bind(tenant)
        .execute(&mut *conn)
        .await?;

    // 3. Define o privilégio
    sqlx::query("SELECT set_config('app.is_privileged', $1, false)")
        .bind(ctx.is_privileged().to_string())
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}

/// Converte violação de chave única num erro de domínio.
pub(crate) fn map_unique_violation(e: sqlx::Error, on_conflict: AppError) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_conflict;
        }
    }
    e.into()
}
