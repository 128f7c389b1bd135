// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::error::AppError,
    db::{PrincipalStore, RbacStore},
    models::{
        auth::RegisterPayload,
        principal::{ApprovalState, Contact, NewPrincipal, Principal, PrincipalKind},
        rbac::Role,
    },
    services::{subscription_service::SubscriptionService, token::TokenService},
};

/// Cargo dado ao operador criado na inicialização.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Clone)]
pub struct AuthService {
    principals: Arc<dyn PrincipalStore>,
    rbac: Arc<dyn RbacStore>,
    subscriptions: SubscriptionService,
    tokens: TokenService,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        rbac: Arc<dyn RbacStore>,
        subscriptions: SubscriptionService,
        tokens: TokenService,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            principals,
            rbac,
            subscriptions,
            tokens,
            bcrypt_cost,
        }
    }

    /// Cadastro de um cliente (tenant) com o plano padrão já atribuído.
    /// Sem plano padrão configurado, nada é criado.
    pub async fn register_tenant(&self, payload: RegisterPayload) -> Result<(Principal, String), AppError> {
        // 1. Contato normalizado
        let raw = payload.email.as_deref().or(payload.phone.as_deref()).unwrap_or_default();
        let contact = Contact::parse(raw).ok_or_else(|| invalid_contact(&payload))?;

        // 2. Falha de configuração antes de qualquer escrita
        self.subscriptions.default_plan().await?;

        if self.principals.find_by_contact(&contact).await?.is_some() {
            return Err(AppError::ContactAlreadyExists);
        }

        // 3. Hashing
        let password_hash = self.hash_password(&payload.password).await?;

        // 4. Cria o principal
        let principal = self
            .principals
            .create(NewPrincipal {
                contact,
                password_hash,
                approval: ApprovalState::Pending,
                roles: Vec::new(),
                kind: PrincipalKind::Tenant {
                    customer_type_id: payload.customer_type_id,
                },
            })
            .await?;

        // 5. Assinatura inicial; se falhar, o principal é desfeito
        if let Err(e) = self.subscriptions.assign_default(principal.id).await {
            tracing::error!(tenant_id = %principal.id, "🔥 Falha ao atribuir a assinatura inicial: {}", e);
            if let Err(cleanup) = self.principals.delete(principal.id).await {
                tracing::error!(tenant_id = %principal.id, "🔥 Tenant ficou sem assinatura: {}", cleanup);
            }
            return Err(e);
        }

        tracing::info!(tenant_id = %principal.id, "✅ Novo tenant cadastrado");

        let token = self.tokens.issue_session(principal.contact.subject())?;
        Ok((principal, token))
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<String, AppError> {
        let contact = Contact::parse(login).ok_or(AppError::InvalidCredentials)?;
        let principal = self
            .principals
            .find_by_contact(&contact)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.verify_password(password, &principal.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        if !principal.is_active || principal.approval == ApprovalState::Rejected {
            return Err(AppError::AccountDisabled);
        }

        self.tokens.issue_session(principal.contact.subject())
    }

    /// Retorna o token de redefinição quando a conta existe. A entrega
    /// (e-mail/SMS) é de outro serviço; o handler responde igual nos dois casos.
    pub async fn forgot_password(&self, login: &str) -> Result<Option<String>, AppError> {
        let Some(contact) = Contact::parse(login) else {
            return Ok(None);
        };

        match self.principals.find_by_contact(&contact).await? {
            Some(principal) if principal.is_active => {
                let token = self.tokens.issue_password_reset(principal.contact.subject())?;
                tracing::info!(principal_id = %principal.id, "✉️ Token de redefinição de senha emitido");
                Ok(Some(token))
            }
            _ => Ok(None),
        }
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let verified = self.tokens.verify_password_reset(token)?;
        let contact = Contact::parse(&verified.subject).ok_or(AppError::InvalidToken)?;

        let principal = self
            .principals
            .find_by_contact(&contact)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !principal.is_active {
            return Err(AppError::InvalidToken);
        }

        // Uso único: a troca de senha invalida todo token emitido antes dela
        if principal
            .password_changed_at
            .is_some_and(|changed| verified.issued_at.timestamp() <= changed.timestamp())
        {
            tracing::warn!(principal_id = %principal.id, "Token de redefinição reutilizado");
            return Err(AppError::InvalidToken);
        }

        let password_hash = self.hash_password(new_password).await?;
        self.principals.update_password(principal.id, &password_hash).await?;

        tracing::info!(principal_id = %principal.id, "🔑 Senha redefinida");
        Ok(())
    }

    pub async fn set_approval(&self, id: Uuid, approval: ApprovalState) -> Result<Principal, AppError> {
        let principal = self
            .principals
            .set_approval(id, approval)
            .await?
            .ok_or(AppError::NotFound("Principal"))?;

        tracing::info!(principal_id = %id, ?approval, "Aprovação alterada");
        Ok(principal)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Principal, AppError> {
        let principal = self
            .principals
            .set_active(id, is_active)
            .await?
            .ok_or(AppError::NotFound("Principal"))?;

        tracing::info!(principal_id = %id, is_active, "Status da conta alterado");
        Ok(principal)
    }

    /// Garante o cargo `admin` com as permissões dadas e um operador com esse
    /// login. Não altera a senha de um operador que já existe.
    pub async fn ensure_operator(
        &self,
        login: &str,
        password: &str,
        permissions: &[&str],
    ) -> Result<Principal, AppError> {
        self.rbac
            .save_role(&Role {
                name: ADMIN_ROLE.to_string(),
                description: Some("Operador da plataforma".into()),
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            })
            .await?;

        let contact = Contact::parse(login)
            .ok_or_else(|| anyhow::anyhow!("login do operador inicial inválido: {login}"))?;

        if let Some(existing) = self.principals.find_by_contact(&contact).await? {
            return Ok(existing);
        }

        let password_hash = self.hash_password(password).await?;
        let operator = self
            .principals
            .create(NewPrincipal {
                contact,
                password_hash,
                approval: ApprovalState::Approved,
                roles: vec![ADMIN_ROLE.to_string()],
                kind: PrincipalKind::Operator {
                    department: None,
                    position: None,
                },
            })
            .await?;

        tracing::info!(principal_id = %operator.id, "🛡️ Operador inicial criado");
        Ok(operator)
    }

    // bcrypt é CPU-bound: roda fora do executor async
    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(&password, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        let valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
        Ok(valid)
    }
}

fn invalid_contact(payload: &RegisterPayload) -> AppError {
    let field = if payload.email.is_some() { "email" } else { "phone" };
    let mut err = ValidationError::new("contact");
    err.message = Some("Contato inválido.".into());

    let mut errors = ValidationErrors::new();
    errors.add(field, err);
    AppError::ValidationError(errors)
}
